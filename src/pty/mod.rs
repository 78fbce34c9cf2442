//! Pseudoterminal (PTY) Management
//!
//! Process spawning, I/O streams, signal delivery and the raw output mirror
//! for the shell driven by a session.

pub mod log;
pub mod process;
pub mod signals;
pub mod streams;

pub use log::PtyLog;
pub use process::{find_command, is_command_available, spawn_pty_process, validate_command, PtyProcess};
pub use signals::{send_signal_to_group, send_signal_to_pid, Signal};
pub use streams::PtyStreams;
