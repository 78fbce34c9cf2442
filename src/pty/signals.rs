//! PTY Signal Handling
//!
//! Sends the signals used to control the shell: SIGINT to its foreground
//! process group on interrupt and SIGHUP on close.

use crate::error::{Error, Result};
use nix::sys::signal::{kill, killpg, Signal as NixSignal};
use nix::unistd::Pid;

/// Signal types that can be sent to PTY processes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Interrupt signal (Ctrl+C)
    Interrupt,
    /// Hangup signal, sent when the terminal goes away
    Hangup,
}

impl Signal {
    fn to_nix(self) -> NixSignal {
        match self {
            Signal::Interrupt => NixSignal::SIGINT,
            Signal::Hangup => NixSignal::SIGHUP,
        }
    }
}

/// Send signal to a single process
pub fn send_signal_to_pid(pid: u32, signal: Signal) -> Result<()> {
    let pid = to_pid(pid, signal)?;
    kill(pid, signal.to_nix()).map_err(|e| Error::SignalSendFailed {
        signal: format!("{:?}", signal),
        reason: e.to_string(),
    })
}

/// Send signal to every process in a process group
pub fn send_signal_to_group(pgid: u32, signal: Signal) -> Result<()> {
    let pgid = to_pid(pgid, signal)?;
    killpg(pgid, signal.to_nix()).map_err(|e| Error::SignalSendFailed {
        signal: format!("{:?}", signal),
        reason: e.to_string(),
    })
}

// Zero and negative PIDs address whole groups in kill(2); never let a bad
// value reach it.
fn to_pid(pid: u32, signal: Signal) -> Result<Pid> {
    match i32::try_from(pid) {
        Ok(raw) if raw > 0 => Ok(Pid::from_raw(raw)),
        _ => Err(Error::SignalSendFailed {
            signal: format!("{:?}", signal),
            reason: format!("invalid process id {}", pid),
        }),
    }
}
