//! PTY Process Spawning
//!
//! Opens a pseudoterminal with echo disabled, starts the shell on its slave
//! side and bridges the blocking master I/O to async code.

use nix::errno::Errno;
use nix::sys::termios::{self, LocalFlags, SetArg};
use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use std::env;
use std::io::{Read, Write};
use std::os::fd::BorrowedFd;
use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;
use std::thread;
use tokio::sync::mpsc::unbounded_channel;

use super::streams::PtyStreams;
use crate::config::ShellConfig;
use crate::error::{Error, Result};

/// A running child attached to a pseudoterminal
pub struct PtyProcess {
    /// Command that was started
    pub command: String,
    /// OS process id, when the platform reports one
    pub pid: Option<u32>,
    child: Box<dyn Child + Send + Sync>,
    master: Box<dyn MasterPty + Send>,
}

impl PtyProcess {
    /// Current foreground process group of the terminal
    pub fn foreground_group(&self) -> Option<u32> {
        self.master
            .process_group_leader()
            .and_then(|pgid| u32::try_from(pgid).ok())
    }

    /// Non-blocking exit check
    pub fn has_exited(&mut self) -> bool {
        !matches!(self.child.try_wait(), Ok(None))
    }

    /// Forcefully terminate and reap the child
    pub fn kill(&mut self) {
        if let Err(e) = self.child.kill() {
            debug!("Kill of {} failed: {}", self.command, e);
        }
        match self.child.try_wait() {
            Ok(Some(status)) => debug!("{} exited with {:?}", self.command, status),
            Ok(None) => debug!("{} not yet reaped after kill", self.command),
            Err(e) => debug!("Reaping {} failed: {}", self.command, e),
        }
    }
}

impl std::fmt::Debug for PtyProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PtyProcess")
            .field("command", &self.command)
            .field("pid", &self.pid)
            .finish()
    }
}

/// Spawn the configured shell on a fresh PTY
pub fn spawn_pty_process(config: &ShellConfig) -> Result<(PtyProcess, PtyStreams)> {
    validate_command(&config.program)?;

    let (cols, rows) = config.dimensions;
    let pair = native_pty_system()
        .openpty(PtySize {
            rows,
            cols,
            pixel_width: 0,
            pixel_height: 0,
        })
        .map_err(|e| Error::PtyCreationFailed {
            command: config.program.clone(),
            reason: e.to_string(),
        })?;

    disable_echo(pair.master.as_ref()).map_err(|e| Error::PtyCreationFailed {
        command: config.program.clone(),
        reason: format!("cannot disable echo: {}", e),
    })?;

    let mut cmd_builder = CommandBuilder::new(&config.program);
    cmd_builder.args(&config.args);
    for (key, value) in &config.environment {
        cmd_builder.env(key, value);
    }
    if let Some(dir) = &config.working_directory {
        cmd_builder.cwd(dir);
    }

    let child = pair
        .slave
        .spawn_command(cmd_builder)
        .map_err(|e| Error::SpawnFailed {
            command: config.program.clone(),
            reason: e.to_string(),
        })?;
    // The child holds its own handle on the slave side; ours would keep the
    // master from ever seeing EOF.
    drop(pair.slave);

    let pid = child.process_id();
    debug!("Spawned {} on PTY (pid {:?})", config.program, pid);

    let streams = create_pty_streams(pair.master.as_ref())?;
    let process = PtyProcess {
        command: config.program.clone(),
        pid,
        child,
        master: pair.master,
    };

    Ok((process, streams))
}

/// Turn off terminal echo so submitted lines are not read back
fn disable_echo(master: &dyn MasterPty) -> std::result::Result<(), Errno> {
    let raw = master.as_raw_fd().ok_or(Errno::EBADF)?;
    // The master outlives this borrow; it is owned by the PtyPair.
    let fd = unsafe { BorrowedFd::borrow_raw(raw) };
    let mut attrs = termios::tcgetattr(fd)?;
    attrs.local_flags.remove(LocalFlags::ECHO);
    termios::tcsetattr(fd, SetArg::TCSANOW, &attrs)
}

/// Create PTY streams from the master side
fn create_pty_streams(master: &dyn MasterPty) -> Result<PtyStreams> {
    let mut master_reader = master
        .try_clone_reader()
        .map_err(|e| Error::PtyReaderCloneFailed {
            reason: e.to_string(),
        })?;
    let mut master_writer = master
        .take_writer()
        .map_err(|e| Error::PtyWriterTakeFailed {
            reason: e.to_string(),
        })?;

    // Channel: PTY output -> async consumer
    let (tx_async_out, rx_async_out) = unbounded_channel::<Vec<u8>>();
    // Channel: async producer -> PTY writer thread
    let (tx_stdin, rx_stdin) = channel::<Vec<u8>>();

    thread::spawn(move || {
        let mut buf = [0u8; 4096];
        let mut consecutive_errors = 0;
        const MAX_CONSECUTIVE_ERRORS: u32 = 5;

        loop {
            match master_reader.read(&mut buf) {
                Ok(0) => {
                    debug!("PTY read EOF - process terminated");
                    break;
                }
                Ok(n) => {
                    consecutive_errors = 0;
                    if tx_async_out.send(buf[..n].to_vec()).is_err() {
                        debug!("PTY read: receiver dropped, stopping reader thread");
                        break;
                    }
                }
                Err(e) => {
                    if e.kind() == std::io::ErrorKind::Interrupted {
                        continue;
                    }

                    // Linux reports a hung-up slave as EIO
                    if e.raw_os_error() == Some(Errno::EIO as i32) {
                        debug!("PTY read EIO - slave side closed");
                        break;
                    }

                    if e.kind() == std::io::ErrorKind::WouldBlock {
                        thread::sleep(std::time::Duration::from_millis(10));
                        continue;
                    }

                    consecutive_errors += 1;
                    warn!(
                        "PTY read error ({}): {} (attempt {}/{})",
                        e.kind(),
                        e,
                        consecutive_errors,
                        MAX_CONSECUTIVE_ERRORS
                    );

                    if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                        error!("PTY read: too many consecutive errors, stopping reader thread");
                        break;
                    }

                    thread::sleep(std::time::Duration::from_millis(50));
                }
            }
        }
        debug!("PTY reader thread exiting");
    });

    thread::spawn(move || {
        while let Ok(data) = rx_stdin.recv() {
            loop {
                match master_writer.write_all(&data) {
                    Ok(()) => {
                        if let Err(e) = master_writer.flush() {
                            debug!("PTY flush error: {}", e);
                        }
                        break;
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        warn!("PTY write error ({}): {}, stopping writer thread", e.kind(), e);
                        return;
                    }
                }
            }
        }
        debug!("PTY writer thread exiting");
    });

    Ok(PtyStreams::from_channels(rx_async_out, tx_stdin))
}

/// Resolve a command name to an executable path
///
/// Names containing a slash are checked as paths; bare names are looked up
/// in `PATH`.
pub fn find_command(command: &str) -> Option<PathBuf> {
    if command.contains('/') {
        let path = PathBuf::from(command);
        return is_executable(&path).then_some(path);
    }

    let search = env::var_os("PATH")?;
    env::split_paths(&search)
        .map(|dir| dir.join(command))
        .find(|candidate| is_executable(candidate))
}

fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// Validate command before spawning
pub fn validate_command(command: &str) -> Result<()> {
    match find_command(command) {
        Some(path) => {
            debug!("Resolved {} to {}", command, path.display());
            Ok(())
        }
        None => Err(Error::SpawnFailed {
            command: command.to_string(),
            reason: "command not found".to_string(),
        }),
    }
}

/// Check if a command is available on the system
pub fn is_command_available(command: &str) -> bool {
    find_command(command).is_some()
}
