//! Shell Session
//!
//! Owns the shell running on a pseudoterminal: line submission, waiting for
//! sentinel text in the output, interrupt delivery and teardown. Output is
//! decoded incrementally and kept in a buffer until a wait consumes it.

use chrono::{DateTime, Utc};
use std::path::Path;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

use crate::config::ShellConfig;
use crate::error::{Error, Result};
use crate::prompt::{Sentinel, SentinelKind};
use crate::pty::{
    send_signal_to_group, send_signal_to_pid, spawn_pty_process, PtyLog, PtyProcess, PtyStreams,
    Signal,
};

/// Terminal interrupt character (Ctrl+C)
const INTERRUPT_CHAR: u8 = 0x03;

/// Why an `await_pattern` call returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// One of the requested sentinels was seen
    Sentinel(SentinelKind),
    /// The wait elapsed; unconsumed output stays buffered
    Timeout,
    /// The shell closed the terminal
    EndOfFile,
}

/// Outcome of waiting for a sentinel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub kind: MatchKind,
    /// Output preceding the sentinel, or everything buffered otherwise
    pub before: String,
}

impl Match {
    fn sentinel(kind: SentinelKind, before: String) -> Self {
        Self {
            kind: MatchKind::Sentinel(kind),
            before,
        }
    }

    /// Matched sentinel, if any
    pub fn sentinel_kind(&self) -> Option<SentinelKind> {
        match self.kind {
            MatchKind::Sentinel(kind) => Some(kind),
            _ => None,
        }
    }
}

/// One long-lived shell behind a pseudoterminal
pub struct ShellSession {
    id: Uuid,
    started_at: DateTime<Utc>,
    streams: PtyStreams,
    process: Option<PtyProcess>,
    log: Option<PtyLog>,
    /// Decoded output not yet consumed by a wait
    buffer: String,
    /// Trailing bytes of an incomplete UTF-8 sequence
    undecoded: Vec<u8>,
    alive: bool,
}

impl ShellSession {
    /// Start the configured shell, mirroring raw output to `log_path` if set
    pub fn spawn(config: &ShellConfig, log_path: Option<&Path>) -> Result<Self> {
        let (process, streams) = spawn_pty_process(config)?;

        let mut session = Self::from_streams(streams);
        info!(
            "Started shell session {} ({} pid {:?})",
            session.id, process.command, process.pid
        );
        session.process = Some(process);

        if let Some(path) = log_path {
            match PtyLog::open(path) {
                Ok(log) => session.attach_log(log),
                Err(e) => warn!("Cannot open PTY log {}: {}", path.display(), e),
            }
        }

        Ok(session)
    }

    /// Session over existing channels with no child process behind it
    pub fn from_streams(streams: PtyStreams) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            streams,
            process: None,
            log: None,
            buffer: String::new(),
            undecoded: Vec::new(),
            alive: true,
        }
    }

    /// Mirror every chunk read from now on
    pub fn attach_log(&mut self, log: PtyLog) {
        debug!("Mirroring session {} output to {}", self.id, log.path().display());
        self.log = Some(log);
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn pid(&self) -> Option<u32> {
        self.process.as_ref().and_then(|process| process.pid)
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Submit one line of input
    pub fn send_line(&mut self, text: &str) -> Result<()> {
        if !self.alive {
            return Err(Error::SessionDead);
        }
        debug!("send {:?}", text);

        let mut data = Vec::with_capacity(text.len() + 1);
        data.extend_from_slice(text.as_bytes());
        data.push(b'\n');
        self.streams.write(&data).inspect_err(|_| {
            self.alive = false;
        })
    }

    /// Wait until the output contains one of `patterns`
    ///
    /// The earliest match in the output wins; when two patterns match at the
    /// same position the one listed first wins. Output up to the end of the
    /// match is consumed. `timeout` of `None` waits indefinitely.
    ///
    /// Cancel safe: dropping the future loses no output.
    pub async fn await_pattern(&mut self, patterns: &[Sentinel], timeout: Option<Duration>) -> Match {
        let deadline = timeout.map(|t| Instant::now() + t);

        loop {
            if let Some((kind, start, end)) = self.find_earliest(patterns) {
                let before = self.buffer[..start].to_string();
                self.buffer.drain(..end);
                trace!("matched {} after {} bytes", kind, before.len());
                return Match::sentinel(kind, before);
            }

            if !self.alive {
                return self.end_of_file();
            }

            let next = match deadline {
                Some(deadline) => {
                    match tokio::time::timeout_at(deadline, self.streams.read()).await {
                        Ok(next) => next,
                        Err(_) => {
                            debug!("No sentinel within {:?}", timeout);
                            return Match {
                                kind: MatchKind::Timeout,
                                before: self.buffer.clone(),
                            };
                        }
                    }
                }
                None => self.streams.read().await,
            };

            match next {
                Some(chunk) => self.absorb(&chunk),
                None => {
                    info!("Shell session {} reached end of output", self.id);
                    self.alive = false;
                    return self.end_of_file();
                }
            }
        }
    }

    /// Deliver SIGINT to the terminal's foreground process group
    ///
    /// Returns immediately; the caller waits for the prompt afterwards.
    pub fn interrupt(&mut self) -> Result<()> {
        if !self.alive {
            return Err(Error::SessionDead);
        }

        let Some(process) = self.process.as_ref() else {
            debug!("No child process; writing interrupt character");
            return self.streams.write(&[INTERRUPT_CHAR]);
        };

        match (process.foreground_group(), process.pid) {
            (Some(pgid), _) => {
                debug!("SIGINT to process group {}", pgid);
                send_signal_to_group(pgid, Signal::Interrupt)
            }
            (None, Some(pid)) => {
                debug!("SIGINT to shell pid {}", pid);
                send_signal_to_pid(pid, Signal::Interrupt)
            }
            (None, None) => self.streams.write(&[INTERRUPT_CHAR]),
        }
    }

    /// Terminate the shell and flush the log; safe to call repeatedly
    pub fn close(&mut self) {
        if let Some(mut process) = self.process.take() {
            if process.has_exited() {
                debug!("{} already exited", process.command);
            } else if let Some(pid) = process.pid {
                if let Err(e) = send_signal_to_pid(pid, Signal::Hangup) {
                    debug!("SIGHUP to {} failed: {}", pid, e);
                }
            }
            process.kill();
            info!("Closed shell session {}", self.id);
        }
        if let Some(mut log) = self.log.take() {
            log.close();
        }
        self.alive = false;
    }

    fn find_earliest(&self, patterns: &[Sentinel]) -> Option<(SentinelKind, usize, usize)> {
        let mut best: Option<(SentinelKind, usize, usize)> = None;
        for sentinel in patterns {
            if let Some((start, end)) = sentinel.matcher.find(&self.buffer) {
                if best.map_or(true, |(_, best_start, _)| start < best_start) {
                    best = Some((sentinel.kind, start, end));
                }
            }
        }
        best
    }

    fn absorb(&mut self, chunk: &[u8]) {
        if let Some(log) = self.log.as_mut() {
            log.append(chunk);
        }

        self.undecoded.extend_from_slice(chunk);
        loop {
            match std::str::from_utf8(&self.undecoded) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    self.undecoded.clear();
                    return;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    self.buffer
                        .push_str(&String::from_utf8_lossy(&self.undecoded[..valid]));
                    match e.error_len() {
                        Some(invalid) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            self.undecoded.drain(..valid + invalid);
                        }
                        None => {
                            // Split sequence: wait for the rest
                            self.undecoded.drain(..valid);
                            return;
                        }
                    }
                }
            }
        }
    }

    fn end_of_file(&mut self) -> Match {
        if !self.undecoded.is_empty() {
            let tail = std::mem::take(&mut self.undecoded);
            self.buffer.push_str(&String::from_utf8_lossy(&tail));
        }
        if let Some(log) = self.log.as_mut() {
            log.flush();
        }
        Match {
            kind: MatchKind::EndOfFile,
            before: std::mem::take(&mut self.buffer),
        }
    }
}

impl Drop for ShellSession {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for ShellSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShellSession")
            .field("id", &self.id)
            .field("pid", &self.pid())
            .field("alive", &self.alive)
            .finish()
    }
}
