//! PTY Streams
//!
//! Provides async-friendly interfaces for PTY I/O by bridging blocking
//! PTY master reads/writes to async code using channels.

use crate::error::{Error, Result};
use std::sync::mpsc::Sender as StdSender;
use tokio::sync::mpsc::UnboundedReceiver;

/// PTY I/O streams wrapper
pub struct PtyStreams {
    /// Receiver for output bytes from the PTY (stdout and stderr merged)
    output_rx: UnboundedReceiver<Vec<u8>>,
    /// Sender for input bytes to the PTY (stdin)
    input_tx: StdSender<Vec<u8>>,
}

impl PtyStreams {
    /// Create new PTY streams from channels
    ///
    /// Besides the real PTY threads, tests use this to script a shell.
    pub fn from_channels(
        output_rx: UnboundedReceiver<Vec<u8>>,
        input_tx: StdSender<Vec<u8>>,
    ) -> Self {
        Self {
            output_rx,
            input_tx,
        }
    }

    /// Write data to the PTY stdin
    pub fn write(&self, data: &[u8]) -> Result<()> {
        self.input_tx
            .send(data.to_vec())
            .map_err(|e| Error::PtyInputSendFailed {
                reason: e.to_string(),
            })
    }

    /// Next chunk of output; `None` once the reader side is gone
    ///
    /// Cancel safe: a chunk is never lost when the future is dropped.
    pub async fn read(&mut self) -> Option<Vec<u8>> {
        self.output_rx.recv().await
    }
}
