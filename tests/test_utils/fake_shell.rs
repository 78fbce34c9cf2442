//! Scripted shell behind a `ShellSession`

use std::sync::{Arc, Mutex};
use std::thread;

use zsh_kernel::pty::PtyStreams;
use zsh_kernel::ShellSession;

/// Every chunk the session wrote, decoded
pub type Inputs = Arc<Mutex<Vec<String>>>;

pub struct FakeShell;

impl FakeShell {
    /// Start a responder thread and a session wired to it
    ///
    /// `respond` receives each written chunk (a line with its newline, or
    /// the interrupt character) and returns the output chunks to emit.
    /// Returning `None` closes the output side like an exiting shell.
    pub fn spawn<F>(mut respond: F) -> (ShellSession, Inputs)
    where
        F: FnMut(&str) -> Option<Vec<String>> + Send + 'static,
    {
        let (out_tx, out_rx) = tokio::sync::mpsc::unbounded_channel::<Vec<u8>>();
        let (in_tx, in_rx) = std::sync::mpsc::channel::<Vec<u8>>();
        let inputs: Inputs = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&inputs);

        thread::spawn(move || {
            while let Ok(data) = in_rx.recv() {
                let text = String::from_utf8_lossy(&data).into_owned();
                recorded.lock().unwrap().push(text.clone());
                match respond(&text) {
                    Some(chunks) => {
                        for chunk in chunks {
                            if out_tx.send(chunk.into_bytes()).is_err() {
                                return;
                            }
                        }
                    }
                    None => return,
                }
            }
        });

        let session = ShellSession::from_streams(PtyStreams::from_channels(out_rx, in_tx));
        (session, inputs)
    }

    /// Snapshot of the recorded input
    pub fn inputs(inputs: &Inputs) -> Vec<String> {
        inputs.lock().unwrap().clone()
    }
}
