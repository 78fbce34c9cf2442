//! Interrupt requests
//!
//! A cloneable handle that lets any task, thread or signal listener ask the
//! engine to interrupt the command currently running in the shell.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Shared {
    pending: AtomicBool,
    notify: Notify,
}

/// Handle used to request an interrupt of the running execution
#[derive(Debug, Clone, Default)]
pub struct InterruptHandle {
    shared: Arc<Shared>,
}

impl InterruptHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask for the in-flight execution to be interrupted
    pub fn request(&self) {
        self.shared.pending.store(true, Ordering::SeqCst);
        self.shared.notify.notify_one();
    }

    /// Whether a request is waiting to be handled
    pub fn is_pending(&self) -> bool {
        self.shared.pending.load(Ordering::SeqCst)
    }

    /// Drop any request made while nothing was running
    pub(crate) fn clear(&self) {
        self.shared.pending.store(false, Ordering::SeqCst);
    }

    /// Resolve once a request is made, consuming it
    ///
    /// Cancel safe: a request that arrives while this future is dropped
    /// stays pending for the next call.
    pub(crate) async fn requested(&self) {
        loop {
            if self.shared.pending.swap(false, Ordering::SeqCst) {
                return;
            }
            self.shared.notify.notified().await;
        }
    }
}
