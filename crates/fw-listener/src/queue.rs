//! Unbounded FIFO between the ingest callback and the delivery worker.

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use fw_core::QueuedEvent;
use tracing::warn;

/// Multi-producer queue of [`QueuedEvent`]s.
///
/// Cloning yields another handle to the same queue. Pushing never blocks.
#[derive(Clone)]
pub struct EventQueue {
    tx: Sender<QueuedEvent>,
    rx: Receiver<QueuedEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self { tx, rx }
    }

    pub fn push(&self, event: QueuedEvent) {
        // The queue holds its own receiver, so this only fails if every
        // handle is being dropped concurrently.
        if self.tx.send(event).is_err() {
            warn!("[queue] receiver gone, event dropped");
        }
    }

    /// Wait up to `timeout` for the next event.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<QueuedEvent> {
        match self.rx.recv_timeout(timeout) {
            Ok(ev) => Some(ev),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn try_pop(&self) -> Option<QueuedEvent> {
        self.rx.try_recv().ok()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}
