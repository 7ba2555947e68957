//! Passive event stream for observers.
//!
//! Events are delivered on a broadcast channel: observers register by
//! subscribing and unsubscribe by dropping the receiver. Each logical event
//! fires at most once per completion; slow observers lose old events rather
//! than blocking the coordinator.

use tokio::sync::broadcast;

/// Observer-facing protocol events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CmpEvent {
    /// A consent payload arrived and superseded the stored snapshot.
    ConsentReceived { consent_string: String },
    /// The consent layer was put on screen.
    LayerOpened,
    /// The consent layer was taken off screen.
    LayerClosed,
    /// An operation-level error, mirrored from the failed pending result.
    Error { message: String },
}

#[derive(Debug, Clone)]
pub(crate) struct EventBus {
    tx: broadcast::Sender<CmpEvent>,
}

impl EventBus {
    pub(crate) fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<CmpEvent> {
        self.tx.subscribe()
    }

    /// Emit to whoever listens; no observers is not an error.
    pub(crate) fn emit(&self, event: CmpEvent) {
        let _ = self.tx.send(event);
    }
}
