//! In-process event bus.
//!
//! Writers emit a named signal immediately after a store write so mounted
//! views can refresh without waiting for their polling interval. Delivery is
//! best-effort and only reaches current subscribers: there is no queue and no
//! replay, a view that subscribes later never sees the signal.

use serde_json::Value;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

/// Any entry in the global report collection changed.
pub const ALL_REPORTS_UPDATED: &str = "allReportsUpdated";
/// A consultation collection changed.
pub const CONSULTATIONS_UPDATED: &str = "consultations_updated";
/// The user directory changed.
pub const USERS_UPDATED: &str = "users_updated";
/// A per-owner report mirror changed.
pub const REPORTS_UPDATED: &str = "reports_updated";

/// A single named signal carried through the bus. `detail` is free-form
/// diagnostic payload (reason, affected ids); consumers must not depend on
/// its contents.
#[derive(Debug, Clone)]
pub struct Signal {
    pub name: String,
    pub detail: Value,
}

/// Broadcast channel that fans signals out to all subscribers.
pub struct EventBus {
    sender: broadcast::Sender<Signal>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1024);
        Self { sender }
    }

    /// Emit a signal to all subscribers. Silently drops if no receivers.
    pub fn emit(&self, name: &str, detail: Value) {
        let _ = self.sender.send(Signal {
            name: name.to_string(),
            detail,
        });
    }

    /// Create a new receiver that will get all future signals.
    pub fn subscribe(&self) -> broadcast::Receiver<Signal> {
        self.sender.subscribe()
    }

    /// Stream adapter over [`subscribe`](Self::subscribe).
    pub fn subscribe_stream(&self) -> BroadcastStream<Signal> {
        BroadcastStream::new(self.sender.subscribe())
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
