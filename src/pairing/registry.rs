//! Live connection registry.
//!
//! Owns the outgoing channel of every live connection, so delivering an
//! event is a direct addressed send resolved here. A connection that is not
//! registered is not live and never receives anything.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::net::connection::ConnectionId;
use crate::observability::metrics;
use crate::pairing::types::ServerEvent;

/// Sending half of a connection's outgoing event queue.
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

#[derive(Debug, Clone, Default)]
pub struct ConnectionRegistry {
    live: Arc<DashMap<ConnectionId, EventSender>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `id` live, routing its events to `sender`.
    pub fn register(&self, id: ConnectionId, sender: EventSender) {
        self.live.insert(id, sender);
        metrics::record_live_connections(self.live.len());
    }

    /// Forget `id`. Unregistering a non-member is a no-op.
    pub fn unregister(&self, id: ConnectionId) -> bool {
        let removed = self.live.remove(&id).is_some();
        if removed {
            metrics::record_live_connections(self.live.len());
        }
        removed
    }

    pub fn is_live(&self, id: ConnectionId) -> bool {
        self.live.contains_key(&id)
    }

    /// Best-effort delivery. Returns `false` when `id` is not live or its
    /// socket writer has already gone away.
    pub fn send(&self, id: ConnectionId, event: ServerEvent) -> bool {
        match self.live.get(&id) {
            Some(sender) => sender.send(event).is_ok(),
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}
