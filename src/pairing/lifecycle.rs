//! Session lifecycle coordination.
//!
//! # Responsibilities
//! - Register a connection when its socket opens
//! - Route `partner_left` / `partner_complete` to a partner by id
//! - On disconnect, cancel the connection's waiting requests, then forget it
//!
//! # Design Decisions
//! - Paired relationships are not stored; a notification is only as good as
//!   the partner id the client supplies
//! - Notifications are best-effort: an unknown, malformed or departed id is
//!   dropped without an error reaching the sender
//! - `partner_complete` is emitted after a short delay, and the sender's next
//!   event is not processed until it has been dispatched

use std::sync::Arc;

use crate::net::connection::ConnectionId;
use crate::observability::metrics;
use crate::pairing::engine::MatchingEngine;
use crate::pairing::hooks::{CompletionHook, CompletionReport};
use crate::pairing::registry::{ConnectionRegistry, EventSender};
use crate::pairing::types::{ClientEvent, DurationKey, ServerEvent};

#[derive(Debug, Clone)]
pub struct SessionCoordinator {
    registry: ConnectionRegistry,
    engine: MatchingEngine,
    hook: Arc<dyn CompletionHook>,
}

impl SessionCoordinator {
    pub fn new(
        registry: ConnectionRegistry,
        engine: MatchingEngine,
        hook: Arc<dyn CompletionHook>,
    ) -> Self {
        Self {
            registry,
            engine,
            hook,
        }
    }

    /// Make `id` live and greet it with its own id.
    pub fn connect(&self, id: ConnectionId, sender: EventSender) {
        self.registry.register(id, sender);
        self.registry
            .send(id, ServerEvent::Connected { connection_id: id });
        tracing::info!(connection_id = %id, "Client connected");
    }

    /// Tear down `id`: waiting requests are cancelled first so no match can
    /// pick the connection up after it stops being live.
    pub fn disconnect(&self, id: ConnectionId) -> usize {
        let cancelled = self.engine.cancel_waiting(id, "disconnect");
        self.registry.unregister(id);
        tracing::info!(connection_id = %id, cancelled, "Client disconnected");
        cancelled
    }

    /// Apply one inbound event from `from`. Events from one connection must
    /// be handled one at a time, in arrival order.
    pub async fn handle(&self, from: ConnectionId, event: ClientEvent) {
        match event {
            ClientEvent::StartMatching(request) => {
                let bucket = DurationKey::from_focus_time(request.focus_time.as_ref());
                let name = request.display_name();
                self.engine.request_pairing(from, bucket, name);
            }
            ClientEvent::LeavingSession(target) => {
                self.notify_leaving(from, target.partner_id.as_deref());
            }
            ClientEvent::SessionComplete(target) => {
                self.notify_complete(from, target.partner_id.as_deref())
                    .await;
            }
            ClientEvent::NotifyLeaving(partner_id) => {
                self.notify_leaving(from, partner_id.as_deref());
            }
        }
    }

    /// Tell `partner` that `from` left the session.
    pub fn notify_leaving(&self, from: ConnectionId, partner: Option<&str>) -> bool {
        self.forward(from, partner, ServerEvent::PartnerLeft)
    }

    /// Tell `partner` that `from` completed the session, and hand the
    /// completion to the host hook without waiting on it.
    pub async fn notify_complete(&self, from: ConnectionId, partner: Option<&str>) -> bool {
        let report = CompletionReport {
            connection_id: from,
            partner_id: partner.and_then(|raw| raw.parse().ok()),
        };
        tokio::spawn(self.hook.session_completed(report));

        let delay = self.engine.settings().load().complete_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.forward(from, partner, ServerEvent::PartnerComplete)
    }

    fn forward(&self, from: ConnectionId, partner: Option<&str>, event: ServerEvent) -> bool {
        let kind = event.name();
        let Some(raw) = partner else {
            tracing::debug!(connection_id = %from, event = kind, "Notification without partner id");
            return false;
        };

        let delivered = match raw.parse::<ConnectionId>() {
            Ok(partner_id) => self.registry.send(partner_id, event),
            Err(_) => false,
        };
        metrics::record_notification(kind, delivered);

        if delivered {
            tracing::info!(connection_id = %from, partner_id = %raw, event = kind, "Partner notified");
        } else {
            tracing::debug!(
                connection_id = %from,
                partner_id = %raw,
                event = kind,
                "Partner not live, notification dropped"
            );
        }
        delivered
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn engine(&self) -> &MatchingEngine {
        &self.engine
    }
}
