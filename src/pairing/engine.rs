//! Arrival-triggered matching.
//!
//! # Algorithm
//! ```text
//! start_matching(conn, bucket, name)
//!     → withdraw conn's earlier waiting request, if any
//!     → lock bucket
//!         push request
//!         oldest request from another connection?
//!             yes → remove both, cancel partner's timer,
//!                   match_success to each side      → Matched
//!             no  → arm timeout for this request     → Waiting
//!     → unlock bucket
//! ```
//!
//! Everything between lock and unlock is one critical section: two arrivals
//! in the same bucket can never both claim the same waiter, and a timer
//! cannot expire a request that a match is consuming.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::config::MatchingConfig;
use crate::net::connection::ConnectionId;
use crate::observability::metrics;
use crate::pairing::bucket::{BucketQueues, WaitingRequest};
use crate::pairing::registry::ConnectionRegistry;
use crate::pairing::timeout::TimeoutCanceller;
use crate::pairing::types::{DurationKey, RequestState, ServerEvent, Ticket};

/// Shared, hot-swappable matching settings.
pub type SharedMatchingConfig = Arc<ArcSwap<MatchingConfig>>;

#[derive(Debug, Clone)]
pub struct MatchingEngine {
    queues: Arc<BucketQueues>,
    registry: ConnectionRegistry,
    timers: TimeoutCanceller,
    settings: SharedMatchingConfig,
}

impl MatchingEngine {
    pub fn new(registry: ConnectionRegistry, settings: SharedMatchingConfig) -> Self {
        Self {
            queues: Arc::new(BucketQueues::new()),
            registry,
            timers: TimeoutCanceller::new(),
            settings,
        }
    }

    /// Pair `connection_id` with the oldest waiter in `bucket`, or leave it
    /// waiting with a timeout armed.
    ///
    /// Returns [`RequestState::Matched`] or [`RequestState::Waiting`].
    pub fn request_pairing(
        &self,
        connection_id: ConnectionId,
        bucket: DurationKey,
        display_name: Option<String>,
    ) -> RequestState {
        metrics::record_pairing_request();

        let superseded = self.cancel_waiting(connection_id, "superseded");
        if superseded > 0 {
            tracing::debug!(
                connection_id = %connection_id,
                superseded,
                "Earlier waiting request withdrawn"
            );
        }

        let mut queue = self.queues.lock(bucket.clone());
        let ticket = queue.push(connection_id, display_name);

        if let Some((request, partner)) = queue.take_pair(ticket) {
            self.timers.cancel(partner.ticket);
            self.introduce(&request, &partner);
            drop(queue);
            self.queues.prune(&bucket);

            metrics::record_match(partner.enqueued_at.elapsed());
            metrics::record_waiting(self.queues.waiting());
            tracing::info!(
                connection_id = %request.connection_id,
                partner_id = %partner.connection_id,
                bucket = %bucket,
                "Match found"
            );
            return RequestState::Matched;
        }

        let delay = self.settings.load().timeout();
        let engine = self.clone();
        let expiring = bucket.clone();
        self.timers
            .arm(ticket, delay, move || {
                engine.expire(ticket, &expiring);
            });
        drop(queue);

        metrics::record_waiting(self.queues.waiting());
        tracing::debug!(
            connection_id = %connection_id,
            bucket = %bucket,
            ticket,
            timeout_secs = delay.as_secs(),
            "Waiting for partner"
        );
        RequestState::Waiting
    }

    /// Send each side a `match_success` naming the other.
    fn introduce(&self, request: &WaitingRequest, partner: &WaitingRequest) {
        self.registry.send(
            partner.connection_id,
            ServerEvent::MatchSuccess {
                partner_id: request.connection_id,
                partner_username: request.display_name.clone(),
            },
        );
        self.registry.send(
            request.connection_id,
            ServerEvent::MatchSuccess {
                partner_id: partner.connection_id,
                partner_username: partner.display_name.clone(),
            },
        );
    }

    /// Expiry action for `ticket`. Only acts if the request is still waiting;
    /// returns whether it did.
    fn expire(&self, ticket: Ticket, bucket: &DurationKey) -> bool {
        let expired = self
            .queues
            .get(bucket)
            .and_then(|mut queue| queue.remove(ticket));
        self.queues.prune(bucket);

        let Some(request) = expired else {
            tracing::trace!(ticket, bucket = %bucket, "Timer fired for settled request");
            return false;
        };

        self.registry
            .send(request.connection_id, ServerEvent::MatchTimeout);
        metrics::record_timeout();
        metrics::record_waiting(self.queues.waiting());
        tracing::info!(
            connection_id = %request.connection_id,
            bucket = %bucket,
            state = RequestState::TimedOut.as_str(),
            "No partner found before timeout"
        );
        true
    }

    /// Cancel every waiting request owned by `connection_id`, suppressing
    /// their timers. No event is emitted. Returns how many were cancelled.
    pub fn cancel_waiting(&self, connection_id: ConnectionId, reason: &'static str) -> usize {
        let withdrawn = self.queues.withdraw(connection_id);
        for request in &withdrawn {
            self.timers.cancel(request.ticket);
            metrics::record_cancellation(reason);
            tracing::debug!(
                connection_id = %connection_id,
                bucket = %request.bucket,
                ticket = request.ticket,
                state = RequestState::Cancelled.as_str(),
                reason,
                "Waiting request withdrawn"
            );
        }
        if !withdrawn.is_empty() {
            metrics::record_waiting(self.queues.waiting());
        }
        withdrawn.len()
    }

    pub fn queues(&self) -> &BucketQueues {
        &self.queues
    }

    pub fn timers(&self) -> &TimeoutCanceller {
        &self.timers
    }

    pub fn settings(&self) -> &SharedMatchingConfig {
        &self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::Instant;

    fn engine() -> MatchingEngine {
        let settings = Arc::new(ArcSwap::from_pointee(MatchingConfig::default()));
        MatchingEngine::new(ConnectionRegistry::new(), settings)
    }

    fn connect(engine: &MatchingEngine) -> (ConnectionId, mpsc::UnboundedReceiver<ServerEvent>) {
        let id = ConnectionId::new();
        let (tx, rx) = mpsc::unbounded_channel();
        engine.registry.register(id, tx);
        (id, rx)
    }

    fn minutes(n: i64) -> DurationKey {
        DurationKey::from_focus_time(Some(&json!(n)))
    }

    #[tokio::test(start_paused = true)]
    async fn pairs_two_arrivals_in_same_bucket() {
        let engine = engine();
        let (c1, mut rx1) = connect(&engine);
        let (c2, mut rx2) = connect(&engine);

        assert_eq!(
            engine.request_pairing(c1, minutes(25), Some("ada".into())),
            RequestState::Waiting
        );
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(
            engine.request_pairing(c2, minutes(25), Some("grace".into())),
            RequestState::Matched
        );

        assert_eq!(
            rx1.try_recv().unwrap(),
            ServerEvent::MatchSuccess {
                partner_id: c2,
                partner_username: Some("grace".into())
            }
        );
        assert_eq!(
            rx2.try_recv().unwrap(),
            ServerEvent::MatchSuccess {
                partner_id: c1,
                partner_username: Some("ada".into())
            }
        );
        assert_eq!(engine.queues().waiting(), 0);
        assert_eq!(engine.timers().pending(), 0);

        // Well past c1's original deadline: no timeout for either side.
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(rx1.try_recv().is_err());
        assert!(rx2.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn lone_request_times_out_once_at_thirty_seconds() {
        let engine = engine();
        let (c3, mut rx3) = connect(&engine);
        let start = Instant::now();

        engine.request_pairing(c3, minutes(50), None);
        assert_eq!(engine.queues().depth(&minutes(50)), 1);

        assert_eq!(rx3.recv().await.unwrap(), ServerEvent::MatchTimeout);
        assert_eq!(start.elapsed(), Duration::from_secs(30));
        assert_eq!(engine.queues().depth(&minutes(50)), 0);
        assert_eq!(engine.queues().waiting(), 0);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(rx3.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn different_buckets_never_match() {
        let engine = engine();
        let (c1, mut rx1) = connect(&engine);
        let (c2, _rx2) = connect(&engine);
        let (c3, _rx3) = connect(&engine);

        engine.request_pairing(c1, minutes(25), None);
        engine.request_pairing(c2, minutes(50), None);
        engine.request_pairing(c3, DurationKey::from_focus_time(Some(&json!("25"))), None);

        assert!(rx1.try_recv().is_err());
        assert_eq!(engine.queues().waiting(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn unspecified_durations_share_a_bucket() {
        let engine = engine();
        let (c1, mut rx1) = connect(&engine);
        let (c2, _rx2) = connect(&engine);

        engine.request_pairing(c1, DurationKey::Unspecified, None);
        assert_eq!(
            engine.request_pairing(c2, DurationKey::Unspecified, None),
            RequestState::Matched
        );
        assert!(matches!(
            rx1.try_recv().unwrap(),
            ServerEvent::MatchSuccess { partner_id, .. } if partner_id == c2
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_request_supersedes_earlier_one() {
        let engine = engine();
        let (c1, mut rx1) = connect(&engine);
        let start = Instant::now();

        engine.request_pairing(c1, minutes(25), None);
        tokio::time::sleep(Duration::from_secs(10)).await;
        engine.request_pairing(c1, minutes(50), None);

        assert_eq!(engine.queues().depth(&minutes(25)), 0);
        assert_eq!(engine.queues().depth(&minutes(50)), 1);
        assert_eq!(engine.timers().pending(), 1);

        // Only the second request's timer is left.
        assert_eq!(rx1.recv().await.unwrap(), ServerEvent::MatchTimeout);
        assert_eq!(start.elapsed(), Duration::from_secs(40));
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(rx1.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn third_arrival_waits_after_pair_forms() {
        let engine = engine();
        let (c1, _rx1) = connect(&engine);
        let (c2, _rx2) = connect(&engine);
        let (c3, mut rx3) = connect(&engine);

        engine.request_pairing(c1, minutes(25), None);
        engine.request_pairing(c2, minutes(25), None);
        assert_eq!(
            engine.request_pairing(c3, minutes(25), None),
            RequestState::Waiting
        );
        assert!(rx3.try_recv().is_err());
        assert_eq!(engine.queues().depth(&minutes(25)), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_waiting_suppresses_timeout() {
        let engine = engine();
        let (c1, mut rx1) = connect(&engine);

        engine.request_pairing(c1, minutes(25), None);
        assert_eq!(engine.cancel_waiting(c1, "disconnect"), 1);
        assert_eq!(engine.cancel_waiting(c1, "disconnect"), 0);
        assert_eq!(engine.timers().pending(), 0);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(rx1.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn reloaded_timeout_applies_to_new_requests() {
        let engine = engine();
        let (c1, mut rx1) = connect(&engine);
        engine.settings().store(Arc::new(MatchingConfig {
            timeout_secs: 5,
            ..MatchingConfig::default()
        }));
        let start = Instant::now();

        engine.request_pairing(c1, minutes(25), None);
        assert_eq!(rx1.recv().await.unwrap(), ServerEvent::MatchTimeout);
        assert_eq!(start.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_arrivals_never_share_a_partner() {
        let engine = engine();
        let mut receivers = Vec::new();
        let mut ids = Vec::new();
        for _ in 0..64 {
            let (id, rx) = connect(&engine);
            ids.push(id);
            receivers.push((id, rx));
        }

        let tasks: Vec<_> = ids
            .iter()
            .map(|&id| {
                let engine = engine.clone();
                tokio::spawn(async move { engine.request_pairing(id, minutes(25), None) })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let mut partner_of: HashMap<ConnectionId, ConnectionId> = HashMap::new();
        for (id, rx) in receivers.iter_mut() {
            let mut matches = 0;
            while let Ok(event) = rx.try_recv() {
                if let ServerEvent::MatchSuccess { partner_id, .. } = event {
                    matches += 1;
                    assert_ne!(partner_id, *id);
                    partner_of.insert(*id, partner_id);
                }
            }
            assert!(matches <= 1, "{id} matched {matches} times");
        }

        for (id, partner) in &partner_of {
            assert_eq!(partner_of.get(partner), Some(id), "pairing must be mutual");
        }
        // Even count, one bucket: everybody got a partner.
        assert_eq!(partner_of.len(), 64);
        assert_eq!(engine.queues().waiting(), 0);
        assert_eq!(engine.timers().pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn integral_float_durations_pair_with_integers() {
        let engine = engine();
        let (c1, mut rx1) = connect(&engine);
        let (c2, _rx2) = connect(&engine);

        engine.request_pairing(c1, minutes(25), None);
        let float = DurationKey::from_focus_time(Some(&json!(25.0)));
        assert_eq!(engine.request_pairing(c2, float, None), RequestState::Matched);
        assert!(matches!(
            rx1.try_recv().unwrap(),
            ServerEvent::MatchSuccess { partner_id, .. } if partner_id == c2
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_of_a_settled_request_is_a_no_op() {
        let engine = engine();
        let (c1, mut rx1) = connect(&engine);

        engine.request_pairing(c1, minutes(25), None);
        // Take the request out without touching its timer.
        let withdrawn = engine.queues().withdraw(c1);
        assert_eq!(withdrawn.len(), 1);
        let ticket = withdrawn[0].ticket;
        assert!(engine.timers().is_pending(ticket));

        assert!(!engine.expire(ticket, &minutes(25)));
        assert!(rx1.try_recv().is_err());

        // The armed timer fires later and must stay silent too.
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(rx1.try_recv().is_err());
        assert!(!engine.timers().is_pending(ticket));
        assert_eq!(engine.queues().waiting(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_never_removes_a_different_waiter() {
        let engine = engine();
        let (c1, _rx1) = connect(&engine);
        let (c2, mut rx2) = connect(&engine);

        engine.request_pairing(c1, minutes(25), None);
        let stale = engine.queues().withdraw(c1)[0].ticket;
        engine.request_pairing(c2, minutes(25), None);

        assert!(!engine.expire(stale, &minutes(25)));
        assert_eq!(engine.queues().depth(&minutes(25)), 1);
        assert!(rx2.try_recv().is_err());
    }
}
