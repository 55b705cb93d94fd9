//! Cancellable deferred expiry for waiting requests.
//!
//! Each unmatched request gets one tokio task keyed by its [`Ticket`]. The
//! task sleeps for the configured wait and then runs its expiry action.
//! Cancelling aborts the task while it is still asleep. An action that has
//! already started cannot be recalled, so the action itself must recheck
//! that its request is still waiting before acting.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::AbortHandle;

use crate::pairing::types::Ticket;

#[derive(Debug, Clone, Default)]
pub struct TimeoutCanceller {
    pending: Arc<DashMap<Ticket, AbortHandle>>,
}

impl TimeoutCanceller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `on_expiry` after `delay` unless `ticket` is cancelled first.
    pub fn arm<F>(&self, ticket: Ticket, delay: Duration, on_expiry: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let pending = Arc::clone(&self.pending);
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            on_expiry();
            pending.remove(&ticket);
        });

        self.pending.insert(ticket, task.abort_handle());
        // The task may have finished before its handle was stored.
        if task.is_finished() {
            self.pending.remove(&ticket);
        }
    }

    /// Abort the pending expiry for `ticket`. Returns `false` when nothing
    /// was pending (already fired, already cancelled, or never armed).
    pub fn cancel(&self, ticket: Ticket) -> bool {
        match self.pending.remove(&ticket) {
            Some((_, handle)) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    #[cfg(test)]
    pub fn is_pending(&self, ticket: Ticket) -> bool {
        self.pending.contains_key(&ticket)
    }

    /// Number of armed, not yet fired timers.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}
