//! Duration-bucket waiting queues.
//!
//! # Responsibilities
//! - Own every waiting request, grouped by [`DurationKey`], oldest first
//! - Hand out an exclusive per-bucket guard so a caller can inspect and
//!   mutate one bucket as a single critical section
//! - Sweep a connection's requests out of all buckets on withdrawal
//!
//! Nothing outside this module touches bucket state directly.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use dashmap::mapref::one::RefMut;
use dashmap::DashMap;
use serde::Serialize;
use tokio::time::Instant;

use crate::net::connection::ConnectionId;
use crate::pairing::types::{DurationKey, Ticket};

/// A connection's unmatched request to be paired.
#[derive(Debug, Clone)]
pub struct WaitingRequest {
    pub ticket: Ticket,
    pub connection_id: ConnectionId,
    pub display_name: Option<String>,
    pub bucket: DurationKey,
    pub enqueued_at: Instant,
}

/// Depth of one bucket, as reported to operators.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketDepth {
    pub bucket: DurationKey,
    pub waiting: usize,
    pub oldest_wait_ms: u64,
}

#[derive(Debug)]
pub struct BucketQueues {
    buckets: DashMap<DurationKey, VecDeque<WaitingRequest>>,
    waiting: AtomicUsize,
    next_ticket: AtomicU64,
}

impl Default for BucketQueues {
    fn default() -> Self {
        Self {
            buckets: DashMap::new(),
            waiting: AtomicUsize::new(0),
            next_ticket: AtomicU64::new(1),
        }
    }
}

impl BucketQueues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exclusive access to the bucket for `key`, creating it if needed.
    ///
    /// Other callers touching the same bucket block until the guard drops.
    /// Do not call any other `BucketQueues` method while holding it.
    pub fn lock(&self, key: DurationKey) -> BucketGuard<'_> {
        BucketGuard {
            queue: self.buckets.entry(key).or_default(),
            waiting: &self.waiting,
            next_ticket: &self.next_ticket,
        }
    }

    /// Exclusive access to an existing bucket.
    pub fn get(&self, key: &DurationKey) -> Option<BucketGuard<'_>> {
        self.buckets.get_mut(key).map(|queue| BucketGuard {
            queue,
            waiting: &self.waiting,
            next_ticket: &self.next_ticket,
        })
    }

    /// Drop the bucket for `key` if it is empty.
    pub fn prune(&self, key: &DurationKey) {
        self.buckets.remove_if(key, |_, queue| queue.is_empty());
    }

    /// Remove every request owned by `id`, across all buckets.
    pub fn withdraw(&self, id: ConnectionId) -> Vec<WaitingRequest> {
        let mut removed = Vec::new();
        for mut entry in self.buckets.iter_mut() {
            let queue = entry.value_mut();
            let mut i = 0;
            while i < queue.len() {
                if queue[i].connection_id == id {
                    removed.extend(queue.remove(i));
                } else {
                    i += 1;
                }
            }
        }

        if !removed.is_empty() {
            self.waiting.fetch_sub(removed.len(), Ordering::SeqCst);
            self.buckets.retain(|_, queue| !queue.is_empty());
        }
        removed
    }

    /// Total waiting requests across all buckets.
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    /// Waiting requests in one bucket.
    pub fn depth(&self, key: &DurationKey) -> usize {
        self.buckets.get(key).map(|queue| queue.len()).unwrap_or(0)
    }

    #[cfg(test)]
    pub fn is_waiting(&self, id: ConnectionId) -> bool {
        self.buckets
            .iter()
            .any(|entry| entry.value().iter().any(|r| r.connection_id == id))
    }

    /// Per-bucket depths, ordered by key.
    pub fn snapshot(&self) -> Vec<BucketDepth> {
        let mut depths: Vec<BucketDepth> = self
            .buckets
            .iter()
            .filter(|entry| !entry.value().is_empty())
            .map(|entry| BucketDepth {
                bucket: entry.key().clone(),
                waiting: entry.value().len(),
                oldest_wait_ms: entry
                    .value()
                    .front()
                    .map(|r| r.enqueued_at.elapsed().as_millis() as u64)
                    .unwrap_or(0),
            })
            .collect();
        depths.sort_by(|a, b| a.bucket.cmp(&b.bucket));
        depths
    }
}

/// Exclusive handle on one bucket.
pub struct BucketGuard<'a> {
    queue: RefMut<'a, DurationKey, VecDeque<WaitingRequest>>,
    waiting: &'a AtomicUsize,
    next_ticket: &'a AtomicU64,
}

impl BucketGuard<'_> {
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Append a new request at the back of the bucket.
    pub fn push(&mut self, connection_id: ConnectionId, display_name: Option<String>) -> Ticket {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let bucket = self.queue.key().clone();
        self.queue.push_back(WaitingRequest {
            ticket,
            connection_id,
            display_name,
            bucket,
            enqueued_at: Instant::now(),
        });
        self.waiting.fetch_add(1, Ordering::SeqCst);
        ticket
    }

    /// Remove the request `ticket` together with the oldest request owned by
    /// a different connection. Returns `(request, partner)`, or `None` and
    /// leaves the bucket untouched when no such partner exists.
    pub fn take_pair(&mut self, ticket: Ticket) -> Option<(WaitingRequest, WaitingRequest)> {
        if self.queue.len() < 2 {
            return None;
        }
        let own = self.queue.iter().position(|r| r.ticket == ticket)?;
        let owner = self.queue[own].connection_id;
        let partner = self.queue.iter().position(|r| r.connection_id != owner)?;

        // Remove the later index first so the earlier one stays valid.
        let (request, partner) = if own > partner {
            let request = self.queue.remove(own)?;
            (request, self.queue.remove(partner)?)
        } else {
            let partner = self.queue.remove(partner)?;
            (self.queue.remove(own)?, partner)
        };
        self.waiting.fetch_sub(2, Ordering::SeqCst);
        Some((request, partner))
    }

    /// Remove the request `ticket` if it is still here.
    pub fn remove(&mut self, ticket: Ticket) -> Option<WaitingRequest> {
        let index = self.queue.iter().position(|r| r.ticket == ticket)?;
        let removed = self.queue.remove(index)?;
        self.waiting.fetch_sub(1, Ordering::SeqCst);
        Some(removed)
    }

    pub fn requests(&self) -> impl Iterator<Item = &WaitingRequest> {
        self.queue.iter()
    }
}
