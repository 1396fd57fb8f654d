//! Counters kept by the request API.

use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics for the request API
#[derive(Debug, Default)]
pub struct RequestStats {
    /// Requests whose two sends succeeded
    pub requests_published: AtomicU64,
    /// Requests that failed at either send
    pub publish_failures: AtomicU64,
    /// Publishes that found an entry already registered
    pub duplicate_registrations: AtomicU64,
    /// Responses that matched a live entry
    pub responses_delivered: AtomicU64,
    /// Responses with no live entry
    pub responses_dropped: AtomicU64,
    /// Responses for an entry that was already resolved
    pub duplicate_responses: AtomicU64,
    /// Entries removed by a sweep
    pub entries_evicted: AtomicU64,
    /// Waiters failed with a timeout by a sweep
    pub waiters_timed_out: AtomicU64,
}

/// Point-in-time copy of [`RequestStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub requests_published: u64,
    pub publish_failures: u64,
    pub duplicate_registrations: u64,
    pub responses_delivered: u64,
    pub responses_dropped: u64,
    pub duplicate_responses: u64,
    pub entries_evicted: u64,
    pub waiters_timed_out: u64,
}

impl RequestStats {
    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add(counter: &AtomicU64, n: usize) {
        counter.fetch_add(n as u64, Ordering::Relaxed);
    }

    /// Read all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            requests_published: self.requests_published.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
            duplicate_registrations: self.duplicate_registrations.load(Ordering::Relaxed),
            responses_delivered: self.responses_delivered.load(Ordering::Relaxed),
            responses_dropped: self.responses_dropped.load(Ordering::Relaxed),
            duplicate_responses: self.duplicate_responses.load(Ordering::Relaxed),
            entries_evicted: self.entries_evicted.load(Ordering::Relaxed),
            waiters_timed_out: self.waiters_timed_out.load(Ordering::Relaxed),
        }
    }
}
