//! Response dispatcher.
//!
//! Bridges the inbound response subscription to the registry: each response
//! resolves every waiter of its entry and is cached for later queries.

use crate::domain::expiring_map::ExpiringMap;
use crate::domain::handlers::ResponseHandlers;
use crate::domain::stats::RequestStats;
use std::fmt::Display;
use std::hash::Hash;
use std::sync::Arc;
use tracing::{debug, warn};

/// What happened to one inbound response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Matched a live entry; this many waiters were completed.
    Delivered { waiters: usize },
    /// The entry already held a response; the new one was ignored.
    Duplicate,
    /// No live entry; the response was dropped.
    Dropped,
}

/// Correlates inbound responses with pending entries.
pub struct ResponseDispatcher<Id, O> {
    handlers: Arc<ExpiringMap<Id, ResponseHandlers<O>>>,
    stats: Arc<RequestStats>,
}

impl<Id, O> Clone for ResponseDispatcher<Id, O> {
    fn clone(&self) -> Self {
        Self {
            handlers: Arc::clone(&self.handlers),
            stats: Arc::clone(&self.stats),
        }
    }
}

impl<Id, O> ResponseDispatcher<Id, O>
where
    Id: Eq + Hash + Clone + Display,
    O: Clone,
{
    pub fn new(handlers: Arc<ExpiringMap<Id, ResponseHandlers<O>>>, stats: Arc<RequestStats>) -> Self {
        Self { handlers, stats }
    }

    /// Handle one response delivered for `request_id`.
    ///
    /// Safe to call concurrently: deliveries for the same identifier are
    /// serialised by the registry, different identifiers run in parallel.
    pub fn receive(&self, request_id: Id, response: O) -> DispatchOutcome {
        let resolved = self
            .handlers
            .compute_if_present(&request_id, |handlers| handlers.resolve(response));

        match resolved {
            Some(Some(waiters)) => {
                RequestStats::incr(&self.stats.responses_delivered);
                debug!(
                    request_id = %request_id,
                    waiters = waiters,
                    "Response delivered to pending request"
                );
                DispatchOutcome::Delivered { waiters }
            }
            Some(None) => {
                RequestStats::incr(&self.stats.duplicate_responses);
                debug!(
                    request_id = %request_id,
                    "Duplicate response ignored, first response kept"
                );
                DispatchOutcome::Duplicate
            }
            None => {
                RequestStats::incr(&self.stats.responses_dropped);
                warn!(
                    request_id = %request_id,
                    "Response for unknown or expired request id dropped"
                );
                DispatchOutcome::Dropped
            }
        }
    }
}
