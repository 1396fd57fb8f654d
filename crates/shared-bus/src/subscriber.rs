//! # Topic Subscriber
//!
//! Defines the subscription side of the bus.

use crate::record::Record;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::Stream;
use tracing::debug;

/// Errors from subscription operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The bus was dropped.
    #[error("Topic bus closed")]
    Closed,
}

/// Releases the per-topic subscription count on drop.
struct SubscriptionGuard {
    topic: String,
    subscriptions: Arc<RwLock<HashMap<String, usize>>>,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        let mut subs = self.subscriptions.write();
        if let Some(count) = subs.get_mut(&self.topic) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                subs.remove(&self.topic);
            }
        }
        debug!(topic = %self.topic, "Subscription dropped");
    }
}

/// A subscription handle for receiving records of one topic.
///
/// When dropped, the subscription is automatically cleaned up.
pub struct Subscription {
    /// The broadcast receiver.
    receiver: broadcast::Receiver<Record>,

    /// Tracking entry for this subscription.
    guard: SubscriptionGuard,
}

impl Subscription {
    /// Create a new subscription.
    pub(crate) fn new(
        receiver: broadcast::Receiver<Record>,
        topic: String,
        subscriptions: Arc<RwLock<HashMap<String, usize>>>,
    ) -> Self {
        Self {
            receiver,
            guard: SubscriptionGuard {
                topic,
                subscriptions,
            },
        }
    }

    /// Receive the next record.
    ///
    /// # Returns
    ///
    /// - `Some(record)` - The next record
    /// - `None` - The channel was closed (bus dropped)
    pub async fn recv(&mut self) -> Option<Record> {
        loop {
            match self.receiver.recv().await {
                Ok(record) => return Some(record),
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    debug!(
                        topic = %self.guard.topic,
                        lagged = count,
                        "Subscriber lagged, some records dropped"
                    );
                }
            }
        }
    }

    /// Try to receive the next record without blocking.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(record))` - A record was available
    /// - `Ok(None)` - No record available (would block)
    /// - `Err(SubscriptionError::Closed)` - The channel was closed
    pub fn try_recv(&mut self) -> Result<Option<Record>, SubscriptionError> {
        loop {
            match self.receiver.try_recv() {
                Ok(record) => return Ok(Some(record)),
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(SubscriptionError::Closed)
                }
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            }
        }
    }

    /// Topic this subscription reads.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.guard.topic
    }
}

/// A stream wrapper for subscriptions.
///
/// Implements `tokio_stream::Stream` for use with stream combinators.
pub struct RecordStream {
    inner: BroadcastStream<Record>,
    guard: SubscriptionGuard,
}

impl RecordStream {
    /// Create a new record stream from a subscription.
    #[must_use]
    pub fn new(subscription: Subscription) -> Self {
        let Subscription { receiver, guard } = subscription;
        Self {
            inner: BroadcastStream::new(receiver),
            guard,
        }
    }

    /// Topic this stream reads.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.guard.topic
    }
}

impl Stream for RecordStream {
    type Item = Record;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(record))) => return Poll::Ready(Some(record)),
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(count)))) => {
                    debug!(
                        topic = %self.guard.topic,
                        lagged = count,
                        "Stream lagged, some records dropped"
                    );
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
