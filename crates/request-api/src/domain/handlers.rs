//! Pending-request entries and the waiter handles attached to them.
//!
//! An entry starts out awaiting a response with zero or more waiters. The
//! first response resolves every waiter and is cached; from then on the
//! entry only answers queries from the cache until it is evicted.

use crate::domain::error::RequestError;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::oneshot;

/// Completion side of a waiter. Completed at most once.
#[derive(Debug)]
pub struct Waiter<O> {
    sender: oneshot::Sender<Result<O, RequestError>>,
}

impl<O> Waiter<O> {
    /// Create a waiter and the future its caller awaits.
    pub fn new(wait_budget: Duration) -> (Self, ResponseFuture<O>) {
        let (sender, receiver) = oneshot::channel();
        (
            Self { sender },
            ResponseFuture {
                receiver,
                wait_budget,
            },
        )
    }

    /// Complete the waiter. An abandoned future is not an error.
    pub fn complete(self, result: Result<O, RequestError>) {
        let _ = self.sender.send(result);
    }

    /// Whether the caller dropped its future.
    pub fn is_abandoned(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Caller side of a waiter: resolves to the response or the failure.
///
/// Resolves to `RequestError::Closed` if the waiter is dropped without being
/// completed.
#[derive(Debug)]
pub struct ResponseFuture<O> {
    receiver: oneshot::Receiver<Result<O, RequestError>>,
    wait_budget: Duration,
}

impl<O> ResponseFuture<O> {
    /// The wait budget the caller asked for. Advisory only: the registry's
    /// retention window decides when the request actually times out.
    pub fn wait_budget(&self) -> Duration {
        self.wait_budget
    }

    /// Take the result if the waiter has already been completed.
    pub fn try_result(&mut self) -> Option<Result<O, RequestError>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(RequestError::Closed)),
        }
    }
}

impl<O> Future for ResponseFuture<O> {
    type Output = Result<O, RequestError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(RequestError::Closed)),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Per-request state stored in the registry.
#[derive(Debug)]
pub struct ResponseHandlers<O> {
    /// Waiters not yet completed. Always empty once `response` is set.
    waiters: Vec<Waiter<O>>,
    /// The first response observed.
    response: Option<O>,
}

impl<O> Default for ResponseHandlers<O> {
    fn default() -> Self {
        Self::awaiting()
    }
}

impl<O> ResponseHandlers<O> {
    /// Entry with no waiters and no response yet.
    pub fn awaiting() -> Self {
        Self {
            waiters: Vec::new(),
            response: None,
        }
    }

    /// Whether a response has been cached.
    pub fn is_resolved(&self) -> bool {
        self.response.is_some()
    }

    /// Number of waiters still attached.
    pub fn waiter_count(&self) -> usize {
        self.waiters.len()
    }

    /// The cached response, if any.
    pub fn response(&self) -> Option<&O> {
        self.response.as_ref()
    }

    /// Fail every attached waiter with `error`, consuming the entry.
    ///
    /// Returns the number of waiters failed.
    pub fn fail_all(self, error: RequestError) -> usize {
        let count = self.waiters.len();
        for waiter in self.waiters {
            waiter.complete(Err(error.clone()));
        }
        count
    }
}

impl<O: Clone> ResponseHandlers<O> {
    /// Attach a waiter, or complete it at once from the cached response.
    pub fn attach(&mut self, waiter: Waiter<O>) {
        match &self.response {
            Some(response) => waiter.complete(Ok(response.clone())),
            None => self.waiters.push(waiter),
        }
    }

    /// Complete every attached waiter with `response` and cache it.
    ///
    /// Returns the number of waiters completed, or `None` if the entry was
    /// already resolved; the first cached response is kept.
    pub fn resolve(&mut self, response: O) -> Option<usize> {
        if self.response.is_some() {
            return None;
        }

        let waiters = std::mem::take(&mut self.waiters);
        let count = waiters.len();
        for waiter in waiters {
            waiter.complete(Ok(response.clone()));
        }
        self.response = Some(response);
        Some(count)
    }
}
