//! Request API service - publish requests and await their responses.

use crate::dispatcher::ResponseDispatcher;
use crate::domain::config::RequestApiConfig;
use crate::domain::error::{ConfigError, PublishStage, RequestError, TransportError};
use crate::domain::expiring_map::ExpiringMap;
use crate::domain::handlers::{ResponseFuture, ResponseHandlers, Waiter};
use crate::domain::request_id::RequestId;
use crate::domain::stats::{RequestStats, StatsSnapshot};
use crate::ports::outbound::{
    Closeable, PublishResult, RequestPublisher, ResponseHandlerFn, ResponseSubscriber, TimeSource,
    TopicProvisioner,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

type HandlerMap<O> = ExpiringMap<RequestId, ResponseHandlers<O>>;

/// Asynchronous request/response over a topic bus.
///
/// Flow:
/// 1. Caller generates a `RequestId`
/// 2. `publish_request()` publishes the response-topic mapping, then the
///    payload, then registers the id
/// 3. Downstream processing publishes the response on the private topic
/// 4. The dispatcher resolves every waiter and caches the response
/// 5. `query_response()` attaches a waiter or reads the cached response
///
/// Entries time out by eviction: every `publish_request()` sweeps entries
/// older than the retention window and fails their waiters.
pub struct RequestApi<K, I, O> {
    config: RequestApiConfig,
    handlers: Arc<HandlerMap<O>>,
    request_sender: Arc<dyn RequestPublisher<K, I>>,
    response_topic_map_sender: Arc<dyn RequestPublisher<RequestId, String>>,
    response_subscription: Box<dyn Closeable>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
    stats: Arc<RequestStats>,
    closed: AtomicBool,
}

impl<K, I, O> RequestApi<K, I, O>
where
    K: Send + Sync + 'static,
    I: Send + Sync + 'static,
    O: Clone + Send + Sync + 'static,
{
    /// Create the API and open the response subscription.
    ///
    /// # Errors
    ///
    /// - Any `ConfigError` from `config.validate()`
    /// - `ConfigError::NoRuntime` - `sweep_interval` is set outside a tokio runtime
    /// - `ConfigError::Subscription` - the response subscription failed to open
    pub fn new(
        config: RequestApiConfig,
        request_sender: Arc<dyn RequestPublisher<K, I>>,
        response_topic_map_sender: Arc<dyn RequestPublisher<RequestId, String>>,
        response_subscriber: &dyn ResponseSubscriber<O>,
        time_source: Arc<dyn TimeSource>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let runtime = match config.sweep_interval {
            Some(_) => Some(
                Handle::try_current().map_err(|e| ConfigError::NoRuntime(e.to_string()))?,
            ),
            None => None,
        };

        let handlers = Arc::new(ExpiringMap::new(config.retention(), time_source)?);
        let stats = Arc::new(RequestStats::default());

        let dispatcher = ResponseDispatcher::new(Arc::clone(&handlers), Arc::clone(&stats));
        let on_response: ResponseHandlerFn<O> = Arc::new(move |id: RequestId, response: O| {
            dispatcher.receive(id, response);
        });
        let response_subscription = response_subscriber.subscribe(on_response)?;

        let sweeper = runtime.zip(config.sweep_interval).map(|(runtime, interval)| {
            runtime.spawn(sweep_task(
                Arc::clone(&handlers),
                Arc::clone(&stats),
                interval,
            ))
        });

        info!(
            request_topic = %config.request_topic,
            private_response_topic = %config.private_response_topic,
            retention_ms = config.retention().as_millis() as u64,
            periodic_sweep = sweeper.is_some(),
            "Request API started"
        );

        Ok(Self {
            config,
            handlers,
            request_sender,
            response_topic_map_sender,
            response_subscription,
            sweeper: Mutex::new(sweeper),
            stats,
            closed: AtomicBool::new(false),
        })
    }

    /// Publish a request and register it for response correlation.
    ///
    /// `request_id` must be fresh. Publishing again under an id that is still
    /// registered does not replace its entry.
    ///
    /// Expired entries are swept before the first send, so the sweep happens
    /// whatever the outcome, even if this future is dropped mid-send. Their
    /// waiters fail with `RequestError::TimedOut`.
    ///
    /// # Errors
    ///
    /// - `RequestError::TransportSend` - the mapping or payload send failed;
    ///   the request is not registered
    pub async fn publish_request(
        &self,
        key: &K,
        request_id: RequestId,
        request: &I,
    ) -> Result<PublishResult, RequestError> {
        self.remove_stale();
        self.publish_and_register(key, request_id, request).await
    }

    async fn publish_and_register(
        &self,
        key: &K,
        request_id: RequestId,
        request: &I,
    ) -> Result<PublishResult, RequestError> {
        self.response_topic_map_sender
            .publish(&request_id, &self.config.private_response_topic)
            .await
            .map_err(|source| self.publish_failed(request_id, PublishStage::Mapping, source))?;

        let published = self
            .request_sender
            .publish(key, request)
            .await
            .map_err(|source| self.publish_failed(request_id, PublishStage::Request, source))?;

        if self
            .handlers
            .insert_if_absent(request_id, ResponseHandlers::awaiting)
        {
            RequestStats::incr(&self.stats.requests_published);
            debug!(
                request_id = %request_id,
                partition = published.partition,
                offset = published.offset,
                "Request published and registered"
            );
        } else {
            RequestStats::incr(&self.stats.duplicate_registrations);
            debug!(
                request_id = %request_id,
                "Request id already registered, existing entry kept"
            );
        }

        Ok(published)
    }

    fn publish_failed(
        &self,
        request_id: RequestId,
        stage: PublishStage,
        source: TransportError,
    ) -> RequestError {
        RequestStats::incr(&self.stats.publish_failures);
        warn!(
            request_id = %request_id,
            stage = %stage,
            error = %source,
            "Request publish failed"
        );
        RequestError::TransportSend { stage, source }
    }

    /// Get a handle on the response for `request_id`.
    ///
    /// Never blocks. The handle resolves at once if the response is already
    /// cached, fails at once with `RequestError::UnknownRequestId` if the id
    /// has no live entry, and otherwise resolves when the response arrives or
    /// the entry is evicted.
    ///
    /// `timeout` is the caller's wait budget. It is recorded on the handle but
    /// not enforced; the retention window bounds the wait.
    pub fn query_response(&self, request_id: RequestId, timeout: Duration) -> ResponseFuture<O> {
        let (waiter, future) = Waiter::new(timeout);

        // The waiter moves into the closure only when the entry exists.
        let mut waiter = Some(waiter);
        let found = self.handlers.compute_if_present(&request_id, |handlers| {
            if let Some(waiter) = waiter.take() {
                handlers.attach(waiter);
            }
        });

        match (found, waiter) {
            (None, Some(waiter)) => {
                debug!(request_id = %request_id, "Query for unknown request id");
                waiter.complete(Err(RequestError::UnknownRequestId(request_id)));
            }
            _ => {
                debug!(
                    request_id = %request_id,
                    timeout_ms = timeout.as_millis() as u64,
                    "Waiter attached"
                );
            }
        }

        future
    }

    /// Evict expired entries now, failing their waiters with a timeout.
    ///
    /// Returns the number of entries evicted.
    pub fn remove_stale(&self) -> usize {
        expire_stale(&self.handlers, &self.stats)
    }
}

impl<K, I, O> RequestApi<K, I, O> {
    /// Stop receiving responses. Idempotent.
    ///
    /// Waiters still attached are not resolved by closing.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        info!(
            private_response_topic = %self.config.private_response_topic,
            pending = self.handlers.len(),
            "Request API shutting down"
        );
        self.response_subscription.close();
        if let Some(sweeper) = self.sweeper.lock().take() {
            sweeper.abort();
        }
    }

    /// Whether `close()` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Number of live registry entries, resolved or not.
    pub fn pending_count(&self) -> usize {
        self.handlers.len()
    }

    /// Counters since startup.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Configuration this API was started with.
    pub fn config(&self) -> &RequestApiConfig {
        &self.config
    }
}

impl<K, I, O> Drop for RequestApi<K, I, O> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Sweep `handlers`, failing the waiters of every evicted entry.
fn expire_stale<O>(handlers: &HandlerMap<O>, stats: &RequestStats) -> usize {
    let mut timed_out = 0;
    let evicted = handlers.remove_stale(|request_id, entry| {
        if !entry.is_resolved() {
            debug!(request_id = %request_id, "Evicting unresolved request");
        }
        timed_out += entry.fail_all(RequestError::TimedOut(request_id));
    });

    if evicted > 0 {
        RequestStats::add(&stats.entries_evicted, evicted);
        RequestStats::add(&stats.waiters_timed_out, timed_out);
        debug!(
            evicted = evicted,
            timed_out = timed_out,
            "Swept expired requests"
        );
    }
    evicted
}

/// Background task sweeping on a fixed interval.
async fn sweep_task<O>(handlers: Arc<HandlerMap<O>>, stats: Arc<RequestStats>, interval: Duration) {
    let mut sweep_interval = tokio::time::interval(interval);
    sweep_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        sweep_interval.tick().await;
        expire_stale(&handlers, &stats);
    }
}

/// Create the private response topic if it does not exist.
///
/// # Errors
///
/// - `ConfigError::Provisioning` - listing or creating topics failed
pub async fn ensure_response_topic(
    provisioner: &dyn TopicProvisioner,
    config: &RequestApiConfig,
) -> Result<(), ConfigError> {
    let topics = provisioner
        .list_topics()
        .await
        .map_err(|e| ConfigError::Provisioning(e.to_string()))?;

    if topics.iter().any(|t| t == &config.private_response_topic) {
        return Ok(());
    }

    provisioner
        .create_topic(&config.private_response_topic, config.output_topic_spec)
        .await
        .map_err(|e| ConfigError::Provisioning(e.to_string()))?;

    info!(
        topic = %config.private_response_topic,
        partitions = config.output_topic_spec.partition_count,
        "Private response topic created"
    );
    Ok(())
}
