//! Topic bus adapter.
//!
//! Implements the outbound ports over `shared_bus::InMemoryTopicBus` and
//! wires a [`RequestApi`] to it.

use crate::adapters::serdes::{JsonSerde, RequestIdSerde, Utf8Serde};
use crate::domain::config::RequestApiConfig;
use crate::domain::error::{ConfigError, TransportError};
use crate::domain::request_id::RequestId;
use crate::ports::outbound::{
    Closeable, PublishResult, RequestPublisher, ResponseHandlerFn, ResponseSubscriber, Serde,
    SystemTimeSource, TimeSource, TopicProvisioner,
};
use crate::service::{ensure_response_topic, RequestApi};
use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use shared_bus::{InMemoryTopicBus, Record, TopicPublisher, TopicSpec};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Publishes `(key, value)` pairs to one topic of the bus.
pub struct BusPublisher<K, V> {
    bus: Arc<InMemoryTopicBus>,
    topic: String,
    key_serde: Arc<dyn Serde<K>>,
    value_serde: Arc<dyn Serde<V>>,
}

impl<K, V> BusPublisher<K, V> {
    pub fn new(
        bus: Arc<InMemoryTopicBus>,
        topic: impl Into<String>,
        key_serde: Arc<dyn Serde<K>>,
        value_serde: Arc<dyn Serde<V>>,
    ) -> Self {
        Self {
            bus,
            topic: topic.into(),
            key_serde,
            value_serde,
        }
    }

    /// Topic this publisher writes to.
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

#[async_trait]
impl<K, V> RequestPublisher<K, V> for BusPublisher<K, V>
where
    K: Sync,
    V: Sync,
{
    async fn publish(&self, key: &K, value: &V) -> Result<PublishResult, TransportError> {
        let key = self.key_serde.serialize(key)?;
        let value = self.value_serde.serialize(value)?;

        let ack = self
            .bus
            .publish(&self.topic, key, value)
            .await
            .map_err(|e| TransportError::Send {
                topic: self.topic.clone(),
                reason: e.to_string(),
            })?;

        Ok(PublishResult {
            timestamp: ack.timestamp,
            partition: ack.partition,
            offset: ack.offset,
        })
    }
}

/// Consumes the private response topic and hands decoded responses to the
/// registered handler.
pub struct BusResponseSubscriber<O> {
    bus: Arc<InMemoryTopicBus>,
    topic: String,
    key_serde: Arc<dyn Serde<RequestId>>,
    value_serde: Arc<dyn Serde<O>>,
}

impl<O> BusResponseSubscriber<O> {
    pub fn new(
        bus: Arc<InMemoryTopicBus>,
        topic: impl Into<String>,
        key_serde: Arc<dyn Serde<RequestId>>,
        value_serde: Arc<dyn Serde<O>>,
    ) -> Self {
        Self {
            bus,
            topic: topic.into(),
            key_serde,
            value_serde,
        }
    }
}

impl<O> ResponseSubscriber<O> for BusResponseSubscriber<O>
where
    O: Send + 'static,
{
    /// Spawns the consumer task, so it must be called inside a tokio runtime.
    fn subscribe(&self, handler: ResponseHandlerFn<O>) -> Result<Box<dyn Closeable>, TransportError> {
        let mut stream = self
            .bus
            .record_stream(&self.topic)
            .map_err(|e| TransportError::Subscribe {
                topic: self.topic.clone(),
                reason: e.to_string(),
            })?;

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let topic = self.topic.clone();
        let key_serde = Arc::clone(&self.key_serde);
        let value_serde = Arc::clone(&self.value_serde);

        let task = tokio::spawn(async move {
            info!(topic = %topic, "Response consumer started");

            loop {
                tokio::select! {
                    // Shutdown wins over records already queued
                    biased;
                    _ = &mut shutdown_rx => break,
                    next = stream.next() => match next {
                        Some(record) => {
                            if let Some((request_id, response)) =
                                decode_response(&record, key_serde.as_ref(), value_serde.as_ref())
                            {
                                handler(request_id, response);
                            }
                        }
                        None => {
                            warn!(topic = %topic, "Response stream ended, stopping consumer");
                            break;
                        }
                    },
                }
            }

            info!(topic = %topic, "Response consumer stopped");
        });

        Ok(Box::new(ConsumerHandle::new(shutdown_tx, task)))
    }
}

/// Decode one response record, or log and skip it.
fn decode_response<O>(
    record: &Record,
    key_serde: &dyn Serde<RequestId>,
    value_serde: &dyn Serde<O>,
) -> Option<(RequestId, O)> {
    let request_id = match key_serde.deserialize(&record.key) {
        Ok(id) => id,
        Err(e) => {
            warn!(
                topic = %record.topic,
                partition = record.partition,
                offset = record.offset,
                error = %e,
                "Skipping response with undecodable request id"
            );
            return None;
        }
    };

    match value_serde.deserialize(&record.value) {
        Ok(response) => {
            debug!(
                request_id = %request_id,
                partition = record.partition,
                offset = record.offset,
                "Response received"
            );
            Some((request_id, response))
        }
        Err(e) => {
            warn!(
                request_id = %request_id,
                topic = %record.topic,
                offset = record.offset,
                error = %e,
                "Skipping undecodable response"
            );
            None
        }
    }
}

/// Handle on a running response consumer.
pub struct ConsumerHandle {
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
    task: JoinHandle<()>,
}

impl ConsumerHandle {
    fn new(shutdown: oneshot::Sender<()>, task: JoinHandle<()>) -> Self {
        Self {
            shutdown: Mutex::new(Some(shutdown)),
            task,
        }
    }

    /// Whether the consumer task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Closeable for ConsumerHandle {
    fn close(&self) {
        if let Some(shutdown) = self.shutdown.lock().take() {
            // Err means the task already exited
            let _ = shutdown.send(());
        }
    }
}

/// [`TopicProvisioner`] backed by the bus's topic table.
pub struct BusTopicProvisioner {
    bus: Arc<InMemoryTopicBus>,
}

impl BusTopicProvisioner {
    pub fn new(bus: Arc<InMemoryTopicBus>) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl TopicProvisioner for BusTopicProvisioner {
    async fn list_topics(&self) -> Result<Vec<String>, TransportError> {
        Ok(self.bus.list_topics())
    }

    async fn create_topic(&self, name: &str, spec: TopicSpec) -> Result<bool, TransportError> {
        self.bus
            .create_topic(name, spec)
            .map_err(|e| TransportError::Admin(e.to_string()))
    }
}

/// Codecs used by [`connect`].
pub struct BusSerdes<K, I, O> {
    /// Request key (the aggregate key).
    pub key: Arc<dyn Serde<K>>,
    /// Request payload.
    pub request: Arc<dyn Serde<I>>,
    /// Response payload.
    pub response: Arc<dyn Serde<O>>,
    /// Request identifiers, as used on the mapping and response topics.
    pub request_id: Arc<dyn Serde<RequestId>>,
}

impl<K, I, O> BusSerdes<K, I, O>
where
    K: Serialize + DeserializeOwned + 'static,
    I: Serialize + DeserializeOwned + 'static,
    O: Serialize + DeserializeOwned + 'static,
{
    /// JSON for keys and payloads, UUID text for request identifiers.
    pub fn json() -> Self {
        Self {
            key: Arc::new(JsonSerde::<K>::new()),
            request: Arc::new(JsonSerde::<I>::new()),
            response: Arc::new(JsonSerde::<O>::new()),
            request_id: Arc::new(RequestIdSerde),
        }
    }
}

/// Build a [`RequestApi`] over `bus` with the system clock.
///
/// The request and mapping topics must already exist on the bus. The
/// private response topic is created when `config.create_topics` is set.
///
/// # Errors
///
/// - Any `ConfigError` from `config.validate()`
/// - `ConfigError::Provisioning` - the response topic could not be created
/// - `ConfigError::Subscription` - the response topic could not be consumed
pub async fn connect<K, I, O>(
    bus: Arc<InMemoryTopicBus>,
    config: RequestApiConfig,
    serdes: BusSerdes<K, I, O>,
) -> Result<RequestApi<K, I, O>, ConfigError>
where
    K: Send + Sync + 'static,
    I: Send + Sync + 'static,
    O: Clone + Send + Sync + 'static,
{
    connect_with_time_source(bus, config, serdes, Arc::new(SystemTimeSource)).await
}

/// Like [`connect`], with an explicit clock for the retention window.
pub async fn connect_with_time_source<K, I, O>(
    bus: Arc<InMemoryTopicBus>,
    config: RequestApiConfig,
    serdes: BusSerdes<K, I, O>,
    time_source: Arc<dyn TimeSource>,
) -> Result<RequestApi<K, I, O>, ConfigError>
where
    K: Send + Sync + 'static,
    I: Send + Sync + 'static,
    O: Clone + Send + Sync + 'static,
{
    config.validate()?;

    if config.create_topics {
        let provisioner = BusTopicProvisioner::new(Arc::clone(&bus));
        ensure_response_topic(&provisioner, &config).await?;
    }

    let request_sender: Arc<dyn RequestPublisher<K, I>> = Arc::new(BusPublisher::new(
        Arc::clone(&bus),
        config.request_topic.clone(),
        serdes.key,
        serdes.request,
    ));
    let mapping_sender: Arc<dyn RequestPublisher<RequestId, String>> =
        Arc::new(BusPublisher::new(
            Arc::clone(&bus),
            config.response_topic_map_topic.clone(),
            Arc::clone(&serdes.request_id),
            Arc::new(Utf8Serde),
        ));
    let subscriber = BusResponseSubscriber::new(
        bus,
        config.private_response_topic.clone(),
        serdes.request_id,
        serdes.response,
    );

    RequestApi::new(
        config,
        request_sender,
        mapping_sender,
        &subscriber,
        time_source,
    )
}
