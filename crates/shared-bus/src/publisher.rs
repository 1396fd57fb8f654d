//! # Topic Publisher
//!
//! Defines the publishing side of the bus and the in-memory bus itself.

use crate::record::{BusError, PublishAck, Record, TopicSpec};
use crate::subscriber::{RecordStream, Subscription};
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Trait for publishing keyed records to a topic.
#[async_trait]
pub trait TopicPublisher: Send + Sync {
    /// Publish a record to a topic.
    ///
    /// # Returns
    ///
    /// The partition, offset and timestamp assigned to the record.
    ///
    /// # Errors
    ///
    /// - `BusError::UnknownTopic` - The topic has not been created
    async fn publish(
        &self,
        topic: &str,
        key: Vec<u8>,
        value: Vec<u8>,
    ) -> Result<PublishAck, BusError>;

    /// Get the total number of records published.
    fn records_published(&self) -> u64;
}

/// A provisioned topic.
struct Topic {
    /// Fan-out to every subscription of this topic.
    sender: broadcast::Sender<Record>,
    /// Next offset per partition.
    next_offsets: Vec<AtomicU64>,
}

impl Topic {
    fn new(partition_count: u32, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            next_offsets: (0..partition_count).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    fn partition_count(&self) -> u32 {
        self.next_offsets.len() as u32
    }
}

/// In-memory implementation of the topic bus.
///
/// Uses one `tokio::sync::broadcast` channel per topic for multi-producer,
/// multi-consumer semantics. Suitable for single-process operation and tests;
/// distributed deployments would put a broker behind the same traits.
pub struct InMemoryTopicBus {
    /// Provisioned topics by name.
    topics: RwLock<HashMap<String, Arc<Topic>>>,

    /// Active subscription count by topic.
    subscriptions: Arc<RwLock<HashMap<String, usize>>>,

    /// Total records published.
    records_published: AtomicU64,

    /// Per-subscriber channel capacity.
    capacity: usize,
}

impl InMemoryTopicBus {
    /// Create a new bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new bus with the specified per-subscriber capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            subscriptions: Arc::new(RwLock::new(HashMap::new())),
            records_published: AtomicU64::new(0),
            capacity,
        }
    }

    /// Create a topic if it does not exist yet.
    ///
    /// Returns `true` if the topic was created, `false` if it already existed
    /// (the existing partition layout is kept).
    ///
    /// # Errors
    ///
    /// - `BusError::EmptyTopicName` - `name` is empty
    /// - `BusError::InvalidPartitionCount` - `spec.partition_count` is zero
    pub fn create_topic(&self, name: &str, spec: TopicSpec) -> Result<bool, BusError> {
        if name.is_empty() {
            return Err(BusError::EmptyTopicName);
        }
        if spec.partition_count == 0 {
            return Err(BusError::InvalidPartitionCount {
                topic: name.to_string(),
                partitions: spec.partition_count,
            });
        }

        let mut topics = self.topics.write();
        if topics.contains_key(name) {
            return Ok(false);
        }
        topics.insert(
            name.to_string(),
            Arc::new(Topic::new(spec.partition_count, self.capacity)),
        );
        info!(
            topic = name,
            partitions = spec.partition_count,
            replicas = spec.replica_count,
            "Topic created"
        );
        Ok(true)
    }

    /// Names of all provisioned topics.
    #[must_use]
    pub fn list_topics(&self) -> Vec<String> {
        self.topics.read().keys().cloned().collect()
    }

    /// Number of partitions of a topic, if it exists.
    #[must_use]
    pub fn partition_count(&self, topic: &str) -> Option<u32> {
        self.topics.read().get(topic).map(|t| t.partition_count())
    }

    /// Subscribe to every record published to `topic` from now on.
    ///
    /// # Errors
    ///
    /// - `BusError::UnknownTopic` - The topic has not been created
    pub fn subscribe(&self, topic: &str) -> Result<Subscription, BusError> {
        let receiver = self.topic(topic)?.sender.subscribe();

        {
            let mut subs = self.subscriptions.write();
            *subs.entry(topic.to_string()).or_insert(0) += 1;
        }

        debug!(topic = topic, "New subscription created");

        Ok(Subscription::new(
            receiver,
            topic.to_string(),
            self.subscriptions.clone(),
        ))
    }

    /// Get a stream of records published to `topic`.
    ///
    /// # Errors
    ///
    /// - `BusError::UnknownTopic` - The topic has not been created
    pub fn record_stream(&self, topic: &str) -> Result<RecordStream, BusError> {
        self.subscribe(topic).map(RecordStream::new)
    }

    /// Number of live subscriptions on `topic`.
    #[must_use]
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.subscriptions.read().get(topic).copied().unwrap_or(0)
    }

    /// Get the per-subscriber channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn topic(&self, name: &str) -> Result<Arc<Topic>, BusError> {
        self.topics
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| BusError::UnknownTopic(name.to_string()))
    }

    /// Partition a key hashes to. Stable for the lifetime of the process.
    fn partition_for(key: &[u8], partition_count: u32) -> u32 {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % u64::from(partition_count)) as u32
    }

    fn current_timestamp() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

impl Default for InMemoryTopicBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TopicPublisher for InMemoryTopicBus {
    async fn publish(
        &self,
        topic: &str,
        key: Vec<u8>,
        value: Vec<u8>,
    ) -> Result<PublishAck, BusError> {
        let target = self.topic(topic)?;

        let partition = Self::partition_for(&key, target.partition_count());
        let offset = target.next_offsets[partition as usize].fetch_add(1, Ordering::SeqCst);
        let timestamp = Self::current_timestamp();

        self.records_published.fetch_add(1, Ordering::Relaxed);

        let record = Record {
            topic: topic.to_string(),
            partition,
            offset,
            timestamp,
            key,
            value,
        };

        match target.sender.send(record) {
            Ok(receivers) => {
                debug!(
                    topic = topic,
                    partition = partition,
                    offset = offset,
                    receivers = receivers,
                    "Record published"
                );
            }
            Err(_) => {
                // No subscribers - the record is not retained
                debug!(
                    topic = topic,
                    partition = partition,
                    offset = offset,
                    "Record published with no subscribers"
                );
            }
        }

        Ok(PublishAck {
            partition,
            offset,
            timestamp,
        })
    }

    fn records_published(&self) -> u64 {
        self.records_published.load(Ordering::Relaxed)
    }
}
