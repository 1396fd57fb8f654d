//! Outbound (Driven) ports for the request API.
//!
//! These traits define the collaborators the correlation engine depends on
//! but does not implement: the transport, its serialization, topic
//! provisioning and the clock.

use crate::domain::error::{SerdeError, TransportError};
use crate::domain::request_id::RequestId;
use async_trait::async_trait;
use shared_bus::TopicSpec;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Milliseconds since the Unix epoch.
pub type Timestamp = u64;

/// Acknowledgement of a successful publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishResult {
    /// Time the transport stamped on the record.
    pub timestamp: Timestamp,
    /// Partition the record landed on.
    pub partition: u32,
    /// Offset within that partition.
    pub offset: u64,
}

/// Sends a `(key, value)` pair to one fixed topic.
///
/// Two independent instances are used by the request API: one for the
/// response-topic mapping, one for the request payload.
#[async_trait]
pub trait RequestPublisher<K, V>: Send + Sync {
    /// Publish `value` under `key`.
    ///
    /// # Errors
    ///
    /// - `TransportError::Serialization` - key or value could not be encoded
    /// - `TransportError::Send` - the transport failed the send
    async fn publish(&self, key: &K, value: &V) -> Result<PublishResult, TransportError>;
}

/// Callback invoked for every response delivered on the private topic.
pub type ResponseHandlerFn<O> = Arc<dyn Fn(RequestId, O) + Send + Sync>;

/// Something that can be shut down. Closing twice is a no-op.
pub trait Closeable: Send + Sync {
    fn close(&self);
}

/// Opens the inbound response subscription.
pub trait ResponseSubscriber<O>: Send + Sync {
    /// Start delivering responses to `handler`.
    ///
    /// Delivery is at-least-once with no ordering across identifiers. The
    /// returned handle stops delivery when closed.
    fn subscribe(&self, handler: ResponseHandlerFn<O>) -> Result<Box<dyn Closeable>, TransportError>;
}

/// Administrative topic access needed at startup.
#[async_trait]
pub trait TopicProvisioner: Send + Sync {
    /// Names of existing topics.
    async fn list_topics(&self) -> Result<Vec<String>, TransportError>;

    /// Create a topic. Returns `false` if it already existed.
    async fn create_topic(&self, name: &str, spec: TopicSpec) -> Result<bool, TransportError>;
}

/// Converts values to and from the transport's byte representation.
pub trait Serde<T>: Send + Sync {
    fn serialize(&self, value: &T) -> Result<Vec<u8>, SerdeError>;
    fn deserialize(&self, bytes: &[u8]) -> Result<T, SerdeError>;
}

/// Time source for consistent timestamp handling.
///
/// Abstracted to allow testing with deterministic time.
pub trait TimeSource: Send + Sync {
    /// Returns the current timestamp in milliseconds.
    fn now(&self) -> Timestamp;
}

/// Default system time source.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Timestamp {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as Timestamp
    }
}

/// Manually driven time source.
///
/// Starts at a fixed instant and only moves when told to.
#[derive(Debug, Default)]
pub struct ManualTimeSource {
    time: AtomicU64,
}

impl ManualTimeSource {
    pub fn new(initial: Timestamp) -> Self {
        Self {
            time: AtomicU64::new(initial),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.time
            .fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set(&self, time: Timestamp) {
        self.time.store(time, Ordering::SeqCst);
    }
}

impl TimeSource for ManualTimeSource {
    fn now(&self) -> Timestamp {
        self.time.load(Ordering::SeqCst)
    }
}
