//! # Records
//!
//! The units that flow through the bus and the acknowledgements returned to
//! publishers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from bus operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    /// The topic has not been created.
    #[error("Unknown topic: {0}")]
    UnknownTopic(String),

    /// A topic must have at least one partition.
    #[error("Topic {topic} requested with {partitions} partitions")]
    InvalidPartitionCount { topic: String, partitions: u32 },

    /// The topic name is empty.
    #[error("Topic name cannot be empty")]
    EmptyTopicName,
}

/// Provisioning parameters for a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicSpec {
    /// Number of partitions records are spread over.
    pub partition_count: u32,
    /// Replication factor. Accepted for parity with real brokers; the
    /// in-memory bus keeps a single copy.
    pub replica_count: u16,
}

impl TopicSpec {
    /// Create a topic spec.
    #[must_use]
    pub fn new(partition_count: u32, replica_count: u16) -> Self {
        Self {
            partition_count,
            replica_count,
        }
    }
}

impl Default for TopicSpec {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

/// A record as delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Topic the record was published to.
    pub topic: String,
    /// Partition the key hashed to.
    pub partition: u32,
    /// Position within the partition.
    pub offset: u64,
    /// Publish time in milliseconds since the Unix epoch.
    pub timestamp: u64,
    /// Serialized key.
    pub key: Vec<u8>,
    /// Serialized value.
    pub value: Vec<u8>,
}

/// Acknowledgement for a successful publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishAck {
    /// Partition the record was appended to.
    pub partition: u32,
    /// Offset assigned within the partition.
    pub offset: u64,
    /// Publish time in milliseconds since the Unix epoch.
    pub timestamp: u64,
}
