//! Error types for the request API.
//!
//! Every failure a caller can observe on a waiter is a [`RequestError`];
//! construction problems are [`ConfigError`] and abort startup.

use crate::domain::request_id::RequestId;
use std::fmt;
use thiserror::Error;

/// Which of the two sends of `publish_request` failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishStage {
    /// Publishing `request_id → response topic` to the mapping topic.
    Mapping,
    /// Publishing the request payload to the request topic.
    Request,
}

impl fmt::Display for PublishStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mapping => write!(f, "response topic mapping"),
            Self::Request => write!(f, "request payload"),
        }
    }
}

/// Failure to encode or decode a key or value.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct SerdeError(pub String);

impl From<serde_json::Error> for SerdeError {
    fn from(e: serde_json::Error) -> Self {
        Self(e.to_string())
    }
}

/// Errors raised by the transport collaborators.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The transport rejected or failed the send.
    #[error("Send to topic {topic} failed: {reason}")]
    Send { topic: String, reason: String },

    /// The key or value could not be serialized.
    #[error("Serialization failed: {0}")]
    Serialization(#[from] SerdeError),

    /// The subscription could not be opened.
    #[error("Subscription to topic {topic} failed: {reason}")]
    Subscribe { topic: String, reason: String },

    /// A topic administration call failed.
    #[error("Topic administration failed: {0}")]
    Admin(String),

    /// The transport has been shut down.
    #[error("Transport closed")]
    Closed,
}

/// Errors surfaced to callers of the request API.
///
/// `Clone` so one eviction can fail every waiter of an entry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// One of the publish steps failed; nothing was registered.
    #[error("Publishing {stage} failed: {source}")]
    TransportSend {
        stage: PublishStage,
        #[source]
        source: TransportError,
    },

    /// No live registry entry for this identifier (never published, or
    /// already evicted).
    #[error("Unknown request id {0}")]
    UnknownRequestId(RequestId),

    /// The entry was evicted while the waiter was still attached.
    #[error("Request {0} timed out")]
    TimedOut(RequestId),

    /// The registry was dropped before the waiter was completed.
    #[error("Request API closed before a response arrived")]
    Closed,
}

impl RequestError {
    /// Whether this is a timeout produced by eviction.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut(_))
    }
}

/// Configuration and startup errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Retention window must be positive.
    #[error("Invalid retention window: {0}")]
    InvalidRetention(String),

    /// A topic name is empty.
    #[error("Topic name for {0} cannot be empty")]
    EmptyTopicName(&'static str),

    /// Two roles share one topic.
    #[error("Topics must be distinct: {0}")]
    DuplicateTopics(String),

    /// Output topic spec is unusable.
    #[error("Invalid topic spec: {0}")]
    InvalidTopicSpec(String),

    /// The private response topic could not be provisioned.
    #[error("Unable to create required topics: {0}")]
    Provisioning(String),

    /// The response subscription could not be opened.
    #[error("Unable to subscribe to response topic: {0}")]
    Subscription(#[from] TransportError),

    /// A background task was requested outside a tokio runtime.
    #[error("No tokio runtime to run the periodic sweep: {0}")]
    NoRuntime(String),

    /// The configuration source could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}
