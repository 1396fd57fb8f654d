//! # Shared Bus - Partitioned Topic Transport
//!
//! An in-memory stand-in for a partitioned, topic-based publish/subscribe
//! transport. Records are `(key, value)` byte pairs published to a named
//! topic; each record lands on one partition chosen from its key and is
//! acknowledged with the partition, offset and timestamp it was assigned.
//!
//! ```text
//! ┌──────────────┐  publish(topic, k, v)  ┌──────────────┐
//! │  Publisher   │ ─────────────────────→ │  Topic Bus   │
//! └──────────────┘    ← PublishAck        │  topic: p0   │
//!                                         │         p1   │
//! ┌──────────────┐     subscribe(topic)   │         ...  │
//! │  Subscriber  │ ←───────────────────── │              │
//! └──────────────┘        Record          └──────────────┘
//! ```
//!
//! ## Delivery
//!
//! - Every live subscription of a topic receives every record published to
//!   it after the subscription was opened.
//! - Records are not retained: publishing to a topic nobody is listening on
//!   succeeds and the record is gone.
//! - A subscriber that falls more than the channel capacity behind skips the
//!   lagged records.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod publisher;
pub mod record;
pub mod subscriber;

// Re-export main types
pub use publisher::{InMemoryTopicBus, TopicPublisher};
pub use record::{BusError, PublishAck, Record, TopicSpec};
pub use subscriber::{RecordStream, Subscription, SubscriptionError};

/// Maximum records to buffer per topic subscriber before lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
