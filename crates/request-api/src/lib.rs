//! # Request API - Request/Response Correlation over a Topic Bus
//!
//! Turns one-way publication into an asynchronous request/response protocol.
//! A caller publishes a command keyed by its aggregate together with a fresh
//! [`RequestId`]; a downstream processor eventually publishes the result on a
//! private response topic; the caller awaits it through a [`ResponseFuture`].
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                            RequestApi                               │
//! │                                                                     │
//! │  publish_request ──→ mapping topic ──→ request topic ──→ register  │
//! │        │                                                     │      │
//! │        └── sweep (evict + time out waiters) ───────────┐     │      │
//! │                                                        ▼     ▼      │
//! │  query_response ──────────────────────────→ ┌──────────────────┐   │
//! │                                             │   ExpiringMap    │   │
//! │  response topic ──→ ResponseDispatcher ───→ │ id → handlers    │   │
//! │                                             └──────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Lifecycle of a request
//!
//! | Step | Who | Effect on the registry |
//! |------|-----|------------------------|
//! | publish | caller | entry created once both sends succeed |
//! | query | caller | waiter attached, or resolved from the cached value |
//! | response | dispatcher | all waiters resolved, value cached |
//! | sweep | next publish | entry older than the window evicted, waiters timed out |
//!
//! Entries are never removed on resolution; late queries still observe the
//! cached value until the retention window passes.
//!
//! # Usage
//!
//! ```ignore
//! use request_api::adapters::{connect, BusSerdes};
//! use request_api::{RequestApiConfig, RequestId};
//!
//! let api = connect(bus, RequestApiConfig::default(), BusSerdes::json()).await?;
//! let id = RequestId::new();
//! api.publish_request(&aggregate, id, &command).await?;
//! let result = api.query_response(id, Duration::from_secs(5)).await?;
//! api.close();
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod dispatcher;
pub mod domain;
pub mod ports;
pub mod service;

// Re-exports for public API
pub use adapters::serdes::{JsonSerde, RequestIdSerde, Utf8Serde};
pub use dispatcher::{DispatchOutcome, ResponseDispatcher};
pub use domain::config::{RequestApiConfig, WindowSpec};
pub use domain::error::{ConfigError, PublishStage, RequestError, SerdeError, TransportError};
pub use domain::expiring_map::{ExpiringMap, MIN_RETENTION};
pub use domain::handlers::{ResponseFuture, ResponseHandlers, Waiter};
pub use domain::request_id::RequestId;
pub use domain::stats::{RequestStats, StatsSnapshot};
pub use ports::outbound::{
    Closeable, ManualTimeSource, PublishResult, RequestPublisher, ResponseHandlerFn,
    ResponseSubscriber, Serde, SystemTimeSource, TimeSource, Timestamp, TopicProvisioner,
};
pub use service::RequestApi;
pub use shared_bus::TopicSpec;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
