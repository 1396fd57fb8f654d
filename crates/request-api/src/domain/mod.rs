//! Domain types for the request API.
//!
//! The registry, pending-request entries, identifiers, configuration and
//! errors. Nothing in here performs I/O.

pub mod config;
pub mod error;
pub mod expiring_map;
pub mod handlers;
pub mod request_id;
pub mod stats;

// Re-exports for convenience
pub use config::{RequestApiConfig, WindowSpec};
pub use error::{ConfigError, PublishStage, RequestError, SerdeError, TransportError};
pub use expiring_map::{ExpiringMap, MIN_RETENTION};
pub use handlers::{ResponseFuture, ResponseHandlers, Waiter};
pub use request_id::RequestId;
pub use stats::{RequestStats, StatsSnapshot};
