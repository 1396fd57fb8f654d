//! # Request Telemetry
//!
//! Logging and metrics bootstrap for services embedding the request API.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use request_telemetry::{init_logging, RequestMetrics, TelemetryConfig};
//!
//! let config = TelemetryConfig::from_env();
//! let _logger = init_logging(&config)?;
//! let metrics = RequestMetrics::new(&config.metrics_namespace)?;
//!
//! // On scrape
//! metrics.observe(&api.stats(), api.pending_count());
//! let body = metrics.encode()?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `OTEL_SERVICE_NAME` | `request-api` | Service name in logs |
//! | `REQUEST_LOG_LEVEL` | `info` | Log level filter (falls back to `RUST_LOG`) |
//! | `REQUEST_CONSOLE_OUTPUT` | `true` | Write logs to stderr |
//! | `REQUEST_JSON_LOGS` | `false` | JSON log lines (default on in containers) |
//! | `REQUEST_METRICS_NAMESPACE` | `request_api` | Metric name prefix |

mod config;
mod logging;
mod metrics;

pub use config::TelemetryConfig;
pub use logging::{init_logging, StructuredLogger};
pub use metrics::RequestMetrics;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TelemetryError {
    #[error("Logging already initialized: {0}")]
    AlreadyInitialized(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Convenience macro for creating a span around one request's handling.
///
/// # Example
///
/// ```rust,ignore
/// use request_telemetry::request_span;
///
/// let _span = request_span!("publish", request_id = %id).entered();
/// ```
#[macro_export]
macro_rules! request_span {
    ($name:expr, $($field:tt)*) => {
        tracing::info_span!($name, $($field)*)
    };
}
