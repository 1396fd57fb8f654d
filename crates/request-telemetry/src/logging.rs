//! Structured logging setup.
//!
//! Installs a global `tracing-subscriber` fmt subscriber. JSON output keeps
//! the structured fields (`request_id`, `topic`, `waiters`, ...) as
//! top-level keys so a log shipper can index them.

use crate::{TelemetryConfig, TelemetryError};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

/// Structured logger handle
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    service_name: String,
    json: bool,
}

impl StructuredLogger {
    /// Service name the logger was installed for.
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Whether JSON output is active.
    pub fn is_json(&self) -> bool {
        self.json
    }
}

/// Install the global subscriber.
///
/// # Errors
///
/// - `TelemetryError::Config` - `log_level` is not a valid filter
/// - `TelemetryError::AlreadyInitialized` - a global subscriber is already set
pub fn init_logging(config: &TelemetryConfig) -> Result<StructuredLogger, TelemetryError> {
    let filter = EnvFilter::try_new(&config.log_level)
        .map_err(|e| TelemetryError::Config(format!("log level {:?}: {}", config.log_level, e)))?;

    let writer = if config.console_output {
        BoxMakeWriter::new(std::io::stderr)
    } else {
        BoxMakeWriter::new(std::io::sink)
    };

    let installed = if config.json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .with_target(true)
            .json()
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .with_target(true)
            .try_init()
    };
    installed.map_err(|e| TelemetryError::AlreadyInitialized(e.to_string()))?;

    tracing::info!(
        service = %config.service_name,
        json_logs = config.json_logs,
        level = %config.log_level,
        "Logging initialized"
    );

    Ok(StructuredLogger {
        service_name: config.service_name.clone(),
        json: config.json_logs,
    })
}
