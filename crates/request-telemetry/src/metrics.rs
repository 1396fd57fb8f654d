//! Prometheus metrics for the request API.
//!
//! All metrics follow the naming convention: `<namespace>_<metric>`.
//!
//! - **Counter**: the `_total` series, advanced by the delta between the
//!   request API's counters and what was last exported
//! - **Gauge**: `pending_requests`, the live registry size
//!
//! [`RequestMetrics::observe`] is called with a fresh snapshot right before
//! a scrape.

use crate::TelemetryError;
use prometheus::{Encoder, IntCounter, IntGauge, Opts, Registry, TextEncoder};
use request_api::StatsSnapshot;

/// Counters mirroring [`StatsSnapshot`], plus the live entry count.
pub struct RequestMetrics {
    registry: Registry,
    requests_published: IntCounter,
    publish_failures: IntCounter,
    duplicate_registrations: IntCounter,
    responses_delivered: IntCounter,
    responses_dropped: IntCounter,
    duplicate_responses: IntCounter,
    entries_evicted: IntCounter,
    waiters_timed_out: IntCounter,
    pending_requests: IntGauge,
}

impl RequestMetrics {
    /// Create the metrics in a fresh registry.
    pub fn new(namespace: &str) -> Result<Self, TelemetryError> {
        let registry = Registry::new();
        let counter = |name: &str, help: &str| {
            let counter = IntCounter::with_opts(Opts::new(name, help).namespace(namespace))
                .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
            register(&registry, counter)
        };
        let gauge = |name: &str, help: &str| {
            let gauge = IntGauge::with_opts(Opts::new(name, help).namespace(namespace))
                .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
            register(&registry, gauge)
        };

        Ok(Self {
            requests_published: counter(
                "requests_published_total",
                "Requests published and registered",
            )?,
            publish_failures: counter("publish_failures_total", "Requests whose publish failed")?,
            duplicate_registrations: counter(
                "duplicate_registrations_total",
                "Publishes under an id that was already registered",
            )?,
            responses_delivered: counter(
                "responses_delivered_total",
                "Responses matched to a pending request",
            )?,
            responses_dropped: counter(
                "responses_dropped_total",
                "Responses for unknown or expired request ids",
            )?,
            duplicate_responses: counter(
                "duplicate_responses_total",
                "Redelivered responses for an already resolved request",
            )?,
            entries_evicted: counter("entries_evicted_total", "Registry entries evicted")?,
            waiters_timed_out: counter(
                "waiters_timed_out_total",
                "Waiters failed because their request expired",
            )?,
            pending_requests: gauge("pending_requests", "Live registry entries")?,
            registry,
        })
    }

    /// Bring the counters up to `stats` and set the pending gauge.
    ///
    /// Counters only move forward; a snapshot older than the last one
    /// observed leaves them unchanged.
    pub fn observe(&self, stats: &StatsSnapshot, pending: usize) {
        advance(&self.requests_published, stats.requests_published);
        advance(&self.publish_failures, stats.publish_failures);
        advance(&self.duplicate_registrations, stats.duplicate_registrations);
        advance(&self.responses_delivered, stats.responses_delivered);
        advance(&self.responses_dropped, stats.responses_dropped);
        advance(&self.duplicate_responses, stats.duplicate_responses);
        advance(&self.entries_evicted, stats.entries_evicted);
        advance(&self.waiters_timed_out, stats.waiters_timed_out);
        self.pending_requests
            .set(i64::try_from(pending).unwrap_or(i64::MAX));
    }

    /// Encode all metrics as Prometheus text format.
    pub fn encode(&self) -> Result<String, TelemetryError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
    }

    /// Underlying registry, for merging into a larger exporter.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

fn register<M>(registry: &Registry, metric: M) -> Result<M, TelemetryError>
where
    M: prometheus::core::Collector + Clone + 'static,
{
    registry
        .register(Box::new(metric.clone()))
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    Ok(metric)
}

fn advance(counter: &IntCounter, total: u64) {
    let delta = total.saturating_sub(counter.get());
    if delta > 0 {
        counter.inc_by(delta);
    }
}
