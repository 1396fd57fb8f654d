//! Request API configuration with validation.
//!
//! Loaded from TOML, from `REQUEST_API_*` environment variables, or built in
//! code starting from `Default`.

use crate::domain::error::ConfigError;
use crate::domain::expiring_map::MIN_RETENTION;
use serde::{Deserialize, Serialize};
use shared_bus::TopicSpec;
use std::env;
use std::time::Duration;

/// How long pending-request entries are retained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowSpec {
    /// Entries older than this are evicted by the next sweep, and any
    /// waiter still attached times out.
    #[serde(with = "humantime_serde")]
    pub retention: Duration,
}

impl WindowSpec {
    pub fn new(retention: Duration) -> Self {
        Self { retention }
    }
}

impl Default for WindowSpec {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

/// Main request API configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestApiConfig {
    /// Topic request payloads are published to, keyed by aggregate.
    pub request_topic: String,
    /// Topic carrying `request_id → private response topic` mappings.
    pub response_topic_map_topic: String,
    /// Topic this instance receives responses on.
    pub private_response_topic: String,
    /// Retention of pending-request entries.
    pub response_window: WindowSpec,
    /// Layout used when the private response topic has to be created.
    pub output_topic_spec: TopicSpec,
    /// Provision the private response topic at startup if missing.
    pub create_topics: bool,
    /// Also sweep on a timer, not only on publish. Off by default.
    #[serde(with = "humantime_serde::option")]
    pub sweep_interval: Option<Duration>,
}

impl Default for RequestApiConfig {
    fn default() -> Self {
        Self {
            request_topic: "command_request".to_string(),
            response_topic_map_topic: "command_response_topic_map".to_string(),
            private_response_topic: "command_response".to_string(),
            response_window: WindowSpec::default(),
            output_topic_spec: TopicSpec::default(),
            create_topics: true,
            sweep_interval: None,
        }
    }
}

impl RequestApiConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.response_window.retention < MIN_RETENTION {
            return Err(ConfigError::InvalidRetention(format!(
                "retention {:?} is below {:?}",
                self.response_window.retention, MIN_RETENTION
            )));
        }

        let topics = [
            ("request_topic", &self.request_topic),
            ("response_topic_map_topic", &self.response_topic_map_topic),
            ("private_response_topic", &self.private_response_topic),
        ];
        for (role, topic) in topics {
            if topic.is_empty() {
                return Err(ConfigError::EmptyTopicName(role));
            }
        }

        if self.request_topic == self.response_topic_map_topic
            || self.request_topic == self.private_response_topic
            || self.response_topic_map_topic == self.private_response_topic
        {
            return Err(ConfigError::DuplicateTopics(format!(
                "{}, {}, {}",
                self.request_topic, self.response_topic_map_topic, self.private_response_topic
            )));
        }

        if self.output_topic_spec.partition_count == 0 {
            return Err(ConfigError::InvalidTopicSpec(
                "partition_count cannot be 0".into(),
            ));
        }

        if matches!(self.sweep_interval, Some(interval) if interval.is_zero()) {
            return Err(ConfigError::InvalidRetention(
                "sweep_interval cannot be 0".into(),
            ));
        }

        Ok(())
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `REQUEST_API_REQUEST_TOPIC`: Request topic (default: command_request)
    /// - `REQUEST_API_RESPONSE_TOPIC_MAP_TOPIC`: Mapping topic (default: command_response_topic_map)
    /// - `REQUEST_API_PRIVATE_RESPONSE_TOPIC`: Private response topic (default: command_response)
    /// - `REQUEST_API_RETENTION`: Retention window, humantime format (default: 60s)
    /// - `REQUEST_API_PARTITIONS`: Partitions of the response topic (default: 1)
    /// - `REQUEST_API_REPLICAS`: Replicas of the response topic (default: 1)
    /// - `REQUEST_API_CREATE_TOPICS`: Provision the response topic (default: true)
    /// - `REQUEST_API_SWEEP_INTERVAL`: Periodic sweep interval (default: unset)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let config = Self {
            request_topic: env::var("REQUEST_API_REQUEST_TOPIC")
                .unwrap_or(defaults.request_topic),

            response_topic_map_topic: env::var("REQUEST_API_RESPONSE_TOPIC_MAP_TOPIC")
                .unwrap_or(defaults.response_topic_map_topic),

            private_response_topic: env::var("REQUEST_API_PRIVATE_RESPONSE_TOPIC")
                .unwrap_or(defaults.private_response_topic),

            response_window: match env::var("REQUEST_API_RETENTION") {
                Ok(v) => WindowSpec::new(parse_duration("REQUEST_API_RETENTION", &v)?),
                Err(_) => defaults.response_window,
            },

            output_topic_spec: TopicSpec::new(
                parse_number("REQUEST_API_PARTITIONS", defaults.output_topic_spec.partition_count)?,
                parse_number("REQUEST_API_REPLICAS", defaults.output_topic_spec.replica_count)?,
            ),

            create_topics: env::var("REQUEST_API_CREATE_TOPICS")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(defaults.create_topics),

            sweep_interval: match env::var("REQUEST_API_SWEEP_INTERVAL") {
                Ok(v) => Some(parse_duration("REQUEST_API_SWEEP_INTERVAL", &v)?),
                Err(_) => defaults.sweep_interval,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Retention window of pending-request entries.
    pub fn retention(&self) -> Duration {
        self.response_window.retention
    }
}

fn parse_duration(var: &str, value: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(value)
        .map_err(|e| ConfigError::Parse(format!("{var}: {e}")))
}

fn parse_number<T: std::str::FromStr>(var: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(v) => v
            .parse()
            .map_err(|e| ConfigError::Parse(format!("{var}: {e}"))),
        Err(_) => Ok(default),
    }
}

/// Durations as humantime strings (`"5s"`, `"500ms"`, `"1m 30s"`).
mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};
        use std::time::Duration;

        pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match duration {
                Some(d) => serializer.serialize_some(&humantime::format_duration(*d).to_string()),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
        where
            D: Deserializer<'de>,
        {
            Option::<String>::deserialize(deserializer)?
                .map(|s| humantime::parse_duration(&s).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}
