//! Configuration schema definitions.
//!
//! Each section is owned by the module that reads it and is looked up by its
//! [`Section::KEY`]. All types derive Serde traits and default every field.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::validation::{positive, socket_addr, ValidationError};

/// A named, self-validating configuration section.
pub trait Section: Serialize + DeserializeOwned + Default {
    /// Top-level table name in the file; upper-cased as the env prefix.
    const KEY: &'static str;

    fn validate(&self) -> Vec<ValidationError> {
        Vec::new()
    }
}

/// Start/stop phase budgets.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Budget shared by all start hooks.
    pub start_timeout_ms: u64,

    /// Budget shared by all stop hooks, and by rollback after a failed start.
    pub stop_timeout_ms: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            start_timeout_ms: 15_000,
            stop_timeout_ms: 15_000,
        }
    }
}

impl LifecycleConfig {
    pub fn start_timeout(&self) -> Duration {
        Duration::from_millis(self.start_timeout_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

impl Section for LifecycleConfig {
    const KEY: &'static str = "lifecycle";

    fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        positive(&mut errors, "lifecycle.start_timeout_ms", self.start_timeout_ms);
        positive(&mut errors, "lifecycle.stop_timeout_ms", self.stop_timeout_ms);
        errors
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Text,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`info`, `service_kernel=debug,warn`).
    /// `RUST_LOG` takes precedence when set.
    pub level: String,

    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
        }
    }
}

impl Section for LoggingConfig {
    const KEY: &'static str = "logging";

    fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.level.trim().is_empty() {
            errors.push(ValidationError::new("logging.level", "must not be empty"));
        }
        errors
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct HttpConfig {
    /// Bind address (e.g., "0.0.0.0:8080"). Port 0 picks a free port.
    pub address: String,

    /// Per-request timeout.
    pub request_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl HttpConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Section for HttpConfig {
    const KEY: &'static str = "http";

    fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        socket_addr(&mut errors, "http.address", &self.address);
        positive(&mut errors, "http.request_timeout_secs", self.request_timeout_secs);
        errors
    }
}

/// Observability settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Serve Prometheus metrics.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

impl Section for ObservabilityConfig {
    const KEY: &'static str = "observability";

    fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.metrics_enabled {
            socket_addr(&mut errors, "observability.metrics_address", &self.metrics_address);
        }
        errors
    }
}

/// In-process messaging settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct MessagingConfig {
    /// Topic the default consumer subscribes to.
    pub topic: String,

    /// Per-topic channel capacity.
    pub buffer: usize,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            topic: "events".to_string(),
            buffer: 1024,
        }
    }
}

impl Section for MessagingConfig {
    const KEY: &'static str = "messaging";

    fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.topic.trim().is_empty() {
            errors.push(ValidationError::new("messaging.topic", "must not be empty"));
        }
        positive(&mut errors, "messaging.buffer", self.buffer as u64);
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_defaults_to_fifteen_seconds() {
        let config = LifecycleConfig::default();
        assert_eq!(config.start_timeout(), Duration::from_secs(15));
        assert_eq!(config.stop_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn metrics_address_checked_only_when_enabled() {
        let mut config = ObservabilityConfig {
            metrics_address: "nope".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_empty());
        config.metrics_enabled = true;
        assert_eq!(config.validate().len(), 1);
    }
}
