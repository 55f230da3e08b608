//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is a pure function of a section: `T → Vec<ValidationError>`
//! - Runs before a section is handed to its module

use std::fmt;
use std::net::SocketAddr;

use crate::config::loader::ConfigError;
use crate::config::schema::{
    HttpConfig, LifecycleConfig, LoggingConfig, MessagingConfig, ObservabilityConfig,
};
use crate::config::source::ConfigSource;

/// A single semantic problem in a section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path, e.g. `http.address`.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub(crate) fn positive(errors: &mut Vec<ValidationError>, field: &str, value: u64) {
    if value == 0 {
        errors.push(ValidationError::new(field, "must be greater than zero"));
    }
}

pub(crate) fn socket_addr(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            field,
            format!("'{}' is not a valid socket address", value),
        ));
    }
}

/// Check every built-in section at once, e.g. at startup before building
/// the application.
pub fn validate_all(source: &ConfigSource) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut collect = |result: Result<(), ConfigError>| match result {
        Ok(()) => {}
        Err(ConfigError::Validation(found)) => errors.extend(found),
        Err(other) => errors.push(ValidationError::new("config", other.to_string())),
    };

    collect(source.section::<LifecycleConfig>().map(drop));
    collect(source.section::<LoggingConfig>().map(drop));
    collect(source.section::<HttpConfig>().map(drop));
    collect(source.section::<ObservabilityConfig>().map(drop));
    collect(source.section::<MessagingConfig>().map(drop));

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
