//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber from the `[logging]` section
//! - Provide the `Logger` contract components depend on
//! - Back it with `tracing` by default
//!
//! # Design Decisions
//! - JSON format for production, text for development
//! - `RUST_LOG` overrides the configured level
//! - Initialization is idempotent; the first subscriber wins

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{ConfigSource, LogFormat, LoggingConfig};
use crate::contract;
use crate::kernel::{AppBuilder, KernelError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        };
        f.write_str(name)
    }
}

/// A structured key/value attached to a log record.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Field {
    pub key: String,
    pub value: Value,
}

impl Field {
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Logging contract for components.
///
/// Depend on `Arc<dyn Logger>` rather than a concrete logger so tests can
/// substitute a recorder.
pub trait Logger: Send + Sync {
    fn log(&self, level: Level, message: &str, fields: &[Field]);

    fn debug(&self, message: &str, fields: &[Field]) {
        self.log(Level::Debug, message, fields);
    }

    fn info(&self, message: &str, fields: &[Field]) {
        self.log(Level::Info, message, fields);
    }

    fn warn(&self, message: &str, fields: &[Field]) {
        self.log(Level::Warn, message, fields);
    }

    /// Log at error level with `error` appended as a field.
    fn error(&self, message: &str, error: &dyn std::error::Error, fields: &[Field]) {
        let mut all = fields.to_vec();
        all.push(Field::new("error", error.to_string()));
        self.log(Level::Error, message, &all);
    }
}
contract!(Logger);

/// `Logger` that forwards to the global `tracing` subscriber.
#[derive(Debug, Default, Clone)]
pub struct TracingLogger {
    context: Vec<Field>,
}

impl TracingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// A logger that adds `fields` to every record.
    pub fn with_fields(&self, fields: impl IntoIterator<Item = Field>) -> Self {
        let mut context = self.context.clone();
        context.extend(fields);
        Self { context }
    }
}

fn render(context: &[Field], fields: &[Field]) -> Value {
    let map: Map<String, Value> = context
        .iter()
        .chain(fields)
        .map(|f| (f.key.clone(), f.value.clone()))
        .collect();
    Value::Object(map)
}

impl Logger for TracingLogger {
    fn log(&self, level: Level, message: &str, fields: &[Field]) {
        let fields = render(&self.context, fields);
        match level {
            Level::Debug => tracing::debug!(fields = %fields, "{}", message),
            Level::Info => tracing::info!(fields = %fields, "{}", message),
            Level::Warn => tracing::warn!(fields = %fields, "{}", message),
            Level::Error => tracing::error!(fields = %fields, "{}", message),
        }
    }
}

/// Install the global subscriber. Returns `false` when one was already set.
pub fn init_subscriber(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let (json, text) = match config.format {
        LogFormat::Json => (Some(tracing_subscriber::fmt::layer().json()), None),
        LogFormat::Text => (None, Some(tracing_subscriber::fmt::layer())),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(text)
        .try_init()
        .is_ok()
}

/// Register `TracingLogger` as the `dyn Logger` implementation.
///
/// Reads `[logging]` from the `ConfigSource` when one is registered.
pub fn module(app: &AppBuilder) -> Result<(), KernelError> {
    app.provide(|(config,): (Option<Arc<ConfigSource>>,), _| {
        let settings = match config {
            Some(source) => source.section::<LoggingConfig>()?,
            None => LoggingConfig::default(),
        };
        if init_subscriber(&settings) {
            tracing::debug!(level = %settings.level, format = ?settings.format, "Logging initialized");
        }
        Ok(TracingLogger::new())
    })?;
    app.bind::<dyn Logger, TracingLogger>()
}
