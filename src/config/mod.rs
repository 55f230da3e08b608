//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (read & parse)
//!     → ConfigSource (parsed document + environment snapshot)
//!     → supplied to the application as a leaf component
//!
//! Each module reading its settings:
//!     ConfigSource::section::<T>()
//!     → defaults of T < file section < SECTION_FIELD env vars
//!     → validation.rs (semantic checks, every error reported)
//!     → T
//! ```
//!
//! # Design Decisions
//! - Configuration is decentralized: modules own their section types
//! - All fields have defaults to allow minimal configs
//! - A missing file is not an error; the environment may be enough
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod source;
pub mod validation;

use crate::kernel::{AppBuilder, KernelError};

pub use loader::{load_config, ConfigError};
pub use schema::{
    HttpConfig, LifecycleConfig, LogFormat, LoggingConfig, MessagingConfig, ObservabilityConfig,
    Section,
};
pub use source::ConfigSource;
pub use validation::ValidationError;

/// Register `source` as the application's configuration component.
pub fn module(source: ConfigSource) -> impl FnOnce(&AppBuilder) -> Result<(), KernelError> {
    move |app: &AppBuilder| app.supply(source)
}
