//! Configuration loading from disk.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::config::source::ConfigSource;
use crate::config::validation::ValidationError;

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    /// Defaults of a section could not be encoded for merging.
    Encode(toml::ser::Error),
    /// A section did not match its schema.
    Section {
        key: &'static str,
        source: toml::de::Error,
    },
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Encode(e) => write!(f, "Encode error: {}", e),
            ConfigError::Section { key, source } => {
                write!(f, "Invalid [{}] section: {}", key, source)
            }
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            ConfigError::Encode(e) => Some(e),
            ConfigError::Section { source, .. } => Some(source),
            ConfigError::Validation(_) => None,
        }
    }
}

/// Load configuration from a TOML file, overlaid with the process environment.
///
/// A missing file yields an empty document.
pub fn load_config(path: &Path) -> Result<ConfigSource, ConfigError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "Config file not found, using defaults and environment");
            String::new()
        }
        Err(e) => return Err(ConfigError::Io(e)),
    };

    let source = ConfigSource::from_toml_str(&content)?
        .with_path(path)
        .with_process_env();
    tracing::info!(path = %path.display(), sections = source.section_names().len(), "Configuration loaded");
    Ok(source)
}
