//! Parsed configuration document plus an environment snapshot.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use toml::{Table, Value};

use crate::config::loader::ConfigError;
use crate::config::schema::Section;

/// Read-only configuration shared by every module.
///
/// Sections are merged on read: schema defaults, then the file's table for
/// the section, then environment variables named `SECTION_FIELD` (nested
/// tables extend the name: `HTTP_TLS_CERT`).
#[derive(Debug, Clone, Default)]
pub struct ConfigSource {
    document: Table,
    env: HashMap<String, String>,
    path: Option<PathBuf>,
}

impl ConfigSource {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let document: Table = toml::from_str(content).map_err(ConfigError::Parse)?;
        Ok(Self {
            document,
            ..Self::default()
        })
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Add environment overrides. Later entries win.
    pub fn with_env<K, V>(mut self, vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Snapshot the process environment as overrides.
    pub fn with_process_env(self) -> Self {
        self.with_env(std::env::vars())
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Top-level keys present in the file.
    pub fn section_names(&self) -> Vec<&str> {
        self.document.keys().map(String::as_str).collect()
    }

    /// The raw file value under `key`, without defaults or overrides.
    pub fn raw(&self, key: &str) -> Option<&Value> {
        self.document.get(key)
    }

    /// Read, merge and validate section `T`.
    pub fn section<T: Section>(&self) -> Result<T, ConfigError> {
        let mut merged = Value::try_from(T::default()).map_err(ConfigError::Encode)?;
        if let Some(file) = self.document.get(T::KEY) {
            merge(&mut merged, file);
        }
        apply_env(&mut merged, &env_prefix(T::KEY), &self.env);

        let section: T = merged
            .try_into()
            .map_err(|source| ConfigError::Section { key: T::KEY, source })?;

        let errors = section.validate();
        if !errors.is_empty() {
            return Err(ConfigError::Validation(errors));
        }
        Ok(section)
    }
}

fn env_prefix(key: &str) -> String {
    key.replace(['.', '-'], "_").to_uppercase()
}

fn merge(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Table(base), Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}

/// Overrides leaf values whose variable is set, parsing the string according
/// to the type already present.
fn apply_env(value: &mut Value, name: &str, env: &HashMap<String, String>) {
    if let Value::Table(table) = value {
        for (key, child) in table.iter_mut() {
            apply_env(child, &format!("{}_{}", name, env_prefix(key)), env);
        }
        return;
    }

    let Some(raw) = env.get(name) else {
        return;
    };
    match parse_like(value, raw) {
        Some(parsed) => {
            tracing::debug!(variable = name, "Applied environment override");
            *value = parsed;
        }
        None => tracing::warn!(variable = name, value = %raw, "Ignoring environment override of the wrong type"),
    }
}

fn parse_like(current: &Value, raw: &str) -> Option<Value> {
    let raw = raw.trim();
    match current {
        Value::String(_) => Some(Value::String(raw.to_string())),
        Value::Integer(_) => raw.parse().ok().map(Value::Integer),
        Value::Float(_) => raw.parse().ok().map(Value::Float),
        Value::Boolean(_) => raw.parse().ok().map(Value::Boolean),
        Value::Datetime(_) => raw.parse().ok().map(Value::Datetime),
        Value::Array(_) => Some(Value::Array(
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| Value::String(s.to_string()))
                .collect(),
        )),
        Value::Table(_) => None,
    }
}
