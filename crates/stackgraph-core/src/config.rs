//! Profile configuration
//!
//! A TOML file of profile tables:
//!
//! ```toml
//! [default]
//! KeyName = "ops"
//! AvailabilityZones = ["us-east-1b", "us-east-1d"]
//!
//! [staging]
//! KeyName = "staging-ops"
//! ```
//!
//! The selected profile becomes the outputs of the graph's config node.

use crate::error::ConfigError;
use crate::types::{Outputs, Value};
use std::path::Path;

/// Profile used when none is named
pub const DEFAULT_PROFILE: &str = "default";

/// Read `profile` from the file at `path`
pub fn load_profile(path: &Path, profile: &str) -> Result<Outputs, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let table = content.parse::<toml::Table>().map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let outputs = profile_from_table(&table, profile)?;
    tracing::debug!(path = %path.display(), profile, keys = outputs.len(), "loaded profile");
    Ok(outputs)
}

/// Read `profile` from TOML text
pub fn parse_profile(content: &str, profile: &str) -> Result<Outputs, ConfigError> {
    let table = content.parse::<toml::Table>().map_err(|source| ConfigError::Parse {
        path: "<inline>".into(),
        source,
    })?;
    profile_from_table(&table, profile)
}

fn profile_from_table(table: &toml::Table, profile: &str) -> Result<Outputs, ConfigError> {
    let section = table
        .get(profile)
        .and_then(toml::Value::as_table)
        .ok_or_else(|| ConfigError::MissingProfile(profile.to_string()))?;

    section
        .iter()
        .map(|(key, value)| Ok((key.clone(), to_value(key, value)?)))
        .collect()
}

fn to_value(key: &str, value: &toml::Value) -> Result<Value, ConfigError> {
    match value {
        toml::Value::Array(items) => items
            .iter()
            .map(|item| scalar(key, item))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        other => scalar(key, other).map(Value::Text),
    }
}

fn scalar(key: &str, value: &toml::Value) -> Result<String, ConfigError> {
    match value {
        toml::Value::String(s) => Ok(strip_quotes(s).to_string()),
        toml::Value::Integer(i) => Ok(i.to_string()),
        toml::Value::Float(f) => Ok(f.to_string()),
        toml::Value::Boolean(b) => Ok(b.to_string()),
        toml::Value::Datetime(d) => Ok(d.to_string()),
        toml::Value::Array(_) | toml::Value::Table(_) => Err(ConfigError::UnsupportedValue {
            key: key.to_string(),
            reason: "nested arrays and tables are not supported".to_string(),
        }),
    }
}

/// Profiles written for ini-style readers often quote their values
fn strip_quotes(s: &str) -> &str {
    let s = s.trim();
    for quote in ['"', '\''] {
        if let Some(inner) = s.strip_prefix(quote).and_then(|r| r.strip_suffix(quote)) {
            return inner;
        }
    }
    s
}
