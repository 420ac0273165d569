//! Source configuration parser
//!
//! Loads a [`SourceConfig`] from a YAML or JSON file (chosen by extension)
//! and validates it.

use super::types::{SourceConfig, StreamConfig};
use crate::error::{Error, Result};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Load a source config from a file
///
/// `.json` files are parsed as JSON, everything else as YAML.
pub fn load_config(path: impl AsRef<Path>) -> Result<SourceConfig> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| {
        Error::config(format!(
            "Failed to read config file '{}': {e}",
            path.display()
        ))
    })?;

    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        load_config_from_json(&content)
    } else {
        load_config_from_str(&content)
    }
}

/// Load a source config from a YAML string
pub fn load_config_from_str(yaml: &str) -> Result<SourceConfig> {
    let config: SourceConfig = serde_yaml::from_str(yaml)?;
    validate_config(&config)?;
    Ok(config)
}

/// Load a source config from a JSON string
pub fn load_config_from_json(json: &str) -> Result<SourceConfig> {
    let config: SourceConfig = serde_json::from_str(json)?;
    validate_config(&config)?;
    Ok(config)
}

/// Validate a source config
pub fn validate_config(config: &SourceConfig) -> Result<()> {
    if config.concurrency == 0 {
        return Err(Error::invalid_value("concurrency", "must be at least 1"));
    }
    if config.checkpoint.max_rows == 0 {
        return Err(Error::invalid_value("checkpoint.max_rows", "must be at least 1"));
    }
    if config.checkpoint.max_bytes == 0 {
        return Err(Error::invalid_value("checkpoint.max_bytes", "must be at least 1"));
    }
    if config.limit_query.trim().is_empty() {
        return Err(Error::missing_field("limit_query"));
    }
    if config.max_scans_per_stream == Some(0) {
        return Err(Error::invalid_value("max_scans_per_stream", "must be at least 1"));
    }

    let mut seen = HashSet::new();
    for stream in &config.streams {
        validate_stream(stream)?;
        if !seen.insert(stream.id().state_key()) {
            return Err(Error::config(format!(
                "Duplicate stream '{}'",
                stream.id()
            )));
        }
    }

    Ok(())
}

/// Validate a stream definition
fn validate_stream(stream: &StreamConfig) -> Result<()> {
    if stream.name.is_empty() {
        return Err(Error::config("Stream name cannot be empty"));
    }

    if stream.cursor_columns.is_empty() {
        return Err(Error::config(format!(
            "Stream '{}' must have at least one cursor column",
            stream.name
        )));
    }

    for (list, columns) in [
        ("cursor_columns", &stream.cursor_columns),
        ("data_columns", &stream.data_columns),
    ] {
        let mut seen = HashSet::new();
        for column in columns {
            if column.is_empty() {
                return Err(Error::config(format!(
                    "Stream '{}' has an empty name in {list}",
                    stream.name
                )));
            }
            if !seen.insert(column.as_str()) {
                return Err(Error::config(format!(
                    "Stream '{}' lists column '{column}' more than once in {list}",
                    stream.name
                )));
            }
        }
    }

    Ok(())
}
