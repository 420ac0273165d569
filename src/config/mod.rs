//! Source configuration module
//!
//! Parse extraction source definitions from YAML or JSON files.
//!
//! # Overview
//!
//! The config module provides:
//! - `SourceConfig` - database, streams, checkpoint policy, scheduling limits
//! - `StreamConfig` - cursor columns, data columns, column schema of one table
//! - Loading with validation

mod parser;
mod types;

pub use parser::{load_config, load_config_from_json, load_config_from_str, validate_config};
pub use types::{CheckpointConfig, DatabaseConfig, DatabaseKind, SourceConfig, StreamConfig};
