//! Error types for Solidafy Extract
//!
//! This module defines the error hierarchy for the entire crate.
//! All public APIs return `Result<T, Error>` where Error is defined here.
//!
//! Every error raised while a scan is in flight is fatal for that scan:
//! there is no retry classification at this layer.

use thiserror::Error;

/// The main error type for Solidafy Extract
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Missing required config field: {field}")]
    MissingConfigField { field: String },

    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue { field: String, message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // Database Errors
    // ============================================================================
    #[error("Query failed: {0}")]
    Query(#[from] duckdb::Error),

    #[error("Connection is read-only, refusing statement: {statement}")]
    ReadOnly { statement: String },

    // ============================================================================
    // Type Conversion Errors
    // ============================================================================
    #[error(
        "Failed to convert value {value} of column '{column}' declared as {declared_type}: {message}"
    )]
    Conversion {
        column: String,
        value: String,
        declared_type: String,
        message: String,
    },

    // ============================================================================
    // Scan Invariant Errors
    // ============================================================================
    #[error("Cursor column '{column}' of stream '{stream}' is null on the last row read")]
    NullCursor { stream: String, column: String },

    #[error("Limit query returned no rows: {query}")]
    EmptyLimitQuery { query: String },

    #[error("Limit query '{query}' returned a non-integer value: {value}")]
    InvalidLimit { query: String, value: String },

    #[error("Invalid scan state: {message}")]
    InvalidState { message: String },

    // ============================================================================
    // State Errors
    // ============================================================================
    #[error("State error: {message}")]
    State { message: String },

    // ============================================================================
    // Stream Errors
    // ============================================================================
    #[error("Stream '{stream}' not found in catalog")]
    StreamNotFound { stream: String },

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingConfigField {
            field: field.into(),
        }
    }

    /// Create an invalid config value error
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfigValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an invalid scan state error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Create a state persistence error
    pub fn state(message: impl Into<String>) -> Self {
        Self::State {
            message: message.into(),
        }
    }

    /// Check if this error reports a broken scan invariant
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            Error::NullCursor { .. }
                | Error::EmptyLimitQuery { .. }
                | Error::InvalidLimit { .. }
                | Error::InvalidState { .. }
        )
    }

    /// Check if this error aborts an in-flight scan
    ///
    /// Always true: nothing raised from a scan is retried at this layer.
    pub fn is_fatal_for_scan(&self) -> bool {
        true
    }

    /// Check if this error is a type conversion failure
    pub fn is_conversion(&self) -> bool {
        matches!(self, Error::Conversion { .. })
    }
}

/// Result type alias for Solidafy Extract
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", message.into(), inner))
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", f(), inner))
        })
    }
}
