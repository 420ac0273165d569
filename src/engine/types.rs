//! Engine types
//!
//! Message types, configuration and statistics for the sync engine.

use crate::config::SourceConfig;
use crate::output::OutputEvent;
use crate::scan::{CheckpointThresholds, DEFAULT_LIMIT_QUERY};
use crate::state::ScanState;
use crate::types::LogLevel;
use std::time::Duration;

/// A message emitted during sync
#[derive(Debug, Clone)]
pub enum Message {
    /// A record or checkpoint produced by a scan
    Event(OutputEvent),
    /// Log message
    Log {
        /// Log level
        level: LogLevel,
        /// Log message
        message: String,
    },
}

impl Message {
    /// Create a log message
    pub fn log(level: LogLevel, message: impl Into<String>) -> Self {
        Self::Log {
            level,
            message: message.into(),
        }
    }

    /// Create an info log
    pub fn info(message: impl Into<String>) -> Self {
        Self::log(LogLevel::Info, message)
    }

    /// Create a warning log
    pub fn warn(message: impl Into<String>) -> Self {
        Self::log(LogLevel::Warn, message)
    }

    /// Create an error log
    pub fn error(message: impl Into<String>) -> Self {
        Self::log(LogLevel::Error, message)
    }

    /// Check if this is a record message
    pub fn is_record(&self) -> bool {
        matches!(self, Self::Event(OutputEvent::Record(_)))
    }

    /// Check if this is a checkpoint message
    pub fn is_checkpoint(&self) -> bool {
        matches!(self, Self::Event(OutputEvent::Checkpoint(_)))
    }

    /// Check if this is a log message
    pub fn is_log(&self) -> bool {
        matches!(self, Self::Log { .. })
    }
}

impl From<OutputEvent> for Message {
    fn from(event: OutputEvent) -> Self {
        Self::Event(event)
    }
}

/// Configuration for sync operation
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Streams scanned at the same time
    pub concurrency: usize,
    /// Scans per stream before yielding for this run (`None` = until done)
    pub max_scans_per_stream: Option<u32>,
    /// Wall-clock budget of one scan
    pub scan_deadline: Option<Duration>,
    /// Checkpoint thresholds of each scan
    pub thresholds: CheckpointThresholds,
    /// Limit-estimation query
    pub limit_query: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            max_scans_per_stream: None,
            scan_deadline: None,
            thresholds: CheckpointThresholds::default(),
            limit_query: DEFAULT_LIMIT_QUERY.to_string(),
        }
    }
}

impl SyncConfig {
    /// Create a new sync config
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set concurrency, at least 1
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Set max scans per stream
    #[must_use]
    pub fn with_max_scans_per_stream(mut self, max: u32) -> Self {
        self.max_scans_per_stream = Some(max);
        self
    }

    /// Set the per-scan deadline
    #[must_use]
    pub fn with_scan_deadline(mut self, deadline: Duration) -> Self {
        self.scan_deadline = Some(deadline);
        self
    }

    /// Set checkpoint thresholds
    #[must_use]
    pub fn with_thresholds(mut self, thresholds: CheckpointThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Set the limit-estimation query
    #[must_use]
    pub fn with_limit_query(mut self, query: impl Into<String>) -> Self {
        self.limit_query = query.into();
        self
    }
}

impl From<&SourceConfig> for SyncConfig {
    fn from(config: &SourceConfig) -> Self {
        Self {
            concurrency: config.concurrency.max(1),
            max_scans_per_stream: config.max_scans_per_stream,
            scan_deadline: config.scan_deadline(),
            thresholds: config.checkpoint.into(),
            limit_query: config.limit_query.clone(),
        }
    }
}

/// Outcome of one stream within a sync
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamReport {
    /// Stream state key
    pub stream: String,
    /// Scans run for this stream
    pub scans: u32,
    /// Records emitted
    pub records: u64,
    /// State after the last successful scan
    pub state: ScanState,
    /// Error that stopped the stream, if any
    pub error: Option<String>,
}

impl StreamReport {
    /// Check if the stream stopped on an error
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Statistics from a sync operation
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Total records synced
    pub records_synced: u64,
    /// Scans that signalled completion, successful or not
    pub scans_completed: u64,
    /// Streams that finished without error
    pub streams_synced: usize,
    /// Streams that stopped on an error
    pub failed_streams: Vec<String>,
    /// Duration in milliseconds
    pub duration_ms: u64,
    /// Per-stream outcomes
    pub streams: Vec<StreamReport>,
}

impl SyncStats {
    /// Create new stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold in one stream's outcome
    pub fn add_stream(&mut self, report: StreamReport) {
        self.records_synced += report.records;
        if report.is_failed() {
            self.failed_streams.push(report.stream.clone());
        } else {
            self.streams_synced += 1;
        }
        self.streams.push(report);
    }

    /// Set duration
    pub fn set_duration(&mut self, ms: u64) {
        self.duration_ms = ms;
    }

    /// Check if any stream failed
    pub fn has_failures(&self) -> bool {
        !self.failed_streams.is_empty()
    }

    /// Report of one stream
    pub fn stream(&self, key: &str) -> Option<&StreamReport> {
        self.streams.iter().find(|r| r.stream == key)
    }
}
