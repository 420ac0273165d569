//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands, OutputFormat};
use crate::config::{load_config, SourceConfig, StreamConfig};
use crate::database::DatabaseEngine;
use crate::engine::{Message, SyncConfig, SyncEngine, SyncStats};
use crate::error::{Error, Result, ResultExt};
use crate::output::{log_message, to_message};
use crate::state::StateManager;
use crate::types::{LogLevel, StreamId};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Capacity of the channel between the sync engine and stdout
const MESSAGE_BUFFER: usize = 1024;

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Check => self.check(),
            Commands::Streams => self.streams(),
            Commands::Discover { table, namespace } => {
                self.discover(table, namespace.as_deref())
            }
            Commands::Read { streams, max_scans } => {
                self.read(streams.as_deref(), *max_scans).await
            }
            Commands::Validate => self.validate(),
        }
    }

    /// Load the source configuration
    fn load_source(&self) -> Result<SourceConfig> {
        let path = self
            .cli
            .config
            .as_ref()
            .ok_or_else(|| Error::config("Config file not specified (use -c flag)"))?;
        load_config(path)
    }

    /// Load state
    fn load_state(&self) -> Result<StateManager> {
        // Inline state takes precedence
        if let Some(state_json) = &self.cli.state_json {
            StateManager::from_json(state_json)
        } else if let Some(path) = &self.cli.state {
            StateManager::from_file(path)
        } else {
            Ok(StateManager::in_memory())
        }
    }

    /// Check connection
    fn check(&self) -> Result<()> {
        let config = self.load_source()?;
        self.log(
            LogLevel::Info,
            &format!("Checking connection to {} database", config.database.engine),
        );

        let status = match DatabaseEngine::new(&config.database) {
            Ok(engine) => match engine.check_connection() {
                Ok(()) => {
                    let table_count = engine.list_tables().map(|t| t.len()).unwrap_or(0);
                    json!({
                        "status": "SUCCEEDED",
                        "message": format!("Connection successful. Found {table_count} tables.")
                    })
                }
                Err(e) => json!({
                    "status": "FAILED",
                    "message": format!("Connection check failed: {e}")
                }),
            },
            Err(e) => json!({
                "status": "FAILED",
                "message": format!("Failed to connect: {e}")
            }),
        };

        self.output_message(&json!({
            "type": "CONNECTION_STATUS",
            "connectionStatus": status
        }));
        Ok(())
    }

    /// List tables as streams
    fn streams(&self) -> Result<()> {
        let config = self.load_source()?;
        let engine = DatabaseEngine::new(&config.database)?;
        let tables = engine.list_tables()?;

        self.output_message(&json!({
            "type": "STREAMS",
            "streams": tables,
            "connection": engine.connection_info()
        }));
        Ok(())
    }

    /// Describe one table
    fn discover(&self, table: &str, namespace: Option<&str>) -> Result<()> {
        let config = self.load_source()?;
        let engine = DatabaseEngine::new(&config.database)?;
        let stream = match namespace {
            Some(ns) => StreamId::with_namespace(ns, table),
            None => StreamId::new(table),
        };
        let schema = engine.discover(&stream)?;

        self.output_message(&json!({
            "type": "CATALOG",
            "catalog": {
                "streams": [{
                    "name": stream.name,
                    "namespace": stream.namespace,
                    "json_schema": schema.to_json()
                }]
            }
        }));
        Ok(())
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        let config = self.load_source()?;
        self.log(
            LogLevel::Info,
            &format!(
                "Configuration valid: {} streams from {} database",
                config.streams.len(),
                config.database.engine
            ),
        );
        Ok(())
    }

    /// Read streams through the sync engine
    async fn read(&self, streams: Option<&str>, max_scans: Option<u32>) -> Result<()> {
        let config = self.load_source()?;
        let selected = select_streams(&config, streams)?;
        let state = self.load_state()?;

        let mut sync_config = SyncConfig::from(&config);
        if let Some(max) = max_scans {
            sync_config = sync_config.with_max_scans_per_stream(max);
        }

        let database = Arc::new(
            DatabaseEngine::new(&config.database).context("Failed to open source database")?,
        );
        self.log(
            LogLevel::Info,
            &format!(
                "Starting sync for {} streams from {}",
                selected.len(),
                database.connection_info()
            ),
        );

        let engine = SyncEngine::new(database, state).with_config(sync_config);
        let shutdown = engine.shutdown().clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, stopping after in-flight scans");
                shutdown.cancel();
            }
        });

        let (tx, mut rx) = mpsc::channel(MESSAGE_BUFFER);
        let printer = async {
            let mut result = Ok(());
            while let Some(msg) = rx.recv().await {
                if let Err(e) = self.output_engine_message(&msg) {
                    tracing::error!(error = %e, "Failed to render message");
                    result = Err(e);
                }
            }
            result
        };
        let (stats, printed) = tokio::join!(engine.sync(&selected, tx), printer);
        let stats = stats?;
        printed?;

        if let Some(path) = &self.cli.state {
            engine
                .state()
                .save_to_file(path)
                .await
                .with_context(|| format!("Failed to persist state to {}", path.display()))?;
        }

        self.output_message(&summary(&stats));
        Ok(())
    }

    /// Log both to tracing and as a protocol message
    fn log(&self, level: LogLevel, message: &str) {
        level.emit(message);
        self.output_message(&log_message(level, message));
    }

    /// Output a message
    fn output_message(&self, msg: &Value) {
        match self.cli.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string(msg).unwrap_or_default());
            }
            OutputFormat::Pretty => {
                println!("{}", serde_json::to_string_pretty(msg).unwrap_or_default());
            }
        }
    }

    /// Output an engine message
    fn output_engine_message(&self, msg: &Message) -> Result<()> {
        let value = match msg {
            Message::Event(event) => to_message(event)?,
            Message::Log { level, message } => log_message(*level, message),
        };
        self.output_message(&value);
        Ok(())
    }
}

/// Streams named in a comma-separated list, or every configured stream
fn select_streams(config: &SourceConfig, names: Option<&str>) -> Result<Vec<StreamConfig>> {
    let Some(names) = names else {
        return Ok(config.streams.clone());
    };

    names
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| {
            config
                .stream(name)
                .cloned()
                .ok_or_else(|| Error::StreamNotFound {
                    stream: name.to_string(),
                })
        })
        .collect()
}

/// `SYNC_SUMMARY` message of a finished sync
fn summary(stats: &SyncStats) -> Value {
    let status = if !stats.has_failures() {
        "SUCCEEDED"
    } else if stats.streams_synced == 0 {
        "FAILED"
    } else {
        "PARTIAL"
    };

    let streams: Vec<Value> = stats
        .streams
        .iter()
        .map(|report| {
            let mut entry = json!({
                "stream": report.stream,
                "status": if report.is_failed() { "FAILED" } else { "SUCCESS" },
                "records_synced": report.records,
                "scans": report.scans,
                "phase": report.state.phase(),
            });
            if let Some(error) = &report.error {
                entry["error"] = json!(error);
            }
            entry
        })
        .collect();

    json!({
        "type": "SYNC_SUMMARY",
        "summary": {
            "status": status,
            "total_records": stats.records_synced,
            "total_scans": stats.scans_completed,
            "total_streams": stats.streams.len(),
            "failed_streams": stats.failed_streams,
            "duration_ms": stats.duration_ms,
            "streams": streams
        }
    })
}
