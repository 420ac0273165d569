//! Execution engine module
//!
//! Stream orchestration on top of bounded scans.
//!
//! # Overview
//!
//! The engine module provides:
//! - `scan_once` - one bounded scan of one stream, assembled into events
//! - `SyncEngine` - runs many streams under a concurrency limit, one scan per
//!   turn, persisting each checkpoint through the `StateManager`
//! - Message types for output (events and logs)

mod types;

pub use types::{Message, StreamReport, SyncConfig, SyncStats};

use crate::config::StreamConfig;
use crate::database::ConnectionProvider;
use crate::error::{Error, Result};
use crate::output::{assemble, OutputEvents};
use crate::scan::{CancellationFlag, RowConsumer, ScanFinished, ScanProducer};
use crate::schema::ConverterRegistry;
use crate::state::{ScanState, StateManager};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;

/// Result of one bounded scan
#[derive(Debug)]
pub struct ScanOutcome {
    /// Terminal state of the scan
    pub state: ScanState,
    /// Rows read
    pub rows: u64,
    /// Records followed by the checkpoint
    pub events: OutputEvents,
}

/// Run one bounded scan of `stream` from `state`, blocking the current thread
pub fn scan_once<P>(
    provider: &P,
    registry: &Arc<ConverterRegistry>,
    stream: &StreamConfig,
    state: ScanState,
    config: &SyncConfig,
    on_finished: Option<ScanFinished>,
) -> Result<ScanOutcome>
where
    P: ConnectionProvider + ?Sized,
{
    let id = stream.id();
    let mut consumer = RowConsumer::new(
        &id,
        &stream.data_columns,
        stream.json_schema.as_ref(),
        Arc::clone(registry),
        config.thresholds,
    );

    let mut producer = ScanProducer::new(
        id.clone(),
        stream.cursor_columns.clone(),
        stream.data_columns.clone(),
        state,
    )
    .with_limit_query(config.limit_query.clone());
    if let Some(deadline) = config.scan_deadline {
        producer = producer.with_timeout(deadline);
    }
    if let Some(hook) = on_finished {
        producer = producer.on_finished(move || hook());
    }

    producer.run(provider, &mut consumer)?;

    let rows = producer.rows_read();
    let state = producer
        .into_final_state()
        .ok_or_else(|| Error::invalid_state("scan finished without a terminal state"))?;
    let events = assemble(id, consumer.flush(), state.clone());

    Ok(ScanOutcome {
        state,
        rows,
        events,
    })
}

/// Sync engine for orchestrating many streams
pub struct SyncEngine<P> {
    /// Connection provider shared by every scan
    provider: Arc<P>,
    /// Value converters
    registry: Arc<ConverterRegistry>,
    /// State manager
    state: StateManager,
    /// Sync configuration
    config: SyncConfig,
    /// Stops streams between scans
    shutdown: CancellationFlag,
}

/// Everything one stream's task needs
struct StreamContext<P> {
    provider: Arc<P>,
    registry: Arc<ConverterRegistry>,
    state: StateManager,
    config: Arc<SyncConfig>,
    permits: Arc<Semaphore>,
    tx: mpsc::Sender<Message>,
    scans_finished: Arc<AtomicU64>,
    shutdown: CancellationFlag,
}

impl<P> SyncEngine<P>
where
    P: ConnectionProvider + 'static,
{
    /// Create a new sync engine
    pub fn new(provider: Arc<P>, state: StateManager) -> Self {
        Self {
            provider,
            registry: ConverterRegistry::builtin(),
            state,
            config: SyncConfig::default(),
            shutdown: CancellationFlag::new(),
        }
    }

    /// Set sync configuration
    #[must_use]
    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a custom converter registry
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<ConverterRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Get the state manager
    pub fn state(&self) -> &StateManager {
        &self.state
    }

    /// Get the sync configuration
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Flag that stops every stream before its next scan
    pub fn shutdown(&self) -> &CancellationFlag {
        &self.shutdown
    }

    /// Sync streams concurrently, sending events to `tx`
    ///
    /// Each stream runs one bounded scan per permit and loops until its state
    /// is `Done` or it reaches `max_scans_per_stream`. A failing stream stops
    /// on its own; the others carry on.
    pub async fn sync(
        &self,
        streams: &[StreamConfig],
        tx: mpsc::Sender<Message>,
    ) -> Result<SyncStats> {
        let start = Instant::now();
        let permits = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let scans_finished = Arc::new(AtomicU64::new(0));
        let config = Arc::new(self.config.clone());

        tracing::info!(
            streams = streams.len(),
            concurrency = self.config.concurrency,
            "Starting sync"
        );

        let mut tasks = JoinSet::new();
        for stream in streams {
            let ctx = StreamContext {
                provider: Arc::clone(&self.provider),
                registry: Arc::clone(&self.registry),
                state: self.state.clone(),
                config: Arc::clone(&config),
                permits: Arc::clone(&permits),
                tx: tx.clone(),
                scans_finished: Arc::clone(&scans_finished),
                shutdown: self.shutdown.clone(),
            };
            tasks.spawn(drive_stream(ctx, stream.clone()));
        }
        drop(tx);

        let mut stats = SyncStats::new();
        while let Some(joined) = tasks.join_next().await {
            let report = joined.map_err(|e| Error::Other(format!("Stream task failed: {e}")))?;
            stats.add_stream(report);
        }
        stats.streams.sort_by(|a, b| a.stream.cmp(&b.stream));
        stats.scans_completed = scans_finished.load(Ordering::SeqCst);
        stats.set_duration(start.elapsed().as_millis() as u64);

        tracing::info!(
            records = stats.records_synced,
            scans = stats.scans_completed,
            failed = stats.failed_streams.len(),
            duration_ms = stats.duration_ms,
            "Sync finished"
        );
        Ok(stats)
    }
}

impl<P> std::fmt::Debug for SyncEngine<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("config", &self.config)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

async fn drive_stream<P>(ctx: StreamContext<P>, stream: StreamConfig) -> StreamReport
where
    P: ConnectionProvider + 'static,
{
    let key = stream.id().state_key();
    let mut report = StreamReport {
        stream: key.clone(),
        scans: 0,
        records: 0,
        state: ctx.state.get(&key).await,
        error: None,
    };

    loop {
        if report.state.is_done() {
            tracing::debug!(stream = %key, "Stream done");
            break;
        }
        if ctx
            .config
            .max_scans_per_stream
            .is_some_and(|max| report.scans >= max)
        {
            tracing::info!(stream = %key, scans = report.scans, "Scan budget reached");
            break;
        }
        if ctx.shutdown.is_cancelled() {
            tracing::info!(stream = %key, "Shutdown requested");
            break;
        }

        let permit = match Arc::clone(&ctx.permits).acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                fail(&ctx, &mut report, &Error::Other(e.to_string())).await;
                break;
            }
        };

        let provider = Arc::clone(&ctx.provider);
        let registry = Arc::clone(&ctx.registry);
        let config = Arc::clone(&ctx.config);
        let scan_stream = stream.clone();
        let from = report.state.clone();
        let counter = Arc::clone(&ctx.scans_finished);
        let hook: ScanFinished = Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let joined = tokio::task::spawn_blocking(move || {
            scan_once(
                provider.as_ref(),
                &registry,
                &scan_stream,
                from,
                &config,
                Some(hook),
            )
        })
        .await;
        drop(permit);

        let outcome = match joined {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                fail(&ctx, &mut report, &e).await;
                break;
            }
            Err(e) => {
                fail(&ctx, &mut report, &Error::Other(format!("Scan task failed: {e}"))).await;
                break;
            }
        };

        report.scans += 1;
        report.records += outcome.rows;

        for event in outcome.events {
            if ctx.tx.send(Message::Event(event)).await.is_err() {
                report.error = Some("output channel closed".to_string());
                return report;
            }
        }
        if let Err(e) = ctx.state.set(&key, outcome.state.clone()).await {
            fail(&ctx, &mut report, &e).await;
            break;
        }
        report.state = outcome.state;
    }

    report
}

async fn fail<P>(ctx: &StreamContext<P>, report: &mut StreamReport, error: &Error) {
    tracing::error!(stream = %report.stream, error = %error, "Stream failed");
    // The receiver may be gone; the report still carries the error.
    let _ = ctx
        .tx
        .send(Message::error(format!(
            "Stream {} failed: {error}",
            report.stream
        )))
        .await;
    report.error = Some(error.to_string());
}
