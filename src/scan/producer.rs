//! Scan producer
//!
//! Runs one bounded, resumable pass over a stream: computes a fetch limit,
//! queries past the prior cursor key in cursor order, feeds each row to a
//! [`RowSink`], and concludes with exactly one terminal [`ScanState`].

use super::consumer::RowSink;
use super::query::build_scan_query;
use crate::database::{ConnectionProvider, SourceConnection};
use crate::error::{Error, Result};
use crate::schema::{ConverterRegistry, LeafType, NativeValue, ValueNode};
use crate::state::{CursorValue, ScanState};
use crate::types::StreamId;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default limit-estimation query
pub const DEFAULT_LIMIT_QUERY: &str = "SELECT 10000";

// ============================================================================
// Cancellation
// ============================================================================

/// Cooperative, idempotent cancellation request shared between threads
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    /// Create an unset flag
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; repeated calls have no further effect
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Check whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Hook invoked once at the end of every `run`, whatever the outcome
pub type ScanFinished = Arc<dyn Fn() + Send + Sync>;

// ============================================================================
// Producer
// ============================================================================

/// One bounded scan of one stream
pub struct ScanProducer {
    stream: StreamId,
    cursor_columns: Vec<String>,
    data_columns: Vec<String>,
    state: ScanState,
    limit_query: String,
    cancel: CancellationFlag,
    deadline: Option<Instant>,
    on_finished: Option<ScanFinished>,
    final_state: Option<ScanState>,
    limit: Option<u64>,
    rows_read: u64,
}

impl ScanProducer {
    /// Create a producer resuming from `state`
    pub fn new(
        stream: StreamId,
        cursor_columns: Vec<String>,
        data_columns: Vec<String>,
        state: ScanState,
    ) -> Self {
        Self {
            stream,
            cursor_columns,
            data_columns,
            state,
            limit_query: DEFAULT_LIMIT_QUERY.to_string(),
            cancel: CancellationFlag::new(),
            deadline: None,
            on_finished: None,
            final_state: None,
            limit: None,
            rows_read: 0,
        }
    }

    /// Set the limit-estimation query
    #[must_use]
    pub fn with_limit_query(mut self, query: impl Into<String>) -> Self {
        self.limit_query = query.into();
        self
    }

    /// Share an external cancellation flag
    #[must_use]
    pub fn with_cancellation(mut self, flag: CancellationFlag) -> Self {
        self.cancel = flag;
        self
    }

    /// Stop between rows once this instant has passed
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Stop between rows once `timeout` has elapsed from now
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Set the scan-finished hook
    #[must_use]
    pub fn on_finished<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_finished = Some(Arc::new(hook));
        self
    }

    /// Stream being scanned
    pub fn stream(&self) -> &StreamId {
        &self.stream
    }

    /// Cancellation flag of this scan
    pub fn cancellation(&self) -> &CancellationFlag {
        &self.cancel
    }

    /// State the scan resumes from
    pub fn initial_state(&self) -> &ScanState {
        &self.state
    }

    /// Terminal state, available after a successful `run`
    pub fn final_state(&self) -> Option<&ScanState> {
        self.final_state.as_ref()
    }

    /// Consume the producer, returning the terminal state
    pub fn into_final_state(self) -> Option<ScanState> {
        self.final_state
    }

    /// Limit used by the last `run`
    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    /// Rows delivered to the sink by the last `run`
    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    /// Run one bounded scan
    ///
    /// A no-op when the state is already `Done`. Any error aborts the scan and
    /// leaves no terminal state; rows already handed to `sink` stay there.
    /// The scan-finished hook runs in every case.
    pub fn run<P>(&mut self, provider: &P, sink: &mut dyn RowSink) -> Result<()>
    where
        P: ConnectionProvider + ?Sized,
    {
        let result = self.scan(provider, sink);
        if let Some(hook) = &self.on_finished {
            hook();
        }
        if let Err(e) = &result {
            tracing::error!(stream = %self.stream, error = %e, "Scan failed");
        }
        result
    }

    fn scan<P>(&mut self, provider: &P, sink: &mut dyn RowSink) -> Result<()>
    where
        P: ConnectionProvider + ?Sized,
    {
        self.final_state = None;
        self.limit = None;
        self.rows_read = 0;

        if self.state.is_done() {
            tracing::debug!(stream = %self.stream, "Stream already done, skipping scan");
            self.final_state = Some(ScanState::Done);
            return Ok(());
        }
        if self.cursor_columns.is_empty() {
            return Err(Error::config(format!(
                "Stream '{}' has no cursor columns",
                self.stream
            )));
        }
        self.state.validate(self.cursor_columns.len())?;

        let mut conn = provider.acquire()?;
        conn.set_read_only()?;

        let limit = self.compute_limit(&mut conn)?;
        self.limit = Some(limit);

        let table = provider.table_ref(&self.stream);
        let query = build_scan_query(
            &table,
            &self.cursor_columns,
            &self.data_columns,
            self.state.cursor_key(),
            limit,
        );
        tracing::info!(stream = %self.stream, from = %self.state, limit, "Starting scan");
        tracing::debug!(stream = %self.stream, sql = %query.sql, "Scan query");

        let cursor_width = self.cursor_columns.len();
        let width = cursor_width + self.data_columns.len();
        let cancel = self.cancel.clone();
        let deadline = self.deadline;

        let mut rows_read = 0_u64;
        let mut last_cursor: Option<Vec<NativeValue>> = None;
        let mut deadline_hit = false;

        if !cancel.is_cancelled() {
            conn.query_rows(&query.sql, &query.params, width, &mut |mut values| {
                if cancel.is_cancelled() {
                    return Ok(false);
                }

                let data = values.split_off(cursor_width);
                sink.accept(data)?;
                rows_read += 1;
                last_cursor = Some(values);

                if sink.should_checkpoint() {
                    cancel.cancel();
                }
                if deadline.is_some_and(|d| Instant::now() >= d) {
                    deadline_hit = true;
                    cancel.cancel();
                }
                Ok(!cancel.is_cancelled())
            })?;
        }
        self.rows_read = rows_read;

        if deadline_hit {
            tracing::warn!(stream = %self.stream, rows = rows_read, "Scan deadline reached");
        }

        let cancelled = cancel.is_cancelled();
        let terminal = if !cancelled && rows_read < limit {
            ScanState::Done
        } else {
            match last_cursor {
                Some(values) => ScanState::ongoing(self.cursor_key(&values)?)?,
                None => self.state.clone(),
            }
        };

        tracing::info!(
            stream = %self.stream,
            rows = rows_read,
            cancelled,
            state = %terminal,
            "Scan finished"
        );
        self.final_state = Some(terminal);
        Ok(())
    }

    /// Fetch limit: 1 when bootstrapping, otherwise the limit query floored at 1
    fn compute_limit<C: SourceConnection>(&self, conn: &mut C) -> Result<u64> {
        if self.state == ScanState::NotStarted {
            return Ok(1);
        }

        let value = conn
            .query_scalar(&self.limit_query)?
            .ok_or_else(|| Error::EmptyLimitQuery {
                query: self.limit_query.clone(),
            })?;

        match ConverterRegistry::builtin().convert_leaf(LeafType::Integer, &value) {
            Ok(ValueNode::Integer(limit)) => {
                Ok(u64::try_from(limit.max(1)).unwrap_or(u64::MAX))
            }
            _ => Err(Error::InvalidLimit {
                query: self.limit_query.clone(),
                value: value.to_string(),
            }),
        }
    }

    fn cursor_key(&self, values: &[NativeValue]) -> Result<Vec<CursorValue>> {
        let stream = self.stream.to_string();
        self.cursor_columns
            .iter()
            .zip(values)
            .map(|(column, value)| CursorValue::from_native(value, &stream, column))
            .collect()
    }
}

impl std::fmt::Debug for ScanProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanProducer")
            .field("stream", &self.stream)
            .field("cursor_columns", &self.cursor_columns)
            .field("data_columns", &self.data_columns)
            .field("state", &self.state)
            .field("limit_query", &self.limit_query)
            .field("cancelled", &self.cancel.is_cancelled())
            .field("deadline", &self.deadline)
            .field("final_state", &self.final_state)
            .finish_non_exhaustive()
    }
}
