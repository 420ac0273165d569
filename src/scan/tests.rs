//! Scan producer and row consumer tests
//!
//! The producer is driven against a scripted connection that returns canned
//! rows, honoring only the bound limit.

use super::*;
use crate::database::{ConnectionProvider, RowCallback, SourceConnection};
use crate::error::{Error, Result};
use crate::schema::{ConverterRegistry, JsonSchema, JsonType, NativeValue, SchemaProperty, ValueNode};
use crate::state::{CursorValue, ScanState};
use crate::types::StreamId;
use duckdb::types::Value as SqlValue;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

// ============================================================================
// Scripted Source
// ============================================================================

#[derive(Debug, Default)]
struct Journal {
    acquired: usize,
    read_only: bool,
    limit_queries: usize,
    queries: Vec<(String, Vec<SqlValue>)>,
}

struct ScriptedProvider {
    rows: Vec<Vec<NativeValue>>,
    limit: Option<NativeValue>,
    journal: Arc<Mutex<Journal>>,
}

impl ScriptedProvider {
    fn new(rows: Vec<Vec<NativeValue>>) -> Self {
        Self {
            rows,
            limit: Some(NativeValue::from(100_i64)),
            journal: Arc::default(),
        }
    }

    fn with_limit(mut self, limit: Option<NativeValue>) -> Self {
        self.limit = limit;
        self
    }

    fn journal(&self) -> std::sync::MutexGuard<'_, Journal> {
        self.journal.lock().unwrap()
    }

    fn bound_limit(&self) -> SqlValue {
        self.journal().queries[0].1.last().cloned().unwrap()
    }
}

struct ScriptedConnection {
    rows: Vec<Vec<NativeValue>>,
    limit: Option<NativeValue>,
    journal: Arc<Mutex<Journal>>,
}

impl SourceConnection for ScriptedConnection {
    fn set_read_only(&mut self) -> Result<()> {
        self.journal.lock().unwrap().read_only = true;
        Ok(())
    }

    fn query_scalar(&mut self, _sql: &str) -> Result<Option<NativeValue>> {
        self.journal.lock().unwrap().limit_queries += 1;
        Ok(self.limit.clone())
    }

    fn query_rows(
        &mut self,
        sql: &str,
        params: &[SqlValue],
        width: usize,
        on_row: &mut RowCallback<'_>,
    ) -> Result<usize> {
        assert!(self.journal.lock().unwrap().read_only);
        self.journal
            .lock()
            .unwrap()
            .queries
            .push((sql.to_string(), params.to_vec()));

        let limit = match params.last() {
            Some(SqlValue::BigInt(limit)) => usize::try_from(*limit).unwrap(),
            other => panic!("limit must be bound last, got {other:?}"),
        };
        let mut delivered = 0;
        for row in self.rows.iter().take(limit) {
            assert_eq!(row.len(), width);
            delivered += 1;
            if !on_row(row.clone())? {
                break;
            }
        }
        Ok(delivered)
    }
}

impl ConnectionProvider for ScriptedProvider {
    type Connection = ScriptedConnection;

    fn acquire(&self) -> Result<ScriptedConnection> {
        self.journal().acquired += 1;
        Ok(ScriptedConnection {
            rows: self.rows.clone(),
            limit: self.limit.clone(),
            journal: Arc::clone(&self.journal),
        })
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn row(id: i64, name: &str) -> Vec<NativeValue> {
    vec![NativeValue::from(id), NativeValue::from(name)]
}

fn rows(count: i64) -> Vec<Vec<NativeValue>> {
    (1..=count).map(|i| row(i, &format!("name-{i}"))).collect()
}

fn schema() -> JsonSchema {
    JsonSchema::new().with_property("name", SchemaProperty::new(JsonType::String))
}

fn consumer(thresholds: CheckpointThresholds) -> RowConsumer {
    RowConsumer::new(
        &StreamId::new("users"),
        &["name".to_string()],
        Some(&schema()),
        ConverterRegistry::builtin(),
        thresholds,
    )
}

fn unbounded() -> CheckpointThresholds {
    CheckpointThresholds {
        max_rows: 1_000,
        max_bytes: 1_000_000,
    }
}

fn producer(state: ScanState) -> ScanProducer {
    ScanProducer::new(
        StreamId::new("users"),
        vec!["id".to_string()],
        vec!["name".to_string()],
        state,
    )
}

fn at(id: i64) -> ScanState {
    ScanState::ongoing(vec![CursorValue::Integer(id)]).unwrap()
}

// ============================================================================
// Producer Laws
// ============================================================================

#[test]
fn test_bootstrap_uses_limit_of_one() {
    let provider = ScriptedProvider::new(rows(5));
    let mut sink = consumer(unbounded());
    let mut scan = producer(ScanState::NotStarted);

    scan.run(&provider, &mut sink).unwrap();

    assert_eq!(scan.limit(), Some(1));
    assert_eq!(provider.bound_limit(), SqlValue::BigInt(1));
    assert_eq!(provider.journal().limit_queries, 0);
    assert_eq!(scan.rows_read(), 1);
    assert_eq!(scan.final_state(), Some(&at(1)));
    assert!(!provider.journal().queries[0].0.contains("WHERE"));
}

#[test]
fn test_bootstrap_on_empty_source_is_done() {
    let provider = ScriptedProvider::new(vec![]);
    let mut sink = consumer(unbounded());
    let mut scan = producer(ScanState::NotStarted);

    scan.run(&provider, &mut sink).unwrap();
    assert_eq!(scan.final_state(), Some(&ScanState::Done));
}

#[test]
fn test_exhaustion_ends_in_done() {
    let provider = ScriptedProvider::new(rows(3));
    let mut sink = consumer(unbounded());
    let mut scan = producer(at(0));

    scan.run(&provider, &mut sink).unwrap();

    assert_eq!(provider.journal().limit_queries, 1);
    assert_eq!(scan.limit(), Some(100));
    assert_eq!(scan.rows_read(), 3);
    assert_eq!(scan.final_state(), Some(&ScanState::Done));
    assert!(scan.final_state().unwrap().cursor_key().is_empty());
}

#[test]
fn test_full_limit_ends_in_ongoing_at_last_row() {
    let provider = ScriptedProvider::new(rows(5)).with_limit(Some(NativeValue::from(2_i64)));
    let mut sink = consumer(unbounded());
    let mut scan = producer(at(0));

    scan.run(&provider, &mut sink).unwrap();

    assert_eq!(scan.rows_read(), 2);
    assert_eq!(scan.final_state(), Some(&at(2)));
    assert_eq!(sink.flush().len(), 2);
}

#[test]
fn test_checkpoint_never_ends_in_done() {
    let provider = ScriptedProvider::new(rows(3));
    let mut sink = consumer(CheckpointThresholds {
        max_rows: 2,
        max_bytes: 1_000_000,
    });
    let mut scan = producer(at(0));

    scan.run(&provider, &mut sink).unwrap();

    assert!(scan.cancellation().is_cancelled());
    assert_eq!(scan.rows_read(), 2);
    assert_eq!(scan.final_state(), Some(&at(2)));
}

#[test]
fn test_checkpoint_on_last_available_row_is_still_ongoing() {
    let provider = ScriptedProvider::new(rows(2));
    let mut sink = consumer(CheckpointThresholds {
        max_rows: 2,
        max_bytes: 1_000_000,
    });
    let mut scan = producer(at(0));

    scan.run(&provider, &mut sink).unwrap();

    assert_eq!(scan.rows_read(), 2);
    assert_eq!(scan.final_state(), Some(&at(2)));
}

#[test]
fn test_byte_threshold_triggers_checkpoint() {
    let provider = ScriptedProvider::new(rows(4));
    let mut sink = consumer(CheckpointThresholds {
        max_rows: 1_000,
        max_bytes: 1,
    });
    let mut scan = producer(at(0));

    scan.run(&provider, &mut sink).unwrap();

    assert_eq!(scan.rows_read(), 1);
    assert_eq!(scan.final_state(), Some(&at(1)));
}

#[test]
fn test_done_is_a_no_op() {
    let provider = ScriptedProvider::new(rows(3));
    let finished = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&finished);
    let mut sink = consumer(unbounded());
    let mut scan = producer(ScanState::Done).on_finished(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    scan.run(&provider, &mut sink).unwrap();

    assert_eq!(provider.journal().acquired, 0);
    assert_eq!(scan.final_state(), Some(&ScanState::Done));
    assert_eq!(finished.load(Ordering::SeqCst), 1);
}

#[test]
fn test_connection_is_read_only() {
    let provider = ScriptedProvider::new(rows(1));
    let mut scan = producer(at(0));
    scan.run(&provider, &mut consumer(unbounded())).unwrap();
    assert!(provider.journal().read_only);
}

#[test]
fn test_resume_binds_prior_key() {
    let provider = ScriptedProvider::new(rows(1));
    let mut scan = producer(at(41));
    scan.run(&provider, &mut consumer(unbounded())).unwrap();

    let (sql, params) = provider.journal().queries[0].clone();
    assert!(sql.contains("WHERE ((\"id\" > ?))"));
    assert_eq!(params, vec![SqlValue::BigInt(41), SqlValue::BigInt(100)]);
}

// ============================================================================
// Limit Query
// ============================================================================

#[test]
fn test_limit_is_floored_at_one() {
    let provider = ScriptedProvider::new(rows(3)).with_limit(Some(NativeValue::from(0_i64)));
    let mut scan = producer(at(0));
    scan.run(&provider, &mut consumer(unbounded())).unwrap();
    assert_eq!(scan.limit(), Some(1));
    assert_eq!(scan.final_state(), Some(&at(1)));
}

#[test]
fn test_limit_query_accepts_other_integer_shapes() {
    let provider =
        ScriptedProvider::new(rows(3)).with_limit(Some(NativeValue::Sql(SqlValue::HugeInt(2))));
    let mut scan = producer(at(0));
    scan.run(&provider, &mut consumer(unbounded())).unwrap();
    assert_eq!(scan.limit(), Some(2));
}

#[test]
fn test_empty_limit_query_is_fatal() {
    let provider = ScriptedProvider::new(rows(3)).with_limit(None);
    let mut scan = producer(at(0));
    let err = scan.run(&provider, &mut consumer(unbounded())).unwrap_err();
    assert!(matches!(err, Error::EmptyLimitQuery { .. }));
    assert!(err.is_invariant_violation());
    assert_eq!(scan.final_state(), None);
}

#[test]
fn test_non_integer_limit_is_fatal() {
    for limit in [NativeValue::from("lots"), NativeValue::null()] {
        let provider = ScriptedProvider::new(rows(3)).with_limit(Some(limit));
        let mut scan = producer(at(0));
        let err = scan.run(&provider, &mut consumer(unbounded())).unwrap_err();
        assert!(matches!(err, Error::InvalidLimit { .. }));
    }
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_null_cursor_on_last_row_is_fatal_and_still_finishes() {
    let provider = ScriptedProvider::new(vec![
        row(1, "a"),
        vec![NativeValue::null(), NativeValue::from("b")],
    ])
    .with_limit(Some(NativeValue::from(2_i64)));
    let finished = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&finished);
    let mut scan = producer(at(0)).on_finished(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let err = scan.run(&provider, &mut consumer(unbounded())).unwrap_err();

    assert!(matches!(err, Error::NullCursor { ref column, .. } if column == "id"));
    assert_eq!(scan.final_state(), None);
    assert_eq!(finished.load(Ordering::SeqCst), 1);
}

#[test]
fn test_null_cursor_on_earlier_row_is_not_checked() {
    let provider = ScriptedProvider::new(vec![
        vec![NativeValue::null(), NativeValue::from("a")],
        row(2, "b"),
    ])
    .with_limit(Some(NativeValue::from(2_i64)));
    let mut scan = producer(at(0));
    scan.run(&provider, &mut consumer(unbounded())).unwrap();
    assert_eq!(scan.final_state(), Some(&at(2)));
}

#[test]
fn test_conversion_failure_aborts_scan() {
    let provider = ScriptedProvider::new(vec![row(1, "ok"), row(2, "bad")]);
    let mut sink = RowConsumer::new(
        &StreamId::new("users"),
        &["name".to_string()],
        Some(&JsonSchema::new().with_property("name", SchemaProperty::new(JsonType::Integer))),
        ConverterRegistry::builtin(),
        unbounded(),
    );
    let mut scan = producer(at(0));

    let err = scan.run(&provider, &mut sink).unwrap_err();

    assert!(err.is_conversion());
    assert_eq!(scan.final_state(), None);
    assert_eq!(sink.buffered(), 0);
}

#[test]
fn test_state_arity_mismatch_is_rejected() {
    let provider = ScriptedProvider::new(rows(1));
    let state = ScanState::ongoing(vec![CursorValue::Integer(1), CursorValue::Integer(2)]).unwrap();
    let mut scan = producer(state);
    let err = scan.run(&provider, &mut consumer(unbounded())).unwrap_err();
    assert!(matches!(err, Error::InvalidState { .. }));
    assert_eq!(provider.journal().acquired, 0);
}

// ============================================================================
// Cancellation and Deadline
// ============================================================================

#[test]
fn test_cancelled_before_any_row_keeps_initial_state() {
    let provider = ScriptedProvider::new(rows(3));
    let flag = CancellationFlag::new();
    flag.cancel();
    flag.cancel();
    let mut scan = producer(at(7)).with_cancellation(flag);

    scan.run(&provider, &mut consumer(unbounded())).unwrap();

    assert_eq!(scan.rows_read(), 0);
    assert_eq!(scan.final_state(), Some(&at(7)));
}

#[test]
fn test_deadline_stops_between_rows() {
    let provider = ScriptedProvider::new(rows(3));
    let mut scan = producer(at(0)).with_deadline(Instant::now() - Duration::from_millis(1));

    scan.run(&provider, &mut consumer(unbounded())).unwrap();

    assert_eq!(scan.rows_read(), 1);
    assert_eq!(scan.final_state(), Some(&at(1)));
}

#[test]
fn test_generous_timeout_does_not_interfere() {
    let provider = ScriptedProvider::new(rows(3));
    let mut scan = producer(at(0)).with_timeout(Duration::from_secs(3600));
    scan.run(&provider, &mut consumer(unbounded())).unwrap();
    assert_eq!(scan.final_state(), Some(&ScanState::Done));
}

// ============================================================================
// Row Consumer
// ============================================================================

#[test]
fn test_consumer_flush_preserves_order_and_drains() {
    let mut sink = consumer(unbounded());
    sink.accept(vec![NativeValue::from("a")]).unwrap();
    sink.accept(vec![NativeValue::from("b")]).unwrap();

    let flushed = sink.flush();
    assert_eq!(
        flushed.iter().map(Row::to_json).collect::<Vec<_>>(),
        vec![json!({"name": "a"}), json!({"name": "b"})]
    );
    assert!(sink.flush().is_empty());
    assert_eq!(sink.row_count(), 2);
}

#[test]
fn test_consumer_counts_serialized_bytes() {
    let mut sink = consumer(CheckpointThresholds {
        max_rows: 100,
        max_bytes: 10,
    });
    sink.accept(vec![NativeValue::from("abc")]).unwrap();
    assert_eq!(sink.byte_count(), 5);
    assert!(!sink.should_checkpoint());

    sink.accept(vec![NativeValue::from("abcd")]).unwrap();
    assert_eq!(sink.byte_count(), 11);
    assert!(sink.should_checkpoint());

    sink.reset();
    assert_eq!(sink.byte_count(), 0);
    assert_eq!(sink.buffered(), 0);
    assert!(!sink.should_checkpoint());
}

#[test]
fn test_consumer_null_values() {
    let mut sink = consumer(unbounded());
    sink.accept(vec![NativeValue::null()]).unwrap();
    let rows = sink.flush();
    assert_eq!(rows[0].get("name"), Some(&ValueNode::Null));
}

#[test]
fn test_consumer_without_schema_uses_jsonb() {
    let mut sink = RowConsumer::new(
        &StreamId::new("events"),
        &["payload".to_string()],
        None,
        ConverterRegistry::builtin(),
        unbounded(),
    );
    assert_eq!(sink.columns()[0].column_type().to_string(), "jsonb");

    sink.accept(vec![NativeValue::from(r#"{"k": 1}"#)]).unwrap();
    assert_eq!(sink.flush()[0].to_json(), json!({"payload": {"k": 1}}));
}

#[test]
fn test_consumer_without_schema_keeps_scalar_text() {
    let mut sink = RowConsumer::new(
        &StreamId::new("events"),
        &["note".to_string()],
        None,
        ConverterRegistry::builtin(),
        unbounded(),
    );
    for text in ["null", "42", "true", "hello"] {
        sink.accept(vec![NativeValue::from(text)]).unwrap();
    }
    sink.accept(vec![NativeValue::null()]).unwrap();

    let notes: Vec<_> = sink.flush().iter().map(Row::to_json).collect();
    assert_eq!(
        notes,
        vec![
            json!({"note": "null"}),
            json!({"note": "42"}),
            json!({"note": "true"}),
            json!({"note": "hello"}),
            json!({"note": null}),
        ]
    );
}

#[test]
fn test_consumer_rejects_wrong_width() {
    let mut sink = consumer(unbounded());
    assert!(sink.accept(vec![]).is_err());
    assert_eq!(sink.buffered(), 0);
}
