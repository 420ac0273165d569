//! Output events and the assembler that produces them

use crate::scan::Row;
use crate::state::ScanState;
use crate::types::StreamId;
use chrono::{DateTime, Utc};

// ============================================================================
// Events
// ============================================================================

/// One converted row, ready for the record sink
#[derive(Debug, Clone, PartialEq)]
pub struct RecordEvent {
    pub stream: StreamId,
    pub data: Row,
    pub emitted_at: DateTime<Utc>,
}

/// Progress marker closing one scan's output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointEvent {
    pub stream: StreamId,
    pub state: ScanState,
    /// Rows emitted before this checkpoint
    pub record_count: u64,
}

/// Events emitted for one scan
#[derive(Debug, Clone, PartialEq)]
pub enum OutputEvent {
    Record(RecordEvent),
    Checkpoint(CheckpointEvent),
}

impl OutputEvent {
    /// Stream this event belongs to
    pub fn stream(&self) -> &StreamId {
        match self {
            OutputEvent::Record(record) => &record.stream,
            OutputEvent::Checkpoint(checkpoint) => &checkpoint.stream,
        }
    }

    /// Check if this is the checkpoint event
    pub fn is_checkpoint(&self) -> bool {
        matches!(self, OutputEvent::Checkpoint(_))
    }
}

// ============================================================================
// Assembler
// ============================================================================

/// Lazy, single-pass event sequence of one scan
///
/// Yields one record event per row in buffer order, then exactly one
/// checkpoint event. Consumed by value, so it cannot be replayed.
#[derive(Debug)]
pub struct OutputEvents {
    stream: StreamId,
    rows: std::vec::IntoIter<Row>,
    state: Option<ScanState>,
    emitted: u64,
}

/// Turn flushed rows and a terminal state into the scan's output sequence
pub fn assemble(stream: StreamId, rows: Vec<Row>, state: ScanState) -> OutputEvents {
    OutputEvents {
        stream,
        rows: rows.into_iter(),
        state: Some(state),
        emitted: 0,
    }
}

impl OutputEvents {
    /// Records yielded so far
    pub fn emitted(&self) -> u64 {
        self.emitted
    }
}

impl Iterator for OutputEvents {
    type Item = OutputEvent;

    fn next(&mut self) -> Option<OutputEvent> {
        if let Some(data) = self.rows.next() {
            self.emitted += 1;
            return Some(OutputEvent::Record(RecordEvent {
                stream: self.stream.clone(),
                data,
                emitted_at: Utc::now(),
            }));
        }

        self.state.take().map(|state| {
            OutputEvent::Checkpoint(CheckpointEvent {
                stream: self.stream.clone(),
                state,
                record_count: self.emitted,
            })
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.rows.len() + usize::from(self.state.is_some());
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for OutputEvents {}

impl std::iter::FusedIterator for OutputEvents {}
