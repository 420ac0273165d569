//! Bounded, resumable scans
//!
//! One scan pairs a [`ScanProducer`], which owns the connection and the row
//! loop, with a [`RowConsumer`], which converts and buffers rows and decides
//! when a checkpoint is due.
//!
//! # Laws
//!
//! - A scan from `NotStarted` always uses a limit of exactly 1.
//! - Reading fewer rows than the limit without being cancelled ends in `Done`.
//! - A scan stopped by a checkpoint or deadline ends in `Ongoing`, keyed by
//!   the last row delivered to the consumer.

mod consumer;
mod producer;
mod query;

pub use consumer::{CheckpointThresholds, Row, RowConsumer, RowSink};
pub use producer::{CancellationFlag, ScanFinished, ScanProducer, DEFAULT_LIMIT_QUERY};
pub use query::{build_scan_query, resume_predicate, ScanQuery};

#[cfg(test)]
mod tests;
