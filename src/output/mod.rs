//! Output module
//!
//! Assembles a finished scan into its ordered event sequence and renders
//! events as protocol messages.
//!
//! # Overview
//!
//! - [`assemble`] pairs flushed rows with the terminal scan state: one record
//!   event per row, then a single checkpoint event
//! - [`to_message`] turns an event into `RECORD` / `STATE` JSON

mod events;
mod message;

pub use events::{assemble, CheckpointEvent, OutputEvent, OutputEvents, RecordEvent};
pub use message::{log_message, record_message, state_message, to_message};
