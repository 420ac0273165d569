//! Protocol messages
//!
//! Serializes output events into the line-delimited JSON shapes a downstream
//! sink expects: `RECORD`, `STATE` and `LOG`.

use super::events::{CheckpointEvent, OutputEvent, RecordEvent};
use crate::error::Result;
use crate::types::{JsonValue, LogLevel, StreamId};
use serde_json::json;

fn descriptor(stream: &StreamId) -> JsonValue {
    json!({
        "name": stream.name,
        "namespace": stream.namespace,
    })
}

/// `RECORD` message for one row
pub fn record_message(event: &RecordEvent) -> JsonValue {
    json!({
        "type": "RECORD",
        "record": {
            "stream": event.stream.name,
            "namespace": event.stream.namespace,
            "data": event.data.to_json(),
            "emitted_at": event.emitted_at.timestamp_millis(),
        }
    })
}

/// Per-stream `STATE` message carrying the opaque scan state
pub fn state_message(event: &CheckpointEvent) -> Result<JsonValue> {
    Ok(json!({
        "type": "STATE",
        "state": {
            "type": "STREAM",
            "stream": {
                "stream_descriptor": descriptor(&event.stream),
                "stream_state": serde_json::to_value(&event.state)?,
            },
            "sourceStats": {
                "recordCount": event.record_count,
            }
        }
    }))
}

/// `LOG` message
pub fn log_message(level: LogLevel, message: &str) -> JsonValue {
    json!({
        "type": "LOG",
        "log": {
            "level": level,
            "message": message,
        }
    })
}

/// Protocol message for any output event
pub fn to_message(event: &OutputEvent) -> Result<JsonValue> {
    match event {
        OutputEvent::Record(record) => Ok(record_message(record)),
        OutputEvent::Checkpoint(checkpoint) => state_message(checkpoint),
    }
}
