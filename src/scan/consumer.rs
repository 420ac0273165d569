//! Row consumer
//!
//! Converts the data columns of each scanned row through the column type
//! system, buffers the result, and recommends a checkpoint once the buffered
//! rows or bytes reach the configured thresholds.

use crate::config::CheckpointConfig;
use crate::error::{Error, Result};
use crate::schema::{
    ColumnConverter, ColumnType, ConverterRegistry, JsonSchema, LeafType, NativeValue, ValueNode,
};
use crate::types::{JsonObject, JsonValue, StreamId};
use std::sync::Arc;

/// Receiver of scanned rows
pub trait RowSink {
    /// Take one row's data-column values, in data-column order
    fn accept(&mut self, values: Vec<NativeValue>) -> Result<()>;

    /// Whether the producer should stop after the current row
    fn should_checkpoint(&self) -> bool;
}

/// Limits after which a checkpoint is recommended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckpointThresholds {
    pub max_rows: u64,
    pub max_bytes: u64,
}

impl Default for CheckpointThresholds {
    fn default() -> Self {
        CheckpointConfig::default().into()
    }
}

impl From<CheckpointConfig> for CheckpointThresholds {
    fn from(config: CheckpointConfig) -> Self {
        Self {
            max_rows: config.max_rows,
            max_bytes: config.max_bytes,
        }
    }
}

/// One converted row, fields in data-column order
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub fields: Vec<(String, ValueNode)>,
}

impl Row {
    /// Value of a column
    pub fn get(&self, column: &str) -> Option<&ValueNode> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if the row has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Render as a JSON object keyed by column name
    pub fn to_json(&self) -> JsonValue {
        let obj: JsonObject = self
            .fields
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect();
        JsonValue::Object(obj)
    }
}

/// Buffering consumer of one scan's rows
#[derive(Debug)]
pub struct RowConsumer {
    columns: Vec<ColumnConverter>,
    thresholds: CheckpointThresholds,
    buffer: Vec<Row>,
    row_count: u64,
    byte_count: u64,
}

impl RowConsumer {
    /// Create a consumer for the data columns of a stream
    ///
    /// Columns without a schema entry are treated as jsonb.
    pub fn new(
        stream: &StreamId,
        data_columns: &[String],
        schema: Option<&JsonSchema>,
        registry: Arc<ConverterRegistry>,
        thresholds: CheckpointThresholds,
    ) -> Self {
        let columns = data_columns
            .iter()
            .map(|name| {
                let column_type = match schema.and_then(|s| s.get_property(name)) {
                    Some(property) => ColumnType::resolve(property),
                    None => {
                        tracing::warn!(
                            stream = %stream,
                            column = %name,
                            "No schema for column, treating as jsonb"
                        );
                        ColumnType::Leaf(LeafType::Jsonb)
                    }
                };
                ColumnConverter::new(name.clone(), column_type, Arc::clone(&registry))
            })
            .collect();

        Self {
            columns,
            thresholds,
            buffer: Vec::new(),
            row_count: 0,
            byte_count: 0,
        }
    }

    /// Converters of the data columns, in order
    pub fn columns(&self) -> &[ColumnConverter] {
        &self.columns
    }

    /// Rows accepted since creation or the last reset
    pub fn row_count(&self) -> u64 {
        self.row_count
    }

    /// Serialized bytes accepted since creation or the last reset
    pub fn byte_count(&self) -> u64 {
        self.byte_count
    }

    /// Rows currently buffered
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Drain buffered rows, in acceptance order
    pub fn flush(&mut self) -> Vec<Row> {
        std::mem::take(&mut self.buffer)
    }

    /// Drop buffered rows and zero the counters
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.row_count = 0;
        self.byte_count = 0;
    }
}

impl RowSink for RowConsumer {
    fn accept(&mut self, values: Vec<NativeValue>) -> Result<()> {
        if values.len() != self.columns.len() {
            return Err(Error::Other(format!(
                "row has {} values but {} data columns are configured",
                values.len(),
                self.columns.len()
            )));
        }

        let mut bytes = 0_u64;
        let mut fields = Vec::with_capacity(values.len());
        for (converter, value) in self.columns.iter().zip(&values) {
            let node = converter.convert(value)?;
            bytes += node.serialized_len() as u64;
            fields.push((converter.name().to_string(), node));
        }

        self.buffer.push(Row { fields });
        self.row_count += 1;
        self.byte_count += bytes;
        Ok(())
    }

    fn should_checkpoint(&self) -> bool {
        self.row_count >= self.thresholds.max_rows || self.byte_count >= self.thresholds.max_bytes
    }
}
