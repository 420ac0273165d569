//! Column types and schema resolution
//!
//! A column resolves to either a [`LeafType`] (one scalar conversion) or an
//! array of some item type (element-wise conversion, recursively).

use super::registry::ConverterRegistry;
use super::types::{JsonType, SchemaProperty};
use super::value::{NativeValue, ValueNode};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scalar column types, each with exactly one conversion function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeafType {
    Boolean,
    String,
    Number,
    Integer,
    Date,
    TimeWithTimezone,
    TimeWithoutTimezone,
    TimestampWithTimezone,
    TimestampWithoutTimezone,
    Binary,
    /// Generic structured value, the fallback for unrecognized schemas
    Jsonb,
    Null,
}

impl LeafType {
    /// All leaf types
    pub const ALL: [LeafType; 12] = [
        LeafType::Boolean,
        LeafType::String,
        LeafType::Number,
        LeafType::Integer,
        LeafType::Date,
        LeafType::TimeWithTimezone,
        LeafType::TimeWithoutTimezone,
        LeafType::TimestampWithTimezone,
        LeafType::TimestampWithoutTimezone,
        LeafType::Binary,
        LeafType::Jsonb,
        LeafType::Null,
    ];

    /// Leaf type named by a semantic hint, if the hint names one
    fn from_hint(hint: &str) -> Option<Self> {
        match hint {
            "boolean" => Some(LeafType::Boolean),
            "integer" | "big_integer" => Some(LeafType::Integer),
            "number" | "big_number" => Some(LeafType::Number),
            "date" => Some(LeafType::Date),
            "time_with_timezone" => Some(LeafType::TimeWithTimezone),
            "time_without_timezone" => Some(LeafType::TimeWithoutTimezone),
            "timestamp_with_timezone" => Some(LeafType::TimestampWithTimezone),
            "timestamp_without_timezone" => Some(LeafType::TimestampWithoutTimezone),
            _ => None,
        }
    }
}

impl fmt::Display for LeafType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LeafType::Boolean => "boolean",
            LeafType::String => "string",
            LeafType::Number => "number",
            LeafType::Integer => "integer",
            LeafType::Date => "date",
            LeafType::TimeWithTimezone => "time_with_timezone",
            LeafType::TimeWithoutTimezone => "time_without_timezone",
            LeafType::TimestampWithTimezone => "timestamp_with_timezone",
            LeafType::TimestampWithoutTimezone => "timestamp_without_timezone",
            LeafType::Binary => "binary",
            LeafType::Jsonb => "jsonb",
            LeafType::Null => "null",
        };
        f.write_str(name)
    }
}

/// Resolved type of a column
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Leaf(LeafType),
    Array(Box<ColumnType>),
}

impl ColumnType {
    /// Resolve a column schema to a concrete type
    ///
    /// Rules, first match wins:
    /// 1. `array` recurses into `items` (missing items resolve to jsonb)
    /// 2. a semantic hint naming a leaf type
    /// 3. `number` is a floating point NUMBER, `integer` is INTEGER
    /// 4. `string` with content encoding `base64` is BINARY
    /// 5. `string` with format `date`, `date-time`, or `time` is temporal;
    ///    `date-time` defaults to with-timezone, `time` to without-timezone
    /// 6. `boolean`, `string`, `null` map to themselves
    /// 7. anything else is jsonb
    pub fn resolve(schema: &SchemaProperty) -> Self {
        let declared = schema.primary_type();

        if declared == Some(JsonType::Array) {
            let item = schema
                .items
                .as_deref()
                .map_or(ColumnType::Leaf(LeafType::Jsonb), ColumnType::resolve);
            return ColumnType::Array(Box::new(item));
        }

        if let Some(leaf) = schema.airbyte_type.as_deref().and_then(LeafType::from_hint) {
            return ColumnType::Leaf(leaf);
        }

        let leaf = match declared {
            Some(JsonType::Number) => LeafType::Number,
            Some(JsonType::Integer) => LeafType::Integer,
            Some(JsonType::Boolean) => LeafType::Boolean,
            Some(JsonType::Null) => LeafType::Null,
            Some(JsonType::String) => {
                if schema
                    .content_encoding
                    .as_deref()
                    .is_some_and(|enc| enc.eq_ignore_ascii_case("base64"))
                {
                    LeafType::Binary
                } else {
                    match schema.format.as_deref() {
                        Some("date") => LeafType::Date,
                        Some("date-time") => LeafType::TimestampWithTimezone,
                        Some("time") => LeafType::TimeWithoutTimezone,
                        _ => LeafType::String,
                    }
                }
            }
            Some(JsonType::Object | JsonType::Array) | None => LeafType::Jsonb,
        };
        ColumnType::Leaf(leaf)
    }

    /// Innermost leaf type
    pub fn leaf(&self) -> LeafType {
        match self {
            ColumnType::Leaf(leaf) => *leaf,
            ColumnType::Array(item) => item.leaf(),
        }
    }

    /// Convert a native value with the built-in registry
    pub fn convert(&self, value: &NativeValue) -> std::result::Result<ValueNode, String> {
        ConverterRegistry::builtin().convert(self, value)
    }

    /// Convert a native value with a caller-supplied registry
    pub fn convert_with(
        &self,
        registry: &ConverterRegistry,
        value: &NativeValue,
    ) -> std::result::Result<ValueNode, String> {
        registry.convert(self, value)
    }
}

impl From<LeafType> for ColumnType {
    fn from(leaf: LeafType) -> Self {
        ColumnType::Leaf(leaf)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Leaf(leaf) => write!(f, "{leaf}"),
            ColumnType::Array(item) => write!(f, "array<{item}>"),
        }
    }
}
