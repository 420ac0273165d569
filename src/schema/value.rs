//! Native and canonical value models
//!
//! [`NativeValue`] is what a driver hands us for one field: either a DuckDB
//! value (every integer width, floats, decimals, temporal types, blobs, lists,
//! structs, maps) or an already-parsed JSON node. [`ValueNode`] is the
//! canonical typed value tree produced by the column type system.

use crate::types::{JsonObject, JsonValue};
use base64::Engine as _;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use duckdb::types::Value as SqlValue;
use std::fmt;

/// Time format used when rendering times (microsecond precision)
pub(crate) const TIME_FORMAT: &str = "%H:%M:%S%.6f";

/// Timestamp format used when rendering timestamps without timezone
pub(crate) const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Date format
pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";

// ============================================================================
// Native Value
// ============================================================================

/// A field value as delivered by the source
#[derive(Debug, Clone, PartialEq)]
pub enum NativeValue {
    /// Value read from the database driver
    Sql(SqlValue),
    /// Pre-parsed structured node
    Json(JsonValue),
}

impl NativeValue {
    /// The null native value
    pub fn null() -> Self {
        NativeValue::Sql(SqlValue::Null)
    }

    /// Check whether the source reported null
    pub fn is_null(&self) -> bool {
        matches!(
            self,
            NativeValue::Sql(SqlValue::Null) | NativeValue::Json(JsonValue::Null)
        )
    }

    /// Borrow the driver value, if this is one
    pub fn as_sql(&self) -> Option<&SqlValue> {
        match self {
            NativeValue::Sql(v) => Some(v),
            NativeValue::Json(_) => None,
        }
    }

    /// Borrow the JSON node, if this is one
    pub fn as_json(&self) -> Option<&JsonValue> {
        match self {
            NativeValue::Json(v) => Some(v),
            NativeValue::Sql(_) => None,
        }
    }
}

impl fmt::Display for NativeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NativeValue::Sql(v) => write!(f, "{v:?}"),
            NativeValue::Json(v) => write!(f, "{v}"),
        }
    }
}

impl From<SqlValue> for NativeValue {
    fn from(value: SqlValue) -> Self {
        NativeValue::Sql(value)
    }
}

impl From<JsonValue> for NativeValue {
    fn from(value: JsonValue) -> Self {
        NativeValue::Json(value)
    }
}

impl From<i64> for NativeValue {
    fn from(value: i64) -> Self {
        NativeValue::Sql(SqlValue::BigInt(value))
    }
}

impl From<i32> for NativeValue {
    fn from(value: i32) -> Self {
        NativeValue::Sql(SqlValue::Int(value))
    }
}

impl From<f64> for NativeValue {
    fn from(value: f64) -> Self {
        NativeValue::Sql(SqlValue::Double(value))
    }
}

impl From<bool> for NativeValue {
    fn from(value: bool) -> Self {
        NativeValue::Sql(SqlValue::Boolean(value))
    }
}

impl From<&str> for NativeValue {
    fn from(value: &str) -> Self {
        NativeValue::Sql(SqlValue::Text(value.to_string()))
    }
}

impl From<String> for NativeValue {
    fn from(value: String) -> Self {
        NativeValue::Sql(SqlValue::Text(value))
    }
}

impl From<Vec<u8>> for NativeValue {
    fn from(value: Vec<u8>) -> Self {
        NativeValue::Sql(SqlValue::Blob(value))
    }
}

impl<T: Into<NativeValue>> From<Option<T>> for NativeValue {
    fn from(value: Option<T>) -> Self {
        value.map_or_else(NativeValue::null, Into::into)
    }
}

// ============================================================================
// Canonical Value Tree
// ============================================================================

/// A node in the canonical value tree
#[derive(Debug, Clone, PartialEq)]
pub enum ValueNode {
    Null,
    Boolean(bool),
    Integer(i128),
    Number(f64),
    String(String),
    Binary(Vec<u8>),
    Date(NaiveDate),
    TimeWithoutTz(NaiveTime),
    TimeWithTz {
        time: NaiveTime,
        offset: FixedOffset,
    },
    TimestampWithoutTz(NaiveDateTime),
    TimestampWithTz(DateTime<FixedOffset>),
    Array(Vec<ValueNode>),
    /// Generic structured (JSONB-like) value
    Object(JsonValue),
}

impl ValueNode {
    /// Check if this is the null node
    pub fn is_null(&self) -> bool {
        matches!(self, ValueNode::Null)
    }

    /// Render this node in its protocol (JSON) form
    pub fn to_json(&self) -> JsonValue {
        match self {
            ValueNode::Null => JsonValue::Null,
            ValueNode::Boolean(b) => JsonValue::Bool(*b),
            ValueNode::Integer(i) => match i64::try_from(*i) {
                Ok(small) => JsonValue::from(small),
                Err(_) => JsonValue::String(i.to_string()),
            },
            ValueNode::Number(n) => serde_json::Number::from_f64(*n)
                .map_or_else(|| JsonValue::String(n.to_string()), JsonValue::Number),
            ValueNode::String(s) => JsonValue::String(s.clone()),
            ValueNode::Binary(bytes) => {
                JsonValue::String(base64::engine::general_purpose::STANDARD.encode(bytes))
            }
            ValueNode::Date(d) => JsonValue::String(d.format(DATE_FORMAT).to_string()),
            ValueNode::TimeWithoutTz(t) => JsonValue::String(t.format(TIME_FORMAT).to_string()),
            ValueNode::TimeWithTz { time, offset } => {
                JsonValue::String(format!("{}{offset}", time.format(TIME_FORMAT)))
            }
            ValueNode::TimestampWithoutTz(ts) => {
                JsonValue::String(ts.format(TIMESTAMP_FORMAT).to_string())
            }
            ValueNode::TimestampWithTz(ts) => {
                JsonValue::String(ts.format("%Y-%m-%dT%H:%M:%S%.6f%:z").to_string())
            }
            ValueNode::Array(items) => JsonValue::Array(items.iter().map(Self::to_json).collect()),
            ValueNode::Object(v) => v.clone(),
        }
    }

    /// Length of this node's serialized JSON form, used for byte accounting
    pub fn serialized_len(&self) -> usize {
        serde_json::to_string(&self.to_json()).map_or(0, |s| s.len())
    }
}

/// Render a DuckDB value as JSON, recursing into nested values
pub fn sql_value_to_json(value: &SqlValue) -> JsonValue {
    match value {
        SqlValue::Null => JsonValue::Null,
        SqlValue::Boolean(b) => JsonValue::Bool(*b),
        SqlValue::TinyInt(i) => JsonValue::from(*i),
        SqlValue::SmallInt(i) => JsonValue::from(*i),
        SqlValue::Int(i) => JsonValue::from(*i),
        SqlValue::BigInt(i) => JsonValue::from(*i),
        SqlValue::HugeInt(i) => match i64::try_from(*i) {
            Ok(small) => JsonValue::from(small),
            Err(_) => JsonValue::String(i.to_string()),
        },
        SqlValue::UTinyInt(i) => JsonValue::from(*i),
        SqlValue::USmallInt(i) => JsonValue::from(*i),
        SqlValue::UInt(i) => JsonValue::from(*i),
        SqlValue::UBigInt(i) => JsonValue::from(*i),
        SqlValue::Float(f) => {
            serde_json::Number::from_f64(f64::from(*f)).map_or(JsonValue::Null, JsonValue::Number)
        }
        SqlValue::Double(f) => {
            serde_json::Number::from_f64(*f).map_or(JsonValue::Null, JsonValue::Number)
        }
        SqlValue::Decimal(d) => d
            .to_string()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map_or_else(|| JsonValue::String(d.to_string()), JsonValue::Number),
        SqlValue::Text(s) | SqlValue::Enum(s) => JsonValue::String(s.clone()),
        SqlValue::Blob(b) => {
            JsonValue::String(base64::engine::general_purpose::STANDARD.encode(b))
        }
        SqlValue::List(items) | SqlValue::Array(items) => {
            JsonValue::Array(items.iter().map(sql_value_to_json).collect())
        }
        SqlValue::Struct(fields) => {
            let obj: JsonObject = fields
                .iter()
                .map(|(k, v)| (k.clone(), sql_value_to_json(v)))
                .collect();
            JsonValue::Object(obj)
        }
        SqlValue::Map(entries) => {
            let obj: JsonObject = entries
                .iter()
                .map(|(k, v)| {
                    let key = match sql_value_to_json(k) {
                        JsonValue::String(s) => s,
                        other => other.to_string(),
                    };
                    (key, sql_value_to_json(v))
                })
                .collect();
            JsonValue::Object(obj)
        }
        SqlValue::Union(inner) => sql_value_to_json(inner),
        other => crate::schema::convert::temporal_to_string(other)
            .map_or_else(|| JsonValue::String(format!("{other:?}")), JsonValue::String),
    }
}
