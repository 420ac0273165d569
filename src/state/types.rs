//! Scan state types
//!
//! A [`ScanState`] records how far extraction of one stream has progressed.
//! It is the only artifact a scan produces about progress, and it is
//! serialized to JSON and persisted by the caller between runs.

use crate::error::{Error, Result};
use crate::schema::convert::{
    date_from_days, time_from_unit, timestamp_from_unit, UNIX_EPOCH_DAYS_FROM_CE,
};
use crate::schema::NativeValue;
use crate::types::JsonValue;
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use duckdb::types::{Decimal, TimeUnit, Value as SqlValue};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ============================================================================
// Cursor Values
// ============================================================================

/// One comparable, serializable element of a composite cursor key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CursorValue {
    Boolean(bool),
    Integer(i64),
    /// Integers outside the `i64` range, serialized as a decimal string
    BigInteger(#[serde(with = "big_integer")] i128),
    /// Fixed-point numbers, serialized as their decimal text
    #[serde(with = "decimal_text")]
    Decimal(Decimal),
    Text(String),
    Date(NaiveDate),
    Time(NaiveTime),
    /// Timestamps; zoned driver values arrive already normalized to UTC
    Timestamp(NaiveDateTime),
}

mod big_integer {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &i128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i128, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

mod decimal_text {
    use duckdb::types::Decimal;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Decimal, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Decimal, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse(&s).ok_or_else(|| serde::de::Error::custom(format!("invalid decimal '{s}'")))
    }

    /// Parse `[-]digits[.digits]` keeping the scale of the written fraction
    pub(super) fn parse(s: &str) -> Option<Decimal> {
        let (negative, unsigned) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
        if whole.is_empty() || !whole.bytes().chain(fraction.bytes()).all(|b| b.is_ascii_digit()) {
            return None;
        }
        let scale = u8::try_from(fraction.len()).ok()?;
        let magnitude: i128 = format!("{whole}{fraction}").parse().ok()?;
        let value = if negative { -magnitude } else { magnitude };
        Decimal::new(Decimal::MAX_WIDTH, scale, value).ok()
    }
}

impl CursorValue {
    /// Read a cursor value from a native value
    ///
    /// Null is a [`Error::NullCursor`]; floats, blobs and nested values are
    /// not usable as a resume point and yield [`Error::InvalidState`].
    pub fn from_native(value: &NativeValue, stream: &str, column: &str) -> Result<Self> {
        if value.is_null() {
            return Err(Error::NullCursor {
                stream: stream.to_string(),
                column: column.to_string(),
            });
        }
        let cursor = match value {
            NativeValue::Sql(sql) => Self::from_sql(sql),
            NativeValue::Json(json) => Self::from_json(json),
        };
        cursor.ok_or_else(|| {
            Error::invalid_state(format!(
                "cursor column '{column}' of stream '{stream}' holds a non-comparable value {value}"
            ))
        })
    }

    fn from_sql(value: &SqlValue) -> Option<Self> {
        let cursor = match value {
            SqlValue::Boolean(b) => CursorValue::Boolean(*b),
            SqlValue::TinyInt(i) => CursorValue::Integer(i64::from(*i)),
            SqlValue::SmallInt(i) => CursorValue::Integer(i64::from(*i)),
            SqlValue::Int(i) => CursorValue::Integer(i64::from(*i)),
            SqlValue::BigInt(i) => CursorValue::Integer(*i),
            SqlValue::UTinyInt(i) => CursorValue::Integer(i64::from(*i)),
            SqlValue::USmallInt(i) => CursorValue::Integer(i64::from(*i)),
            SqlValue::UInt(i) => CursorValue::Integer(i64::from(*i)),
            SqlValue::UBigInt(i) => Self::integer(i128::from(*i)),
            SqlValue::HugeInt(i) => Self::integer(*i),
            SqlValue::Decimal(d) => CursorValue::Decimal(*d),
            SqlValue::Text(s) | SqlValue::Enum(s) => CursorValue::Text(s.clone()),
            SqlValue::Date32(d) => CursorValue::Date(date_from_days(*d)?),
            SqlValue::Time64(unit, t) => CursorValue::Time(time_from_unit(*unit, *t)?),
            SqlValue::Timestamp(unit, ts) => CursorValue::Timestamp(timestamp_from_unit(*unit, *ts)?),
            _ => return None,
        };
        Some(cursor)
    }

    fn from_json(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::Bool(b) => Some(CursorValue::Boolean(*b)),
            JsonValue::Number(n) => n
                .as_i64()
                .map(CursorValue::Integer)
                .or_else(|| n.as_u64().map(|u| Self::integer(i128::from(u)))),
            JsonValue::String(s) => Some(CursorValue::Text(s.clone())),
            _ => None,
        }
    }

    fn integer(value: i128) -> Self {
        i64::try_from(value).map_or(CursorValue::BigInteger(value), CursorValue::Integer)
    }

    /// Driver value used to bind this cursor value as a query parameter
    pub fn to_sql_value(&self) -> SqlValue {
        match self {
            CursorValue::Boolean(b) => SqlValue::Boolean(*b),
            CursorValue::Integer(i) => SqlValue::BigInt(*i),
            CursorValue::BigInteger(i) => SqlValue::HugeInt(*i),
            CursorValue::Decimal(d) => SqlValue::Decimal(*d),
            CursorValue::Text(s) => SqlValue::Text(s.clone()),
            CursorValue::Date(d) => SqlValue::Date32(d.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE),
            CursorValue::Time(t) => SqlValue::Time64(
                TimeUnit::Microsecond,
                i64::from(t.num_seconds_from_midnight()) * 1_000_000
                    + i64::from(t.nanosecond() / 1_000),
            ),
            CursorValue::Timestamp(ts) => {
                SqlValue::Timestamp(TimeUnit::Microsecond, ts.and_utc().timestamp_micros())
            }
        }
    }
}

impl fmt::Display for CursorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CursorValue::Boolean(b) => write!(f, "{b}"),
            CursorValue::Integer(i) => write!(f, "{i}"),
            CursorValue::BigInteger(i) => write!(f, "{i}"),
            CursorValue::Decimal(d) => write!(f, "{d}"),
            CursorValue::Text(s) => write!(f, "{s:?}"),
            CursorValue::Date(d) => write!(f, "{d}"),
            CursorValue::Time(t) => write!(f, "{t}"),
            CursorValue::Timestamp(ts) => write!(f, "{ts}"),
        }
    }
}

// ============================================================================
// Scan State
// ============================================================================

/// Phase of a scan state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanPhase {
    NotStarted,
    Ongoing,
    Done,
}

impl fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanPhase::NotStarted => write!(f, "not_started"),
            ScanPhase::Ongoing => write!(f, "ongoing"),
            ScanPhase::Done => write!(f, "done"),
        }
    }
}

/// Progress of extraction for one stream
///
/// Only `Ongoing` carries a cursor key, and that key is never empty.
/// Equality is strict: phases must match and, for `Ongoing`, keys must match
/// element for element. No ordering is defined between states.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum ScanState {
    #[default]
    NotStarted,
    Ongoing {
        cursor_key: Vec<CursorValue>,
    },
    Done,
}

impl ScanState {
    /// Create an ongoing state, rejecting an empty key
    pub fn ongoing(cursor_key: Vec<CursorValue>) -> Result<Self> {
        if cursor_key.is_empty() {
            return Err(Error::invalid_state("an ongoing state needs a non-empty cursor key"));
        }
        Ok(ScanState::Ongoing { cursor_key })
    }

    /// Phase of this state
    pub fn phase(&self) -> ScanPhase {
        match self {
            ScanState::NotStarted => ScanPhase::NotStarted,
            ScanState::Ongoing { .. } => ScanPhase::Ongoing,
            ScanState::Done => ScanPhase::Done,
        }
    }

    /// Cursor key, empty unless ongoing
    pub fn cursor_key(&self) -> &[CursorValue] {
        match self {
            ScanState::Ongoing { cursor_key } => cursor_key,
            ScanState::NotStarted | ScanState::Done => &[],
        }
    }

    /// Check if no further scans are needed
    pub fn is_done(&self) -> bool {
        matches!(self, ScanState::Done)
    }

    /// Check if both states resume from the same key
    ///
    /// `NotStarted` and `Done` both carry an empty key and compare equal here,
    /// even though they schedule differently.
    pub fn same_cursor_key(&self, other: &Self) -> bool {
        self.cursor_key() == other.cursor_key()
    }

    /// Check the state against the configured number of cursor columns
    pub fn validate(&self, cursor_columns: usize) -> Result<()> {
        match self {
            ScanState::Ongoing { cursor_key } if cursor_key.is_empty() => Err(
                Error::invalid_state("an ongoing state needs a non-empty cursor key"),
            ),
            ScanState::Ongoing { cursor_key } if cursor_key.len() != cursor_columns => {
                Err(Error::invalid_state(format!(
                    "cursor key has {} values but {cursor_columns} cursor columns are configured",
                    cursor_key.len()
                )))
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanState::Ongoing { cursor_key } => {
                let values: Vec<String> = cursor_key.iter().map(ToString::to_string).collect();
                write!(f, "ongoing({})", values.join(", "))
            }
            other => write!(f, "{}", other.phase()),
        }
    }
}

// ============================================================================
// Persisted Document
// ============================================================================

/// Persisted scan states of every stream, keyed by stream state key
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncState {
    #[serde(default)]
    pub streams: HashMap<String, ScanState>,
}

impl SyncState {
    /// Create an empty document
    pub fn new() -> Self {
        Self::default()
    }

    /// State of a stream, `NotStarted` if unknown
    pub fn get(&self, stream: &str) -> ScanState {
        self.streams.get(stream).cloned().unwrap_or_default()
    }

    /// Record the state of a stream
    pub fn set(&mut self, stream: &str, state: ScanState) {
        self.streams.insert(stream.to_string(), state);
    }

    /// Forget a stream
    pub fn remove(&mut self, stream: &str) -> Option<ScanState> {
        self.streams.remove(stream)
    }
}
