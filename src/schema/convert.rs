//! Built-in native value conversions
//!
//! One conversion function per [`LeafType`]. Each accepts DuckDB values of
//! any width or temporal unit as well as pre-parsed JSON nodes. Null input is
//! handled by the registry before these functions are reached.

use super::column_type::LeafType;
use super::value::{sql_value_to_json, NativeValue, ValueNode, DATE_FORMAT, TIME_FORMAT};
use crate::types::JsonValue;
use base64::Engine as _;
use chrono::{
    DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc,
};
use duckdb::types::{Decimal, TimeUnit, Value as SqlValue};

/// Outcome of a single conversion; the error is a human-readable reason
pub type ConvertResult = std::result::Result<ValueNode, String>;

/// Days from 0001-01-01 (CE day 1) to 1970-01-01
pub(crate) const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Convert a non-null native value with the built-in function for `leaf`
pub fn convert_builtin(leaf: LeafType, value: &NativeValue) -> ConvertResult {
    match leaf {
        LeafType::Boolean => to_boolean(value),
        LeafType::String => Ok(ValueNode::String(to_text(value))),
        LeafType::Number => to_number(value),
        LeafType::Integer => to_integer(value),
        LeafType::Date => to_date(value),
        LeafType::TimeWithTimezone => to_time_with_tz(value),
        LeafType::TimeWithoutTimezone => to_time_without_tz(value),
        LeafType::TimestampWithTimezone => to_timestamp_with_tz(value),
        LeafType::TimestampWithoutTimezone => to_timestamp_without_tz(value),
        LeafType::Binary => to_binary(value),
        LeafType::Jsonb => Ok(to_jsonb(value)),
        LeafType::Null => Ok(ValueNode::Null),
    }
}

/// Built-in iteration of array-like native values
///
/// Returns `None` when the value is not iterable.
pub fn iterate_builtin(value: &NativeValue) -> Option<Vec<NativeValue>> {
    match value {
        NativeValue::Sql(SqlValue::List(items) | SqlValue::Array(items)) => {
            Some(items.iter().cloned().map(NativeValue::Sql).collect())
        }
        NativeValue::Json(JsonValue::Array(items)) => {
            Some(items.iter().cloned().map(NativeValue::Json).collect())
        }
        NativeValue::Sql(SqlValue::Text(s)) => match serde_json::from_str::<JsonValue>(s) {
            Ok(JsonValue::Array(items)) => Some(items.into_iter().map(NativeValue::Json).collect()),
            _ => None,
        },
        _ => None,
    }
}

// ============================================================================
// Scalars
// ============================================================================

fn to_boolean(value: &NativeValue) -> ConvertResult {
    let parsed = match value {
        NativeValue::Sql(SqlValue::Boolean(b)) | NativeValue::Json(JsonValue::Bool(b)) => Some(*b),
        NativeValue::Sql(SqlValue::Text(s)) | NativeValue::Json(JsonValue::String(s)) => {
            parse_bool(s)
        }
        NativeValue::Json(JsonValue::Number(n)) => n.as_i64().map(|i| i != 0),
        NativeValue::Sql(v) => sql_integer(v).map(|i| i != 0),
        NativeValue::Json(_) => None,
    };
    parsed
        .map(ValueNode::Boolean)
        .ok_or_else(|| "not a boolean".to_string())
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "on" | "1" => Some(true),
        "false" | "f" | "no" | "n" | "off" | "0" => Some(false),
        _ => None,
    }
}

fn to_text(value: &NativeValue) -> String {
    match value {
        NativeValue::Sql(SqlValue::Text(s) | SqlValue::Enum(s))
        | NativeValue::Json(JsonValue::String(s)) => s.clone(),
        NativeValue::Json(other) => other.to_string(),
        NativeValue::Sql(other) => match sql_value_to_json(other) {
            JsonValue::String(s) => s,
            json => json.to_string(),
        },
    }
}

/// Integer view of any integer-width driver value
fn sql_integer(value: &SqlValue) -> Option<i128> {
    match value {
        SqlValue::TinyInt(i) => Some(i128::from(*i)),
        SqlValue::SmallInt(i) => Some(i128::from(*i)),
        SqlValue::Int(i) => Some(i128::from(*i)),
        SqlValue::BigInt(i) => Some(i128::from(*i)),
        SqlValue::HugeInt(i) => Some(*i),
        SqlValue::UTinyInt(i) => Some(i128::from(*i)),
        SqlValue::USmallInt(i) => Some(i128::from(*i)),
        SqlValue::UInt(i) => Some(i128::from(*i)),
        SqlValue::UBigInt(i) => Some(i128::from(*i)),
        _ => None,
    }
}

#[allow(clippy::cast_precision_loss)]
fn to_number(value: &NativeValue) -> ConvertResult {
    let parsed = match value {
        NativeValue::Sql(SqlValue::Float(f)) => Some(f64::from(*f)),
        NativeValue::Sql(SqlValue::Double(f)) => Some(*f),
        NativeValue::Sql(SqlValue::Decimal(d)) => d.to_string().parse::<f64>().ok(),
        NativeValue::Sql(SqlValue::Text(s)) | NativeValue::Json(JsonValue::String(s)) => {
            s.trim().parse::<f64>().ok()
        }
        NativeValue::Json(JsonValue::Number(n)) => n.as_f64(),
        NativeValue::Sql(v) => sql_integer(v).map(|i| i as f64),
        NativeValue::Json(_) => None,
    };
    parsed
        .map(ValueNode::Number)
        .ok_or_else(|| "not a number".to_string())
}

#[allow(clippy::cast_possible_truncation)]
fn to_integer(value: &NativeValue) -> ConvertResult {
    let integral_float = |f: f64| (f.is_finite() && f.fract() == 0.0).then_some(f as i128);
    let parsed = match value {
        NativeValue::Sql(SqlValue::Float(f)) => integral_float(f64::from(*f)),
        NativeValue::Sql(SqlValue::Double(f)) => integral_float(*f),
        NativeValue::Sql(SqlValue::Decimal(d)) => decimal_integer(*d),
        NativeValue::Sql(SqlValue::Boolean(b)) => Some(i128::from(*b)),
        NativeValue::Sql(SqlValue::Text(s)) | NativeValue::Json(JsonValue::String(s)) => {
            s.trim().parse::<i128>().ok()
        }
        NativeValue::Json(JsonValue::Number(n)) => n
            .as_i64()
            .map(i128::from)
            .or_else(|| n.as_u64().map(i128::from))
            .or_else(|| n.as_f64().and_then(integral_float)),
        NativeValue::Sql(v) => sql_integer(v),
        NativeValue::Json(_) => None,
    };
    parsed
        .map(ValueNode::Integer)
        .ok_or_else(|| "not an integer".to_string())
}

/// Integral value of a decimal, `None` when it has a fractional part
fn decimal_integer(d: Decimal) -> Option<i128> {
    let divisor = 10_i128.checked_pow(u32::from(d.scale()))?;
    (d.value() % divisor == 0).then(|| d.value() / divisor)
}

fn to_binary(value: &NativeValue) -> ConvertResult {
    match value {
        NativeValue::Sql(SqlValue::Blob(bytes)) => Ok(ValueNode::Binary(bytes.clone())),
        NativeValue::Sql(SqlValue::Text(s)) => Ok(ValueNode::Binary(s.as_bytes().to_vec())),
        NativeValue::Json(JsonValue::String(s)) => base64::engine::general_purpose::STANDARD
            .decode(s)
            .map(ValueNode::Binary)
            .map_err(|e| format!("invalid base64: {e}")),
        _ => Err("not binary data".to_string()),
    }
}

fn to_jsonb(value: &NativeValue) -> ValueNode {
    match value {
        NativeValue::Json(v) => ValueNode::Object(v.clone()),
        NativeValue::Sql(SqlValue::Text(s)) => ValueNode::Object(
            serde_json::from_str(s)
                .ok()
                .filter(|v: &JsonValue| v.is_object() || v.is_array())
                .unwrap_or_else(|| JsonValue::String(s.clone())),
        ),
        NativeValue::Sql(v) => ValueNode::Object(sql_value_to_json(v)),
    }
}

// ============================================================================
// Temporal
// ============================================================================

fn unit_to_micros(unit: TimeUnit, value: i64) -> i64 {
    match unit {
        TimeUnit::Second => value.saturating_mul(1_000_000),
        TimeUnit::Millisecond => value.saturating_mul(1_000),
        TimeUnit::Microsecond => value,
        TimeUnit::Nanosecond => value / 1_000,
    }
}

pub(crate) fn timestamp_from_unit(unit: TimeUnit, value: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_micros(unit_to_micros(unit, value)).map(|dt| dt.naive_utc())
}

pub(crate) fn date_from_days(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)?)
}

#[allow(clippy::cast_possible_truncation)]
pub(crate) fn time_from_unit(unit: TimeUnit, value: i64) -> Option<NaiveTime> {
    let micros = unit_to_micros(unit, value);
    let secs = u32::try_from(micros.div_euclid(1_000_000)).ok()?;
    let nanos = (micros.rem_euclid(1_000_000) * 1_000) as u32;
    NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos)
}

fn utc_offset() -> FixedOffset {
    Utc.fix()
}

/// ISO-like string for DuckDB temporal values, `None` for other values
pub(crate) fn temporal_to_string(value: &SqlValue) -> Option<String> {
    match value {
        SqlValue::Timestamp(unit, v) => timestamp_from_unit(*unit, *v)
            .map(|ts| ts.format(super::value::TIMESTAMP_FORMAT).to_string()),
        SqlValue::Date32(d) => date_from_days(*d).map(|d| d.format(DATE_FORMAT).to_string()),
        SqlValue::Time64(unit, v) => {
            time_from_unit(*unit, *v).map(|t| t.format(TIME_FORMAT).to_string())
        }
        _ => None,
    }
}

fn text_of(value: &NativeValue) -> Option<&str> {
    match value {
        NativeValue::Sql(SqlValue::Text(s)) | NativeValue::Json(JsonValue::String(s)) => {
            Some(s.trim())
        }
        _ => None,
    }
}

const NAIVE_TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

fn parse_naive_timestamp(s: &str) -> Option<NaiveDateTime> {
    NAIVE_TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, DATE_FORMAT)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn parse_tz_timestamp(s: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .or_else(|| DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%#z").ok())
        .or_else(|| DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%#z").ok())
}

fn parse_naive_time(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M:%S%.f")
        .ok()
        .or_else(|| NaiveTime::parse_from_str(s, "%H:%M").ok())
}

fn parse_tz_time(s: &str) -> Option<(NaiveTime, FixedOffset)> {
    let normalized = match s.strip_suffix('Z') {
        Some(rest) => format!("{rest}+00:00"),
        None => s.to_string(),
    };
    DateTime::parse_from_str(&format!("1970-01-01 {normalized}"), "%Y-%m-%d %H:%M:%S%.f%#z")
        .ok()
        .map(|dt| (dt.time(), *dt.offset()))
}

fn to_date(value: &NativeValue) -> ConvertResult {
    let parsed = match value {
        NativeValue::Sql(SqlValue::Date32(d)) => date_from_days(*d),
        NativeValue::Sql(SqlValue::Timestamp(unit, v)) => {
            timestamp_from_unit(*unit, *v).map(|ts| ts.date())
        }
        other => text_of(other).and_then(|s| {
            NaiveDate::parse_from_str(s, DATE_FORMAT)
                .ok()
                .or_else(|| parse_naive_timestamp(s).map(|ts| ts.date()))
                .or_else(|| parse_tz_timestamp(s).map(|ts| ts.date_naive()))
        }),
    };
    parsed
        .map(ValueNode::Date)
        .ok_or_else(|| "not a date".to_string())
}

fn to_time_without_tz(value: &NativeValue) -> ConvertResult {
    let parsed = match value {
        NativeValue::Sql(SqlValue::Time64(unit, v)) => time_from_unit(*unit, *v),
        NativeValue::Sql(SqlValue::Timestamp(unit, v)) => {
            timestamp_from_unit(*unit, *v).map(|ts| ts.time())
        }
        other => text_of(other).and_then(|s| {
            parse_naive_time(s).or_else(|| parse_tz_time(s).map(|(time, _)| time))
        }),
    };
    parsed
        .map(ValueNode::TimeWithoutTz)
        .ok_or_else(|| "not a time".to_string())
}

fn to_time_with_tz(value: &NativeValue) -> ConvertResult {
    let parsed = match value {
        NativeValue::Sql(SqlValue::Time64(unit, v)) => {
            time_from_unit(*unit, *v).map(|t| (t, utc_offset()))
        }
        other => text_of(other).and_then(|s| {
            parse_tz_time(s).or_else(|| parse_naive_time(s).map(|t| (t, utc_offset())))
        }),
    };
    parsed
        .map(|(time, offset)| ValueNode::TimeWithTz { time, offset })
        .ok_or_else(|| "not a time with timezone".to_string())
}

fn to_timestamp_without_tz(value: &NativeValue) -> ConvertResult {
    let parsed = match value {
        NativeValue::Sql(SqlValue::Timestamp(unit, v)) => timestamp_from_unit(*unit, *v),
        NativeValue::Sql(SqlValue::Date32(d)) => {
            date_from_days(*d).and_then(|d| d.and_hms_opt(0, 0, 0))
        }
        other => text_of(other).and_then(|s| {
            parse_naive_timestamp(s).or_else(|| parse_tz_timestamp(s).map(|ts| ts.naive_local()))
        }),
    };
    parsed
        .map(ValueNode::TimestampWithoutTz)
        .ok_or_else(|| "not a timestamp".to_string())
}

fn to_timestamp_with_tz(value: &NativeValue) -> ConvertResult {
    let utc = utc_offset();
    let parsed = match value {
        NativeValue::Sql(SqlValue::Timestamp(unit, v)) => {
            timestamp_from_unit(*unit, *v).map(|ts| utc.from_utc_datetime(&ts))
        }
        NativeValue::Sql(SqlValue::Date32(d)) => date_from_days(*d)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|ts| utc.from_utc_datetime(&ts)),
        other => text_of(other).and_then(|s| {
            parse_tz_timestamp(s)
                .or_else(|| parse_naive_timestamp(s).map(|ts| utc.from_utc_datetime(&ts)))
        }),
    };
    parsed
        .map(ValueNode::TimestampWithTz)
        .ok_or_else(|| "not a timestamp with timezone".to_string())
}
