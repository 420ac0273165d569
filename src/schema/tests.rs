//! Column type system tests

use super::*;
use chrono::{NaiveDate, NaiveTime};
use duckdb::types::{TimeUnit, Value as SqlValue};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use test_case::test_case;

// ============================================================================
// Resolution Tests
// ============================================================================

#[test_case(SchemaProperty::new(JsonType::Number), LeafType::Number ; "bare number is floating point")]
#[test_case(SchemaProperty::new(JsonType::Integer), LeafType::Integer ; "bare integer")]
#[test_case(SchemaProperty::new(JsonType::Number).with_airbyte_type("integer"), LeafType::Integer ; "number with integer hint")]
#[test_case(SchemaProperty::new(JsonType::String).with_airbyte_type("big_integer"), LeafType::Integer ; "big integer hint wins over string")]
#[test_case(SchemaProperty::new(JsonType::Boolean), LeafType::Boolean ; "boolean")]
#[test_case(SchemaProperty::new(JsonType::String), LeafType::String ; "plain string")]
#[test_case(SchemaProperty::new(JsonType::String).with_format("date"), LeafType::Date ; "date format")]
#[test_case(SchemaProperty::new(JsonType::String).with_format("date-time"), LeafType::TimestampWithTimezone ; "date-time defaults to tz")]
#[test_case(SchemaProperty::new(JsonType::String).with_format("date-time").with_airbyte_type("timestamp_without_timezone"), LeafType::TimestampWithoutTimezone ; "date-time split by hint")]
#[test_case(SchemaProperty::new(JsonType::String).with_format("time"), LeafType::TimeWithoutTimezone ; "time defaults to no tz")]
#[test_case(SchemaProperty::new(JsonType::String).with_format("time").with_airbyte_type("time_with_timezone"), LeafType::TimeWithTimezone ; "time split by hint")]
#[test_case(SchemaProperty::new(JsonType::String).with_content_encoding("base64"), LeafType::Binary ; "base64 string is binary")]
#[test_case(SchemaProperty::new(JsonType::Object), LeafType::Jsonb ; "object is jsonb")]
#[test_case(SchemaProperty::default(), LeafType::Jsonb ; "missing type is jsonb")]
#[test_case(SchemaProperty::new(JsonType::Null), LeafType::Null ; "null type")]
#[test_case(SchemaProperty::nullable(JsonType::Integer), LeafType::Integer ; "nullable integer")]
fn test_resolve_leaf(schema: SchemaProperty, expected: LeafType) {
    assert_eq!(ColumnType::resolve(&schema), ColumnType::Leaf(expected));
}

#[test]
fn test_resolve_array_recurses_into_items() {
    let schema = SchemaProperty::array(SchemaProperty::new(JsonType::Integer));
    let resolved = ColumnType::resolve(&schema);
    assert_eq!(
        resolved,
        ColumnType::Array(Box::new(ColumnType::Leaf(LeafType::Integer)))
    );
    assert_eq!(resolved.to_string(), "array<integer>");
    assert_eq!(resolved.leaf(), LeafType::Integer);

    let nested = SchemaProperty::array(SchemaProperty::array(
        SchemaProperty::new(JsonType::String).with_format("date"),
    ));
    assert_eq!(
        ColumnType::resolve(&nested).to_string(),
        "array<array<date>>"
    );
}

#[test]
fn test_resolve_array_without_items_is_array_of_jsonb() {
    let schema: SchemaProperty = serde_json::from_value(json!({"type": "array"})).unwrap();
    assert_eq!(ColumnType::resolve(&schema).to_string(), "array<jsonb>");
}

#[test]
fn test_resolve_from_catalog_json() {
    let schema: JsonSchema = serde_json::from_value(json!({
        "properties": {
            "id": {"type": "number", "airbyte_type": "integer"},
            "payload": {"type": ["string", "null"], "contentEncoding": "base64"},
            "seen_at": {"type": "string", "format": "date-time"}
        }
    }))
    .unwrap();

    let resolve = |name: &str| ColumnType::resolve(schema.get_property(name).unwrap());
    assert_eq!(resolve("id"), LeafType::Integer.into());
    assert_eq!(resolve("payload"), LeafType::Binary.into());
    assert_eq!(resolve("seen_at"), LeafType::TimestampWithTimezone.into());
}

// ============================================================================
// Conversion Tests
// ============================================================================

#[test]
fn test_null_converts_to_null_for_every_type() {
    let nulls = [NativeValue::null(), NativeValue::Json(serde_json::Value::Null)];
    for leaf in LeafType::ALL {
        for null in &nulls {
            assert_eq!(ColumnType::Leaf(leaf).convert(null), Ok(ValueNode::Null));
            let array = ColumnType::Array(Box::new(ColumnType::Leaf(leaf)));
            assert_eq!(array.convert(null), Ok(ValueNode::Null));
        }
    }
}

#[test]
fn test_integer_accepts_every_width() {
    let integer = ColumnType::Leaf(LeafType::Integer);
    let inputs = [
        SqlValue::TinyInt(7),
        SqlValue::SmallInt(7),
        SqlValue::Int(7),
        SqlValue::BigInt(7),
        SqlValue::HugeInt(7),
        SqlValue::UTinyInt(7),
        SqlValue::USmallInt(7),
        SqlValue::UInt(7),
        SqlValue::UBigInt(7),
        SqlValue::Double(7.0),
        SqlValue::Text("7".to_string()),
    ];
    for input in inputs {
        assert_eq!(
            integer.convert(&NativeValue::Sql(input)),
            Ok(ValueNode::Integer(7))
        );
    }
    assert_eq!(
        integer.convert(&NativeValue::Json(json!(7))),
        Ok(ValueNode::Integer(7))
    );
    assert!(integer.convert(&NativeValue::from(3.5)).is_err());
}

#[test]
fn test_huge_integer_renders_as_string() {
    let node = ColumnType::Leaf(LeafType::Integer)
        .convert(&NativeValue::Sql(SqlValue::HugeInt(i128::MAX)))
        .unwrap();
    assert_eq!(node.to_json(), json!(i128::MAX.to_string()));
}

#[test]
fn test_number_is_floating_point() {
    let number = ColumnType::Leaf(LeafType::Number);
    assert_eq!(number.convert(&NativeValue::from(5_i64)), Ok(ValueNode::Number(5.0)));
    assert_eq!(
        number.convert(&NativeValue::Sql(SqlValue::Float(1.5))),
        Ok(ValueNode::Number(1.5))
    );
    assert_eq!(number.convert(&NativeValue::from("2.25")), Ok(ValueNode::Number(2.25)));
}

#[test]
fn test_boolean_encodes_true_and_false() {
    let boolean = ColumnType::Leaf(LeafType::Boolean);
    assert_eq!(boolean.convert(&NativeValue::from(true)), Ok(ValueNode::Boolean(true)));
    assert_eq!(boolean.convert(&NativeValue::from(false)), Ok(ValueNode::Boolean(false)));
    assert_eq!(boolean.convert(&NativeValue::from(0_i32)), Ok(ValueNode::Boolean(false)));
    assert_eq!(boolean.convert(&NativeValue::from("yes")), Ok(ValueNode::Boolean(true)));
    assert!(boolean.convert(&NativeValue::from("perhaps")).is_err());
}

#[test]
fn test_string_renders_non_text_values() {
    let string = ColumnType::Leaf(LeafType::String);
    assert_eq!(
        string.convert(&NativeValue::from("abc")),
        Ok(ValueNode::String("abc".to_string()))
    );
    assert_eq!(
        string.convert(&NativeValue::from(12_i64)),
        Ok(ValueNode::String("12".to_string()))
    );
}

#[test]
fn test_temporal_driver_values() {
    let micros = 1_700_000_000_000_000_i64;

    let node = ColumnType::Leaf(LeafType::TimestampWithTimezone)
        .convert(&NativeValue::Sql(SqlValue::Timestamp(TimeUnit::Microsecond, micros)))
        .unwrap();
    assert_eq!(node.to_json(), json!("2023-11-14T22:13:20.000000+00:00"));

    let node = ColumnType::Leaf(LeafType::TimestampWithoutTimezone)
        .convert(&NativeValue::Sql(SqlValue::Timestamp(TimeUnit::Millisecond, micros / 1000)))
        .unwrap();
    assert_eq!(node.to_json(), json!("2023-11-14T22:13:20.000000"));

    let node = ColumnType::Leaf(LeafType::Date)
        .convert(&NativeValue::Sql(SqlValue::Date32(19_675)))
        .unwrap();
    assert_eq!(node, ValueNode::Date(NaiveDate::from_ymd_opt(2023, 11, 14).unwrap()));

    let node = ColumnType::Leaf(LeafType::TimeWithoutTimezone)
        .convert(&NativeValue::Sql(SqlValue::Time64(TimeUnit::Microsecond, 45_296_000_000)))
        .unwrap();
    assert_eq!(node, ValueNode::TimeWithoutTz(NaiveTime::from_hms_opt(12, 34, 56).unwrap()));
}

#[test]
fn test_temporal_strings() {
    let node = ColumnType::Leaf(LeafType::TimestampWithTimezone)
        .convert(&NativeValue::from("2024-01-15T10:30:00+02:00"))
        .unwrap();
    assert_eq!(node.to_json(), json!("2024-01-15T10:30:00.000000+02:00"));

    let node = ColumnType::Leaf(LeafType::TimestampWithTimezone)
        .convert(&NativeValue::from("2024-01-15 10:30:00"))
        .unwrap();
    assert_eq!(node.to_json(), json!("2024-01-15T10:30:00.000000+00:00"));

    let node = ColumnType::Leaf(LeafType::TimeWithTimezone)
        .convert(&NativeValue::Json(json!("08:00:00-05:00")))
        .unwrap();
    assert_eq!(node.to_json(), json!("08:00:00.000000-05:00"));

    assert!(ColumnType::Leaf(LeafType::Date)
        .convert(&NativeValue::from("not a date"))
        .is_err());
}

#[test]
fn test_binary_from_blob_and_base64() {
    let binary = ColumnType::Leaf(LeafType::Binary);
    let node = binary.convert(&NativeValue::from(vec![1_u8, 2, 3])).unwrap();
    assert_eq!(node, ValueNode::Binary(vec![1, 2, 3]));
    assert_eq!(node.to_json(), json!("AQID"));

    assert_eq!(
        binary.convert(&NativeValue::Json(json!("AQID"))),
        Ok(ValueNode::Binary(vec![1, 2, 3]))
    );
    assert!(binary.convert(&NativeValue::Json(json!("!!"))).is_err());
}

#[test]
fn test_jsonb_accepts_structured_values() {
    let jsonb = ColumnType::Leaf(LeafType::Jsonb);
    assert_eq!(
        jsonb.convert(&NativeValue::Json(json!({"a": 1}))),
        Ok(ValueNode::Object(json!({"a": 1})))
    );
    assert_eq!(
        jsonb.convert(&NativeValue::from(r#"{"b": [1, 2]}"#)),
        Ok(ValueNode::Object(json!({"b": [1, 2]})))
    );
    assert_eq!(
        jsonb.convert(&NativeValue::from("plain")),
        Ok(ValueNode::Object(json!("plain")))
    );
    assert_eq!(
        jsonb.convert(&NativeValue::from("[1, 2]")),
        Ok(ValueNode::Object(json!([1, 2])))
    );
    assert_eq!(
        jsonb.convert(&NativeValue::Sql(SqlValue::List(vec![SqlValue::Int(1)]))),
        Ok(ValueNode::Object(json!([1])))
    );
}

#[test]
fn test_jsonb_keeps_scalar_text_as_string() {
    let jsonb = ColumnType::Leaf(LeafType::Jsonb);
    for text in ["null", "42", "true", "\"quoted\""] {
        assert_eq!(
            jsonb.convert(&NativeValue::from(text)),
            Ok(ValueNode::Object(json!(text))),
            "text {text:?}"
        );
    }
}

// ============================================================================
// Array Tests
// ============================================================================

fn array_of_integer() -> ColumnType {
    ColumnType::resolve(&SchemaProperty::array(SchemaProperty::new(JsonType::Integer)))
}

#[test]
fn test_array_of_integer_preserves_order() {
    let expected = ValueNode::Array(vec![
        ValueNode::Integer(1),
        ValueNode::Integer(2),
        ValueNode::Integer(3),
    ]);

    let from_json = NativeValue::Json(json!([1, 2, 3]));
    assert_eq!(array_of_integer().convert(&from_json), Ok(expected.clone()));

    let from_driver = NativeValue::Sql(SqlValue::List(vec![
        SqlValue::Int(1),
        SqlValue::Int(2),
        SqlValue::Int(3),
    ]));
    assert_eq!(array_of_integer().convert(&from_driver), Ok(expected.clone()));

    let from_text = NativeValue::from("[1,2,3]");
    assert_eq!(array_of_integer().convert(&from_text), Ok(expected));
}

#[test]
fn test_array_empty_and_null() {
    assert_eq!(
        array_of_integer().convert(&NativeValue::Json(json!([]))),
        Ok(ValueNode::Array(vec![]))
    );
    assert_eq!(
        array_of_integer().convert(&NativeValue::null()),
        Ok(ValueNode::Null)
    );
}

#[test]
fn test_array_with_null_elements() {
    assert_eq!(
        array_of_integer().convert(&NativeValue::Json(json!([1, null]))),
        Ok(ValueNode::Array(vec![ValueNode::Integer(1), ValueNode::Null]))
    );
}

#[test]
fn test_array_rejects_scalars() {
    assert!(array_of_integer().convert(&NativeValue::from(5_i64)).is_err());
}

// ============================================================================
// Extension Tests
// ============================================================================

#[test]
fn test_registered_handler_delegates_on_mismatch() {
    let mut registry = ConverterRegistry::new();
    registry.register(LeafType::Integer, |value| match value.as_sql() {
        Some(SqlValue::Text(s)) if s == "one" => Some(Ok(ValueNode::Integer(1))),
        _ => None,
    });
    let integer = ColumnType::Leaf(LeafType::Integer);

    assert_eq!(
        integer.convert_with(&registry, &NativeValue::from("one")),
        Ok(ValueNode::Integer(1))
    );
    assert_eq!(
        integer.convert_with(&registry, &NativeValue::from("2")),
        Ok(ValueNode::Integer(2))
    );
    assert!(integer.convert(&NativeValue::from("one")).is_err());
}

#[test]
fn test_handlers_tried_in_registration_order() {
    let mut registry = ConverterRegistry::new();
    registry
        .register(LeafType::String, |_| Some(Ok(ValueNode::String("first".to_string()))))
        .register(LeafType::String, |_| Some(Ok(ValueNode::String("second".to_string()))));

    assert_eq!(registry.handler_count(LeafType::String), 2);
    assert_eq!(
        registry.convert_leaf(LeafType::String, &NativeValue::from("x")),
        Ok(ValueNode::String("first".to_string()))
    );
}

#[test]
fn test_handlers_never_see_null() {
    let mut registry = ConverterRegistry::new();
    registry.register(LeafType::Boolean, |_| Some(Err("should not run".to_string())));
    assert_eq!(
        registry.convert_leaf(LeafType::Boolean, &NativeValue::null()),
        Ok(ValueNode::Null)
    );
}

#[test]
fn test_array_iterator_override() {
    let mut registry = ConverterRegistry::new();
    registry.register_array_iterator(|value| match value.as_sql() {
        Some(SqlValue::Text(s)) if s.starts_with('{') => Some(
            s.trim_matches(|c| c == '{' || c == '}')
                .split(',')
                .map(|part| NativeValue::from(part.trim()))
                .collect(),
        ),
        _ => None,
    });

    assert_eq!(
        array_of_integer().convert_with(&registry, &NativeValue::from("{4, 5}")),
        Ok(ValueNode::Array(vec![ValueNode::Integer(4), ValueNode::Integer(5)]))
    );
    assert_eq!(
        array_of_integer().convert_with(&registry, &NativeValue::Json(json!([6]))),
        Ok(ValueNode::Array(vec![ValueNode::Integer(6)]))
    );
}

#[test]
fn test_column_converter_wraps_failure() {
    let converter = ColumnConverter::new(
        "age",
        LeafType::Integer.into(),
        ConverterRegistry::builtin(),
    );
    let err = converter.convert(&NativeValue::from("abc")).unwrap_err();
    match err {
        crate::Error::Conversion {
            column,
            value,
            declared_type,
            ..
        } => {
            assert_eq!(column, "age");
            assert!(value.contains("abc"));
            assert_eq!(declared_type, "integer");
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(converter.convert(&NativeValue::from(3_i64)).unwrap(), ValueNode::Integer(3));
}

#[test]
fn test_builtin_registry_is_shared() {
    assert!(Arc::ptr_eq(
        &ConverterRegistry::builtin(),
        &ConverterRegistry::builtin()
    ));
}

#[test]
fn test_json_schema_to_json() {
    let schema = JsonSchema::new().with_property("id", SchemaProperty::new(JsonType::Integer));
    assert_eq!(
        schema.to_json(),
        json!({"type": "object", "properties": {"id": {"type": "integer"}}})
    );
}
