//! Column discovery
//!
//! Maps DuckDB column type names, as reported by `DESCRIBE`, to the
//! JSON-schema-like descriptors the column type system resolves.

use crate::schema::{JsonSchema, JsonType, SchemaProperty};

/// Build a stream schema from `(column name, DuckDB type name)` pairs
pub fn schema_from_columns<'a>(columns: impl IntoIterator<Item = (&'a str, &'a str)>) -> JsonSchema {
    columns
        .into_iter()
        .fold(JsonSchema::new(), |schema, (name, type_name)| {
            schema.with_property(name, property_for_type(type_name))
        })
}

/// Column descriptor for one DuckDB type name; every column is nullable
pub fn property_for_type(type_name: &str) -> SchemaProperty {
    let upper = type_name.trim().to_ascii_uppercase();

    if let Some(item) = upper.strip_suffix("[]") {
        return nullable_array(property_for_type(item));
    }
    if let Some(open) = upper.rfind('[') {
        if upper.ends_with(']') && upper[open + 1..upper.len() - 1].chars().all(|c| c.is_ascii_digit()) {
            return nullable_array(property_for_type(&upper[..open]));
        }
    }

    let base = upper.split('(').next().unwrap_or_default().trim();
    match base {
        "BOOLEAN" | "BOOL" => SchemaProperty::nullable(JsonType::Boolean),
        "TINYINT" | "SMALLINT" | "INTEGER" | "INT" | "BIGINT" | "UTINYINT" | "USMALLINT"
        | "UINTEGER" => SchemaProperty::nullable(JsonType::Integer),
        "UBIGINT" | "HUGEINT" | "UHUGEINT" => {
            SchemaProperty::nullable(JsonType::Integer).with_airbyte_type("big_integer")
        }
        "FLOAT" | "REAL" | "DOUBLE" => SchemaProperty::nullable(JsonType::Number),
        "DECIMAL" | "NUMERIC" => {
            SchemaProperty::nullable(JsonType::Number).with_airbyte_type("big_number")
        }
        "VARCHAR" | "TEXT" | "STRING" | "UUID" | "ENUM" | "INTERVAL" => {
            SchemaProperty::nullable(JsonType::String)
        }
        "DATE" => SchemaProperty::nullable(JsonType::String).with_format("date"),
        "TIME" => SchemaProperty::nullable(JsonType::String)
            .with_format("time")
            .with_airbyte_type("time_without_timezone"),
        "TIME WITH TIME ZONE" | "TIMETZ" => SchemaProperty::nullable(JsonType::String)
            .with_format("time")
            .with_airbyte_type("time_with_timezone"),
        "TIMESTAMP" | "DATETIME" | "TIMESTAMP_S" | "TIMESTAMP_MS" | "TIMESTAMP_NS" => {
            SchemaProperty::nullable(JsonType::String)
                .with_format("date-time")
                .with_airbyte_type("timestamp_without_timezone")
        }
        "TIMESTAMP WITH TIME ZONE" | "TIMESTAMPTZ" => SchemaProperty::nullable(JsonType::String)
            .with_format("date-time")
            .with_airbyte_type("timestamp_with_timezone"),
        "BLOB" | "BYTEA" | "VARBINARY" => {
            SchemaProperty::nullable(JsonType::String).with_content_encoding("base64")
        }
        "STRUCT" | "MAP" | "UNION" | "JSON" => SchemaProperty::nullable(JsonType::Object),
        _ => SchemaProperty::default(),
    }
}

fn nullable_array(items: SchemaProperty) -> SchemaProperty {
    let mut property = SchemaProperty::nullable(JsonType::Array);
    property.items = Some(Box::new(items));
    property
}
