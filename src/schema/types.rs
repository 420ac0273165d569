//! Column schema types
//!
//! JSON-schema-like descriptors for stream columns, as found in a catalog.
//! A descriptor carries a declared type, an optional `format`, an optional
//! semantic hint (`airbyte_type`), and for arrays a nested `items` schema.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// JSON Schema type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonType {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
    Null,
}

impl std::fmt::Display for JsonType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JsonType::String => write!(f, "string"),
            JsonType::Number => write!(f, "number"),
            JsonType::Integer => write!(f, "integer"),
            JsonType::Boolean => write!(f, "boolean"),
            JsonType::Object => write!(f, "object"),
            JsonType::Array => write!(f, "array"),
            JsonType::Null => write!(f, "null"),
        }
    }
}

/// JSON type can be a single type or array of types (for nullable)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonTypeOrArray {
    Single(JsonType),
    Multiple(Vec<JsonType>),
}

impl JsonTypeOrArray {
    /// Check if this type is nullable
    pub fn is_nullable(&self) -> bool {
        match self {
            JsonTypeOrArray::Single(t) => *t == JsonType::Null,
            JsonTypeOrArray::Multiple(types) => types.contains(&JsonType::Null),
        }
    }

    /// Get the primary (non-null) type
    ///
    /// A bare `null` type is its own primary type.
    pub fn primary_type(&self) -> Option<JsonType> {
        match self {
            JsonTypeOrArray::Single(t) => Some(*t),
            JsonTypeOrArray::Multiple(types) => types
                .iter()
                .find(|t| **t != JsonType::Null)
                .or_else(|| types.first())
                .copied(),
        }
    }
}

/// Schema of a single column
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaProperty {
    /// Declared type(s)
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub json_type: Option<JsonTypeOrArray>,

    /// Format hint (`date`, `date-time`, `time`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    /// Semantic hint, e.g. `big_integer` or `timestamp_with_timezone`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub airbyte_type: Option<String>,

    /// Content encoding of string values (`base64` for binary)
    #[serde(
        rename = "contentEncoding",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub content_encoding: Option<String>,

    /// Array items schema
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<SchemaProperty>>,

    /// Description (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl SchemaProperty {
    /// Create a property with a single declared type
    pub fn new(json_type: JsonType) -> Self {
        Self {
            json_type: Some(JsonTypeOrArray::Single(json_type)),
            ..Self::default()
        }
    }

    /// Create a nullable property (`["<type>", "null"]`)
    pub fn nullable(json_type: JsonType) -> Self {
        let types = if json_type == JsonType::Null {
            JsonTypeOrArray::Single(JsonType::Null)
        } else {
            JsonTypeOrArray::Multiple(vec![json_type, JsonType::Null])
        };
        Self {
            json_type: Some(types),
            ..Self::default()
        }
    }

    /// Create an array property with item schema
    pub fn array(items: SchemaProperty) -> Self {
        Self {
            json_type: Some(JsonTypeOrArray::Single(JsonType::Array)),
            items: Some(Box::new(items)),
            ..Self::default()
        }
    }

    /// Set format hint
    #[must_use]
    pub fn with_format(mut self, format: &str) -> Self {
        self.format = Some(format.to_string());
        self
    }

    /// Set semantic type hint
    #[must_use]
    pub fn with_airbyte_type(mut self, airbyte_type: &str) -> Self {
        self.airbyte_type = Some(airbyte_type.to_string());
        self
    }

    /// Set content encoding
    #[must_use]
    pub fn with_content_encoding(mut self, encoding: &str) -> Self {
        self.content_encoding = Some(encoding.to_string());
        self
    }

    /// Primary (non-null) declared type, if any
    pub fn primary_type(&self) -> Option<JsonType> {
        self.json_type.as_ref().and_then(JsonTypeOrArray::primary_type)
    }
}

/// Full JSON Schema document for a stream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JsonSchema {
    /// Column schemas keyed by column name
    #[serde(default)]
    pub properties: BTreeMap<String, SchemaProperty>,
}

impl JsonSchema {
    /// Create a new empty schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a property
    pub fn add_property(&mut self, name: &str, property: SchemaProperty) {
        self.properties.insert(name.to_string(), property);
    }

    /// Builder-style variant of [`JsonSchema::add_property`]
    #[must_use]
    pub fn with_property(mut self, name: &str, property: SchemaProperty) -> Self {
        self.add_property(name, property);
        self
    }

    /// Get a property
    pub fn get_property(&self, name: &str) -> Option<&SchemaProperty> {
        self.properties.get(name)
    }

    /// Convert to JSON value
    pub fn to_json(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(obj) = value.as_object_mut() {
            obj.insert("type".to_string(), serde_json::json!("object"));
        }
        value
    }
}
