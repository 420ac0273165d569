//! Column type system
//!
//! Resolves a column's JSON-schema-like descriptor to a [`ColumnType`] and
//! converts native source values into the canonical [`ValueNode`] tree.
//!
//! # Features
//!
//! - **Resolution**: declared type, format, semantic hint, content encoding
//! - **Leaf Conversions**: one built-in conversion per [`LeafType`]
//! - **Arrays**: element-wise conversion, recursively, preserving order
//! - **Extension**: per-leaf handlers and array iterators in a [`ConverterRegistry`]
//!
//! Null input always converts to [`ValueNode::Null`].

mod column_type;
pub(crate) mod convert;
mod registry;
mod types;
mod value;

pub use column_type::{ColumnType, LeafType};
pub use registry::{
    ArrayHandler, ColumnConverter, ConverterRegistry, HandlerResult, ValueHandler,
};
pub use types::{JsonSchema, JsonType, JsonTypeOrArray, SchemaProperty};
pub use value::{sql_value_to_json, NativeValue, ValueNode};

#[cfg(test)]
mod tests;
