//! Converter registry
//!
//! Maps each [`LeafType`] to an ordered list of caller-registered handlers,
//! tried in registration order before the built-in conversion. A handler
//! returns `None` to delegate to the next one, so built-in behavior is kept
//! for every case a handler does not recognize. Array iteration can be
//! extended the same way.

use super::column_type::{ColumnType, LeafType};
use super::convert::{convert_builtin, iterate_builtin};
use super::value::{NativeValue, ValueNode};
use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Result of one handler; the error is a human-readable reason
pub type HandlerResult = std::result::Result<ValueNode, String>;

/// Leaf conversion handler; `None` delegates to the next handler
pub type ValueHandler = Arc<dyn Fn(&NativeValue) -> Option<HandlerResult> + Send + Sync>;

/// Array iteration handler; `None` delegates to the next handler
pub type ArrayHandler = Arc<dyn Fn(&NativeValue) -> Option<Vec<NativeValue>> + Send + Sync>;

static BUILTIN: Lazy<Arc<ConverterRegistry>> = Lazy::new(|| Arc::new(ConverterRegistry::new()));

/// Table of conversion handlers per leaf type
#[derive(Clone, Default)]
pub struct ConverterRegistry {
    handlers: HashMap<LeafType, Vec<ValueHandler>>,
    array_handlers: Vec<ArrayHandler>,
}

impl ConverterRegistry {
    /// Create a registry with only built-in conversions
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared registry with only built-in conversions
    pub fn builtin() -> Arc<Self> {
        Arc::clone(&BUILTIN)
    }

    /// Register a handler for a leaf type
    pub fn register<F>(&mut self, leaf: LeafType, handler: F) -> &mut Self
    where
        F: Fn(&NativeValue) -> Option<HandlerResult> + Send + Sync + 'static,
    {
        self.handlers.entry(leaf).or_default().push(Arc::new(handler));
        self
    }

    /// Register a handler that iterates array-like values
    pub fn register_array_iterator<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&NativeValue) -> Option<Vec<NativeValue>> + Send + Sync + 'static,
    {
        self.array_handlers.push(Arc::new(handler));
        self
    }

    /// Number of handlers registered for a leaf type
    pub fn handler_count(&self, leaf: LeafType) -> usize {
        self.handlers.get(&leaf).map_or(0, Vec::len)
    }

    /// Convert a value with the handlers for `leaf`, then the built-in
    pub fn convert_leaf(&self, leaf: LeafType, value: &NativeValue) -> HandlerResult {
        if value.is_null() {
            return Ok(ValueNode::Null);
        }
        if let Some(handlers) = self.handlers.get(&leaf) {
            for handler in handlers {
                if let Some(result) = handler(value) {
                    return result;
                }
            }
        }
        convert_builtin(leaf, value)
    }

    /// Split an array-like value into its elements, `None` if not iterable
    pub fn iterate(&self, value: &NativeValue) -> Option<Vec<NativeValue>> {
        self.array_handlers
            .iter()
            .find_map(|handler| handler(value))
            .or_else(|| iterate_builtin(value))
    }

    /// Convert a value according to a resolved column type
    pub fn convert(&self, column_type: &ColumnType, value: &NativeValue) -> HandlerResult {
        match column_type {
            ColumnType::Leaf(leaf) => self.convert_leaf(*leaf, value),
            ColumnType::Array(item) => {
                if value.is_null() {
                    return Ok(ValueNode::Null);
                }
                let elements = self
                    .iterate(value)
                    .ok_or_else(|| "value is not an array".to_string())?;
                elements
                    .iter()
                    .map(|element| self.convert(item, element))
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map(ValueNode::Array)
            }
        }
    }
}

impl fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut counts: Vec<(String, usize)> = self
            .handlers
            .iter()
            .map(|(leaf, handlers)| (leaf.to_string(), handlers.len()))
            .collect();
        counts.sort();
        f.debug_struct("ConverterRegistry")
            .field("handlers", &counts)
            .field("array_handlers", &self.array_handlers.len())
            .finish()
    }
}

/// Conversion of one named column
#[derive(Debug, Clone)]
pub struct ColumnConverter {
    name: String,
    column_type: ColumnType,
    registry: Arc<ConverterRegistry>,
}

impl ColumnConverter {
    /// Create a converter for a column
    pub fn new(
        name: impl Into<String>,
        column_type: ColumnType,
        registry: Arc<ConverterRegistry>,
    ) -> Self {
        Self {
            name: name.into(),
            column_type,
            registry,
        }
    }

    /// Column name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolved column type
    pub fn column_type(&self) -> &ColumnType {
        &self.column_type
    }

    /// Convert one value, naming the column, value and type on failure
    pub fn convert(&self, value: &NativeValue) -> Result<ValueNode> {
        self.registry
            .convert(&self.column_type, value)
            .map_err(|message| Error::Conversion {
                column: self.name.clone(),
                value: value.to_string(),
                declared_type: self.column_type.to_string(),
                message,
            })
    }
}
