//! Typed construction of extraction methods from untyped payloads
//!
//! Construction happens in two steps. `decode_mapping` turns the source
//! (nothing, a JSON value, or JSON text) into a plain object map, and
//! `ExtractionMethod::from_mapping` picks the known keys out of it.

use crate::model::ExtractionMethod;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

/// Raised when a textual payload is not valid JSON.
#[derive(Debug, Error)]
#[error("failed to decode payload: {0}")]
pub struct DecodeError(#[from] serde_json::Error);

/// A payload as delivered by an upstream system.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    /// Already structured data
    Value(Value),
    /// JSON text that still needs parsing
    Text(String),
}

impl From<Value> for Source {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<String> for Source {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Source {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

/// Resolve a source into a JSON value. `None` becomes an empty object.
pub fn decode_value(source: Option<Source>) -> Result<Value, DecodeError> {
    match source {
        None => Ok(Value::Object(Map::new())),
        Some(Source::Value(value)) => Ok(value),
        Some(Source::Text(text)) => Ok(serde_json::from_str(&text)?),
    }
}

/// Resolve a source into an object map.
///
/// Anything that decodes to a non-object (`null`, numbers, arrays...) is
/// treated as an empty map.
pub fn decode_mapping(source: Option<Source>) -> Result<Map<String, Value>, DecodeError> {
    match decode_value(source)? {
        Value::Object(map) => Ok(map),
        _ => Ok(Map::new()),
    }
}

fn string_field(mapping: &Map<String, Value>, key: &str) -> Option<String> {
    match mapping.get(key)? {
        Value::String(s) => Some(s.clone()),
        other => {
            debug!(key, value = %other, "Dropping non-string field");
            None
        }
    }
}

impl ExtractionMethod {
    /// Build a view from an already decoded map. Unknown keys are ignored.
    pub fn from_mapping(mapping: &Map<String, Value>) -> Self {
        Self {
            name: string_field(mapping, "Name"),
            schema: string_field(mapping, "Schema"),
        }
    }

    /// Build a view from any supported source.
    pub fn create_from(source: Option<Source>) -> Result<Self, DecodeError> {
        let mapping = decode_mapping(source)?;
        Ok(Self::from_mapping(&mapping))
    }

    /// Build views from a JSON array, as returned when the backend lists
    /// its methods. A non-array payload yields no methods.
    pub fn create_list_from(source: Option<Source>) -> Result<Vec<Self>, DecodeError> {
        let methods = match decode_value(source)? {
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::Object(map) => Self::from_mapping(map),
                    _ => Self::default(),
                })
                .collect(),
            _ => Vec::new(),
        };
        Ok(methods)
    }
}
