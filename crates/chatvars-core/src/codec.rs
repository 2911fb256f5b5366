//! Indexed access into JSON-encoded variable values.
//!
//! Variables are flat key/value pairs, but a value may be a JSON string
//! holding an object or array. An index addresses one slot inside it:
//! writes create the container on demand, reads project the slot back out.

use std::fmt;

use serde_json::{Map, Value};

use crate::constants::MAX_INDEXED_POSITION;
use crate::error::{Result, VariableError};

/// Slot inside a JSON container.
///
/// An index that parses cleanly as a non-negative integer is a position
/// (array access); anything else is an object key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariableIndex {
    Position(usize),
    Key(String),
}

impl VariableIndex {
    /// Parse a user-supplied index. Blank input means "no index".
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        match trimmed.parse::<f64>() {
            Ok(n) if n.is_finite() && n >= 0.0 && n.fract() == 0.0 && n <= usize::MAX as f64 => {
                Some(VariableIndex::Position(n as usize))
            }
            _ => Some(VariableIndex::Key(raw.to_string())),
        }
    }

    /// Index given as a JSON argument (number or string).
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Number(n) => match n.as_u64() {
                Some(position) => Some(VariableIndex::Position(position as usize)),
                None => Self::parse(&n.to_string()),
            },
            Value::String(s) => Self::parse(s),
            other => Self::parse(&other.to_string()),
        }
    }
}

impl fmt::Display for VariableIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariableIndex::Position(position) => write!(f, "{}", position),
            VariableIndex::Key(key) => f.write_str(key),
        }
    }
}

/// Compute the value to store for `key` when writing `new_value`.
///
/// Without an index the new value is stored as is. With an index the
/// existing value is decoded (missing means `null`), a fresh object or array
/// replaces `null`, the slot is assigned, and the container is re-encoded.
pub fn encode_indexed(
    key: &str,
    existing: Option<&Value>,
    index: Option<&VariableIndex>,
    new_value: Value,
) -> Result<Value> {
    let Some(index) = index else {
        return Ok(new_value);
    };

    let not_indexable = || VariableError::NotIndexable {
        key: key.to_string(),
        index: index.to_string(),
    };

    let container = match existing {
        None | Some(Value::Null) => Value::Null,
        Some(Value::String(raw)) => serde_json::from_str(raw).map_err(|_| not_indexable())?,
        Some(other) => other.clone(),
    };

    let container = match (container, index) {
        (Value::Null, VariableIndex::Key(k)) => {
            let mut map = Map::new();
            map.insert(k.clone(), new_value);
            Value::Object(map)
        }
        (Value::Null, VariableIndex::Position(position)) => {
            Value::Array(assign_position(Vec::new(), *position, new_value)?)
        }
        (Value::Object(mut map), VariableIndex::Key(k)) => {
            map.insert(k.clone(), new_value);
            Value::Object(map)
        }
        (Value::Object(mut map), VariableIndex::Position(position)) => {
            map.insert(position.to_string(), new_value);
            Value::Object(map)
        }
        (Value::Array(items), VariableIndex::Position(position)) => {
            Value::Array(assign_position(items, *position, new_value)?)
        }
        _ => return Err(not_indexable()),
    };

    Ok(Value::String(serde_json::to_string(&container)?))
}

fn assign_position(mut items: Vec<Value>, position: usize, value: Value) -> Result<Vec<Value>> {
    if position > MAX_INDEXED_POSITION {
        return Err(VariableError::IndexOutOfRange {
            index: position,
            max: MAX_INDEXED_POSITION,
        });
    }
    if items.len() <= position {
        items.resize(position + 1, Value::Null);
    }
    items[position] = value;
    Ok(items)
}

/// Read the slot `index` out of a stored value.
///
/// Without an index the raw value is returned. Composite results (and
/// `null`) come back as JSON strings so callers only ever see scalars.
/// A stored value that is not valid JSON is returned undecoded.
pub fn decode_indexed(raw: Option<&Value>, index: Option<&VariableIndex>) -> Option<Value> {
    let Some(index) = index else {
        return raw.cloned();
    };
    let raw = raw?;

    let parsed = match raw {
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::debug!("stored value is not JSON, returning it undecoded: {}", e);
                return Some(raw.clone());
            }
        },
        other => other.clone(),
    };

    let projected = match (&parsed, index) {
        (Value::Array(items), VariableIndex::Position(position)) => items.get(*position),
        (Value::Object(map), VariableIndex::Key(k)) => map.get(k),
        (Value::Object(map), VariableIndex::Position(position)) => map.get(&position.to_string()),
        _ => None,
    }?;

    match projected {
        Value::Object(_) | Value::Array(_) | Value::Null => {
            Some(Value::String(projected.to_string()))
        }
        scalar => Some(scalar.clone()),
    }
}
