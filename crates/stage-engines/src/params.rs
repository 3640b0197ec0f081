//! Bound parameter values.

use serde::Serialize;
use std::collections::BTreeMap;

/// A parameter value after binding.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParameterValue {
    /// Raw string, passed through unchanged.
    String(String),
    /// Decoded integer.
    Integer(i64),
    /// Decoded float.
    Float(f64),
    /// Decoded boolean.
    Boolean(bool),
    /// Decoded structured payload.
    Json(serde_json::Value),
}

impl ParameterValue {
    /// Borrow the value as a string, if it is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParameterValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Read the value as an integer, if it is one.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParameterValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Read the value as a boolean. Integers follow the 0/1 flag convention.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParameterValue::Boolean(b) => Some(*b),
            ParameterValue::Integer(i) => Some(*i != 0),
            _ => None,
        }
    }

    /// Borrow the structured payload, if the value is one.
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            ParameterValue::Json(v) => Some(v),
            _ => None,
        }
    }

    /// Convert to a JSON value.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ParameterValue::String(s) => serde_json::json!(s),
            ParameterValue::Integer(i) => serde_json::json!(i),
            ParameterValue::Float(f) => serde_json::json!(f),
            ParameterValue::Boolean(b) => serde_json::json!(b),
            ParameterValue::Json(v) => v.clone(),
        }
    }
}

/// Named parameter values. Absent parameters are simply not present.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ParameterSet {
    values: BTreeMap<String, ParameterValue>,
}

impl ParameterSet {
    /// Create an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a value to a name.
    pub fn insert(&mut self, name: impl Into<String>, value: ParameterValue) {
        self.values.insert(name.into(), value);
    }

    /// Get a bound value.
    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.values.get(name)
    }

    /// Check if a name is bound.
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Get a bound string value.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(ParameterValue::as_str)
    }

    /// Get a bound integer value.
    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(ParameterValue::as_i64)
    }

    /// Get a bound structured value.
    pub fn get_json(&self, name: &str) -> Option<&serde_json::Value> {
        self.get(name).and_then(ParameterValue::as_json)
    }

    /// Number of bound parameters.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over bound names and values in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParameterValue)> {
        self.values.iter()
    }

    /// Convert to a JSON object.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}
