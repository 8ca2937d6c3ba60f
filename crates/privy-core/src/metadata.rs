//! Custom metadata attached to a user.
//!
//! The provider only stores strings, numbers and booleans. Anything else found while
//! decoding (arrays, objects, `null`) is dropped rather than rejected.

use std::collections::btree_map::{self, BTreeMap};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A single custom metadata value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetadataValue {
    /// A string.
    String(String),
    /// An integral number.
    Integer(i64),
    /// A number with a fractional part, or one outside the `i64` range.
    Float(f64),
    /// A boolean.
    Bool(bool),
}

impl MetadataValue {
    fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::String(value) => Some(Self::String(value)),
            Value::Bool(value) => Some(Self::Bool(value)),
            Value::Number(number) => number
                .as_i64()
                .map(Self::Integer)
                .or_else(|| number.as_f64().map(Self::Float)),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Custom metadata of a user, keyed by string.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CustomMetadata(BTreeMap<String, MetadataValue>);

impl CustomMetadata {
    /// Create empty metadata.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a value by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.0.get(key)
    }

    /// Get a string, or `None` if absent or not a string.
    #[must_use]
    pub fn get_string(&self, key: &str) -> Option<&str> {
        match self.0.get(key)? {
            MetadataValue::String(value) => Some(value),
            _ => None,
        }
    }

    /// Get a number as an integer. Fractional values are truncated.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn get_number(&self, key: &str) -> Option<i64> {
        match self.0.get(key)? {
            MetadataValue::Integer(value) => Some(*value),
            MetadataValue::Float(value) => Some(*value as i64),
            _ => None,
        }
    }

    /// Get a number as a float. Integers are widened.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn get_decimal(&self, key: &str) -> Option<f64> {
        match self.0.get(key)? {
            MetadataValue::Integer(value) => Some(*value as f64),
            MetadataValue::Float(value) => Some(*value),
            _ => None,
        }
    }

    /// Get a boolean, or `None` if absent or not a boolean.
    #[must_use]
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.0.get(key)? {
            MetadataValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Store any supported value, replacing the previous one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> &mut Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Store a string.
    pub fn put_string(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.insert(key, MetadataValue::String(value.into()))
    }

    /// Store an integer.
    pub fn put_number(&mut self, key: impl Into<String>, value: i64) -> &mut Self {
        self.insert(key, value)
    }

    /// Store a float.
    pub fn put_decimal(&mut self, key: impl Into<String>, value: f64) -> &mut Self {
        self.insert(key, value)
    }

    /// Store a boolean.
    pub fn put_bool(&mut self, key: impl Into<String>, value: bool) -> &mut Self {
        self.insert(key, value)
    }

    /// Remove a value, returning it if present.
    pub fn remove(&mut self, key: &str) -> Option<MetadataValue> {
        self.0.remove(key)
    }

    /// Number of stored values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the entries in key order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, MetadataValue> {
        self.0.iter()
    }
}

impl<'de> Deserialize<'de> for CustomMetadata {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, Value>::deserialize(deserializer)?;

        Ok(Self(
            raw.into_iter()
                .filter_map(|(key, value)| MetadataValue::from_json(value).map(|value| (key, value)))
                .collect(),
        ))
    }
}

impl<K: Into<String>, V: Into<MetadataValue>> FromIterator<(K, V)> for CustomMetadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

impl<'a> IntoIterator for &'a CustomMetadata {
    type Item = (&'a String, &'a MetadataValue);
    type IntoIter = btree_map::Iter<'a, String, MetadataValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
