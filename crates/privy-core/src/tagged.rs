//! Plumbing for JSON objects discriminated by a `type` field.
//!
//! Decoding goes through an intermediate [`Map`] so the tag can be inspected before a
//! variant is chosen, and so unrecognised tags keep every field they arrived with.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

/// Name of the discriminator field.
pub(crate) const TAG: &str = "type";

/// Remove the discriminator from `fields`.
pub(crate) fn take_tag<E: serde::de::Error>(fields: &mut Map<String, Value>) -> Result<String, E> {
    match fields.remove(TAG) {
        Some(Value::String(tag)) => Ok(tag),
        Some(other) => Err(E::custom(format!("`{TAG}` must be a string, got {other}"))),
        None => Err(E::missing_field(TAG)),
    }
}

/// Decode a variant body from the remaining fields.
pub(crate) fn from_fields<T, E>(fields: Map<String, Value>) -> Result<T, E>
where
    T: DeserializeOwned,
    E: serde::de::Error,
{
    serde_json::from_value(Value::Object(fields)).map_err(E::custom)
}

/// Encode a variant body into a field map.
pub(crate) fn to_fields<T, E>(value: &T) -> Result<Map<String, Value>, E>
where
    T: Serialize,
    E: serde::ser::Error,
{
    match serde_json::to_value(value).map_err(E::custom)? {
        Value::Object(fields) => Ok(fields),
        other => Err(E::custom(format!("expected a JSON object, got {other}"))),
    }
}

/// Put the discriminator back in front of a variant body.
pub(crate) fn with_tag(mut fields: Map<String, Value>, tag: &str) -> Map<String, Value> {
    fields.insert(TAG.to_owned(), Value::String(tag.to_owned()));
    fields
}
