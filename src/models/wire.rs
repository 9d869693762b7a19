//! Lenient field decoders for payloads produced by the dispatch backend.
//!
//! The backend is loose about scalar types: booking ids and trip codes show
//! up as strings or numbers, and profile fields are sometimes `null`.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Accepts a string, a number, or `null` (decoded as an empty string).
pub fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    scalar_to_string(value).map_err(serde::de::Error::custom)
}

/// Like [`lenient_string`] but keeps `null` and missing values as `None`.
pub fn lenient_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(value) => scalar_to_string(value)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

fn scalar_to_string(value: Value) -> Result<String, String> {
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(format!("expected string or number, got {other}")),
    }
}
