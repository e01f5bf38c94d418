//! Open key/value metadata attached to accounts, entries and lines.
//!
//! Values are scalars only; keys are unique and iterate in sorted order so the
//! stored JSON is deterministic.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{LedgerError, LedgerResult};

/// A single scalar metadata value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::Text(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        MetadataValue::Int(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        MetadataValue::Bool(value)
    }
}

/// Ordered string-keyed map of scalar values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(BTreeMap<String, MetadataValue>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a key. Returns the previous value, if any.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Option<MetadataValue> {
        self.0.insert(key.into(), value.into())
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &MetadataValue)> {
        self.0.iter()
    }

    /// Build metadata from arbitrary JSON, rejecting anything that is not a
    /// flat object of scalars. `null` is treated as "no metadata".
    pub fn from_json(value: JsonValue) -> LedgerResult<Self> {
        let object = match value {
            JsonValue::Null => return Ok(Self::default()),
            JsonValue::Object(map) => map,
            other => {
                return Err(LedgerError::validation(format!(
                    "malformed metadata: expected an object, got {}",
                    json_kind(&other)
                )));
            }
        };

        let mut out = BTreeMap::new();
        for (key, value) in object {
            if key.trim().is_empty() {
                return Err(LedgerError::validation("malformed metadata: empty key"));
            }
            let scalar = match value {
                JsonValue::Bool(b) => MetadataValue::Bool(b),
                JsonValue::String(s) => MetadataValue::Text(s),
                JsonValue::Number(n) => match n.as_i64() {
                    Some(i) => MetadataValue::Int(i),
                    None => MetadataValue::Float(n.as_f64().ok_or_else(|| {
                        LedgerError::validation(format!("malformed metadata: number out of range for '{key}'"))
                    })?),
                },
                other => {
                    return Err(LedgerError::validation(format!(
                        "malformed metadata: value for '{key}' must be a scalar, got {}",
                        json_kind(&other)
                    )));
                }
            };
            out.insert(key, scalar);
        }
        Ok(Self(out))
    }

    pub fn to_json(&self) -> JsonValue {
        // Serializing a map of scalars cannot fail.
        serde_json::to_value(self).unwrap_or(JsonValue::Null)
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flat_object_is_accepted_and_sorted() {
        let md = Metadata::from_json(json!({"zeta": 1, "alpha": "x", "flag": true, "rate": 1.5})).unwrap();
        let keys: Vec<_> = md.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["alpha", "flag", "rate", "zeta"]);
        assert_eq!(md.get("zeta"), Some(&MetadataValue::Int(1)));
        assert_eq!(md.get("rate"), Some(&MetadataValue::Float(1.5)));
    }

    #[test]
    fn nested_values_are_rejected() {
        let err = Metadata::from_json(json!({"nested": {"a": 1}})).unwrap_err();
        assert!(matches!(err, LedgerError::Validation(msg) if msg.contains("malformed metadata")));

        let err = Metadata::from_json(json!([1, 2])).unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[test]
    fn null_means_empty() {
        assert!(Metadata::from_json(JsonValue::Null).unwrap().is_empty());
    }

    #[test]
    fn json_round_trip_preserves_scalars() {
        let md = Metadata::new().with("channel", "upi").with("attempt", 2i64);
        let back = Metadata::from_json(md.to_json()).unwrap();
        assert_eq!(back, md);
    }
}
