//! Entity id normalization.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ParseError;

/// Controls how wire ids become the `id` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdPolicy {
    /// Convert ids to integers. When off, the wire value passes through.
    pub convert_ids_to_int: bool,
}

impl Default for IdPolicy {
    fn default() -> Self {
        Self {
            convert_ids_to_int: true,
        }
    }
}

impl IdPolicy {
    pub fn raw() -> Self {
        Self {
            convert_ids_to_int: false,
        }
    }

    /// Normalize the id of an entity of `entity_type`.
    pub fn resolve(&self, entity_type: &str, raw: Option<&Value>) -> Result<Value, ParseError> {
        let raw = match raw {
            None | Some(Value::Null) => {
                return Err(ParseError::MissingId {
                    entity_type: entity_type.to_string(),
                })
            }
            Some(raw) => raw,
        };

        if !self.convert_ids_to_int {
            return Ok(raw.clone());
        }

        to_integer(raw).map(Value::from).ok_or_else(|| ParseError::InvalidId {
            entity_type: entity_type.to_string(),
            id: raw.clone(),
        })
    }
}

fn to_integer(raw: &Value) -> Option<i64> {
    match raw {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn converts_string_and_numeric_ids() {
        let policy = IdPolicy::default();
        assert_eq!(policy.resolve("user", Some(&json!("12"))).unwrap(), json!(12));
        assert_eq!(policy.resolve("user", Some(&json!(" 7 "))).unwrap(), json!(7));
        assert_eq!(policy.resolve("user", Some(&json!(3))).unwrap(), json!(3));
        assert_eq!(policy.resolve("user", Some(&json!(3.9))).unwrap(), json!(3));
    }

    #[test]
    fn rejects_non_numeric_ids_when_converting() {
        let err = IdPolicy::default()
            .resolve("note", Some(&json!("abc")))
            .unwrap_err();
        assert!(matches!(err, ParseError::InvalidId { ref entity_type, .. } if entity_type == "note"));
    }

    #[test]
    fn passes_raw_ids_through_when_disabled() {
        let policy = IdPolicy::raw();
        assert_eq!(policy.resolve("user", Some(&json!("5"))).unwrap(), json!("5"));
        assert_eq!(policy.resolve("user", Some(&json!(5))).unwrap(), json!(5));
    }

    #[test]
    fn missing_or_null_id_is_an_error() {
        for raw in [None, Some(&Value::Null)] {
            let err = IdPolicy::default().resolve("state", raw).unwrap_err();
            assert!(matches!(err, ParseError::MissingId { .. }));
        }
    }

    #[test]
    fn conversion_defaults_to_enabled_in_config() {
        let policy: IdPolicy = serde_json::from_value(json!({})).unwrap();
        assert!(policy.convert_ids_to_int);
    }
}
