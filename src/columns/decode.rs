// src/columns/decode.rs

use serde_json::Value;
use tracing::debug;

/// Parse-or-null for structured fields stored as JSON text.
///
/// - absent, `null`, or blank string      → `None`
/// - string holding a JSON object/array   → the parsed structure
/// - already-materialized object/array    → passed through (decoding twice is a no-op)
/// - anything else, including bad JSON    → `None`
pub fn decode_structure(raw: Option<&Value>) -> Option<Value> {
    match raw? {
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(v @ (Value::Object(_) | Value::Array(_))) => Some(v),
            // scalar JSON is not a structure
            Ok(_) => None,
            Err(e) => {
                debug!(error = %e, "discarding undecodable structured field");
                None
            }
        },
        v @ (Value::Object(_) | Value::Array(_)) => Some(v.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn absent_and_blank_are_none() {
        assert_eq!(decode_structure(None), None);
        assert_eq!(decode_structure(Some(&Value::Null)), None);
        assert_eq!(decode_structure(Some(&json!(""))), None);
        assert_eq!(decode_structure(Some(&json!("   "))), None);
    }

    #[test]
    fn malformed_is_none() {
        assert_eq!(decode_structure(Some(&json!("not json"))), None);
        assert_eq!(decode_structure(Some(&json!("{\"a\": "))), None);
    }

    #[test]
    fn scalar_json_is_not_a_structure() {
        assert_eq!(decode_structure(Some(&json!("42"))), None);
        assert_eq!(decode_structure(Some(&json!("\"text\""))), None);
        assert_eq!(decode_structure(Some(&json!("true"))), None);
        assert_eq!(decode_structure(Some(&json!(42))), None);
        assert_eq!(decode_structure(Some(&json!(false))), None);
    }

    #[test]
    fn decodes_structures() {
        assert_eq!(
            decode_structure(Some(&json!("{\"a\": [1, 2]}"))),
            Some(json!({"a": [1, 2]}))
        );
        assert_eq!(decode_structure(Some(&json!("[1]"))), Some(json!([1])));
    }

    #[test]
    fn decoding_is_idempotent() {
        let once = decode_structure(Some(&json!("{\"prefix\": \"$\"}")));
        let twice = decode_structure(once.as_ref());
        assert_eq!(once, twice);
    }
}
