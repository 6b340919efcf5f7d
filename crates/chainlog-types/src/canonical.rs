//! Canonical JSON encoding.
//!
//! Object keys are sorted by byte order at every nesting level and no
//! insignificant whitespace is emitted. Scalars use serde_json's formatting.
//! The output does not depend on how the [`Value`] was built, nor on whether
//! the `preserve_order` feature of serde_json is enabled somewhere in the
//! dependency graph.

use serde_json::Value;

/// Encode a JSON value canonically.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_value(value, &mut out);
    out
}

/// Canonical encoding as UTF-8 bytes, ready for hashing.
pub fn canonical_bytes(value: &Value) -> Vec<u8> {
    canonical_json(value).into_bytes()
}

/// Append the canonical encoding of `value` to `out`.
pub(crate) fn write_value(value: &Value, out: &mut String) {
    match value {
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {
            out.push_str(&value.to_string());
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_unstable_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_str(key, out);
                out.push(':');
                write_value(item, out);
            }
            out.push('}');
        }
    }
}

/// Append `s` as an escaped JSON string literal.
pub(crate) fn write_str(s: &str, out: &mut String) {
    out.push_str(&Value::from(s).to_string());
}
