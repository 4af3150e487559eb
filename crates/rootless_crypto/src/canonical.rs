//! Canonical serialization (spec §9 Q1).
//!
//! The exact byte form used for every signature and CID transcript in this
//! crate: object keys sorted lexicographically at every nesting level,
//! array order preserved, absent optional fields omitted rather than
//! written as `null`, no insignificant whitespace. Byte-valued fields are
//! expected to already be represented as base64url strings by the type
//! being serialized (via `#[serde(with = ...)]` helpers) — this module
//! only fixes key order, it does not reinterpret values.
//!
//! Key order is forced explicitly (not left to `serde_json`'s `Map`
//! backing) so the result doesn't depend on whether some other crate in
//! the build graph enabled `serde_json`'s `preserve_order` feature.

use serde::Serialize;
use serde_json::Value;

use crate::error::CryptoError;

/// Serialize `value` to its canonical byte form.
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, CryptoError> {
    let as_value = serde_json::to_value(value)?;
    let canonical = canonicalize(as_value);
    Ok(serde_json::to_vec(&canonical)?)
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<String> = map.keys().cloned().collect();
            keys.sort();
            let mut sorted = serde_json::Map::new();
            for key in keys {
                let v = map.get(&key).cloned().unwrap_or(Value::Null);
                if !v.is_null() {
                    sorted.insert(key, canonicalize(v));
                }
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}
