//! Binary-safe JSON codec.
//!
//! JSON has no byte-string node, so opaque binary payloads travel and persist
//! as a tagged object `{"__bin": <base64>}`. The codec walks a value tree,
//! checking every tag it meets, and is its own inverse: for every in-scope
//! value `v`, `decode_from_json(&encode_for_json(&v)?) == v`.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{Map, Value};

use crate::error::StrandError;

/// Key marking a tagged binary node.
pub const BINARY_TAG: &str = "__bin";

/// Wrap raw bytes into the tagged JSON form.
pub fn binary_value(bytes: &[u8]) -> Value {
    let mut obj = Map::new();
    obj.insert(BINARY_TAG.to_string(), Value::String(BASE64.encode(bytes)));
    Value::Object(obj)
}

/// Unwrap a tagged binary node, if `v` is one. Returns `None` for any other
/// shape, including a tag whose base64 payload does not decode.
pub fn value_to_bytes(v: &Value) -> Option<Vec<u8>> {
    let obj = v.as_object()?;
    if obj.len() != 1 {
        return None;
    }
    let encoded = obj.get(BINARY_TAG)?.as_str()?;
    BASE64.decode(encoded).ok()
}

/// Prepare a value for JSON storage. Every tagged binary node anywhere in the
/// tree must carry valid base64; anything else passes through unchanged.
pub fn encode_for_json(v: &Value) -> Result<Value, StrandError> {
    walk(v)
}

/// Reverse of [`encode_for_json`]. Tagged nodes are re-checked so a corrupted
/// stored record surfaces as an error instead of silently leaking garbage.
pub fn decode_from_json(v: &Value) -> Result<Value, StrandError> {
    walk(v)
}

fn walk(v: &Value) -> Result<Value, StrandError> {
    match v {
        Value::Object(obj) => {
            if obj.len() == 1 {
                if let Some(tag) = obj.get(BINARY_TAG) {
                    let encoded = tag.as_str().ok_or_else(|| {
                        StrandError::Serialization("binary tag payload must be a string".into())
                    })?;
                    BASE64.decode(encoded).map_err(|e| {
                        StrandError::Serialization(format!("invalid base64 in binary tag: {e}"))
                    })?;
                    return Ok(v.clone());
                }
            }
            let mut out = Map::with_capacity(obj.len());
            for (k, child) in obj {
                out.insert(k.clone(), walk(child)?);
            }
            Ok(Value::Object(out))
        }
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(walk(item)?);
            }
            Ok(Value::Array(out))
        }
        other => Ok(other.clone()),
    }
}

/// The byte content of a value, as used for content addressing (`blob://`):
/// decoded bytes for a tagged binary node, UTF-8 for a plain string, canonical
/// JSON bytes for everything else.
pub fn value_bytes(v: &Value) -> Vec<u8> {
    if let Some(bytes) = value_to_bytes(v) {
        return bytes;
    }
    if let Value::String(s) = v {
        return s.as_bytes().to_vec();
    }
    serde_json::to_vec(v).unwrap_or_default()
}
