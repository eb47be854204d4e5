use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::Result;

/// Serialize `value` through a `serde_json::Value` first so that nested
/// object keys come out sorted lexicographically (`serde_json::Map` is a
/// `BTreeMap` unless the `preserve_order` feature is enabled, which it is
/// not here), then emit compact UTF-8 JSON bytes.
pub fn canonical_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let as_value = serde_json::to_value(value)?;
    Ok(serde_json::to_vec(&as_value)?)
}

pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Content-addressed identifier of anything that canonically serializes:
/// SHA-256 hex digest of its canonical JSON form.
pub fn infohash_of<T: Serialize>(value: &T) -> Result<String> {
    Ok(sha256_hex(&canonical_json_bytes(value)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_json_sorts_keys() {
        let value = json!({"b": 1, "a": 2});
        let bytes = canonical_json_bytes(&value).unwrap();
        assert_eq!(std::str::from_utf8(&bytes).unwrap(), r#"{"a":2,"b":1}"#);
    }

    #[test]
    fn infohash_is_deterministic() {
        let value = json!({"filename": "x", "size": 10});
        assert_eq!(infohash_of(&value).unwrap(), infohash_of(&value).unwrap());
    }

    #[test]
    fn infohash_differs_on_field_change() {
        let a = json!({"filename": "x", "size": 10});
        let b = json!({"filename": "x", "size": 11});
        assert_ne!(infohash_of(&a).unwrap(), infohash_of(&b).unwrap());
    }
}
