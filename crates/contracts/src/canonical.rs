use hex::ToHex;
use sha2::Digest;

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = sha2::Sha256::new();
    hasher.update(bytes);
    hasher.finalize().encode_hex::<String>()
}

pub fn is_sha256_hex(s: &str) -> bool {
    let bytes = s.as_bytes();
    if bytes.len() != 64 {
        return false;
    }
    bytes.iter().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

pub fn canonicalize_json_value(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Null => serde_json::Value::Null,
        serde_json::Value::Bool(v) => serde_json::Value::Bool(*v),
        serde_json::Value::Number(v) => serde_json::Value::Number(v.clone()),
        serde_json::Value::String(v) => serde_json::Value::String(v.clone()),
        serde_json::Value::Array(values) => serde_json::Value::Array(
            values
                .iter()
                .map(canonicalize_json_value)
                .collect::<Vec<_>>(),
        ),
        serde_json::Value::Object(map) => {
            let mut entries = map.iter().collect::<Vec<_>>();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));

            let mut out = serde_json::Map::with_capacity(map.len());
            for (k, v) in entries {
                out.insert(k.clone(), canonicalize_json_value(v));
            }
            serde_json::Value::Object(out)
        }
    }
}

pub fn canonical_json_bytes(value: &serde_json::Value) -> Vec<u8> {
    let canonical = canonicalize_json_value(value);
    serde_json::to_vec(&canonical).unwrap_or_else(|_| b"null".to_vec())
}

pub fn canonical_json_string(value: &serde_json::Value) -> String {
    String::from_utf8(canonical_json_bytes(value)).unwrap_or_else(|_| "null".to_string())
}

/// Hash recorded next to every audit payload so a stored entry can be
/// re-verified independently of JSON key ordering.
pub fn hash_canonical_json(value: &serde_json::Value) -> String {
    sha256_hex(&canonical_json_bytes(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_json_sorts_object_keys_recursively() {
        let value = serde_json::json!({
            "recipient_name": "Jane",
            "field": {
                "type": "TEXT",
                "data": "Jane Doe"
            }
        });

        assert_eq!(
            canonical_json_string(&value),
            r#"{"field":{"data":"Jane Doe","type":"TEXT"},"recipient_name":"Jane"}"#
        );
    }

    #[test]
    fn canonical_json_preserves_array_order() {
        let value = serde_json::json!({"a":[{"b":2},{"a":1}]});
        assert_eq!(canonical_json_string(&value), r#"{"a":[{"b":2},{"a":1}]}"#);
    }

    #[test]
    fn audit_payload_hash_is_stable_under_key_reordering() {
        let a = serde_json::json!({"field_id": "field_1", "recipient_id": 2});
        let b = serde_json::json!({"recipient_id": 2, "field_id": "field_1"});
        assert_eq!(hash_canonical_json(&a), hash_canonical_json(&b));
    }

    #[test]
    fn sha256_hex_is_lowercase_and_valid() {
        let h = sha256_hex(b"abc");
        assert!(is_sha256_hex(&h));
        assert_eq!(
            h,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
