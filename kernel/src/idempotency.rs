//! Canonical JSON hashing used for task-parameter and content-dedup hashes.
//!
//! Grounded on `ai/runtime/src/storage/mod.rs`'s `FilesystemArtifactStore::checksum`
//! — `Sha256::new()`, `update` fed in a loop, hex-format the finalized
//! digest — adapted here to hash a canonicalized `serde_json::Value`
//! (stable key order, no incidental whitespace) instead of streaming
//! file bytes, since the inputs are already arbitrary JSON rather than a
//! file on disk.

use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Render `value` as a canonical JSON string: object keys sorted
/// lexicographically at every nesting level, no extraneous whitespace.
/// Stable under key reordering and whitespace differences in the input,
/// satisfying the round-trip law in spec §8.
pub fn canonical_json(value: &Value) -> String {
    fn canonicalize(value: &Value) -> Value {
        match value {
            Value::Object(map) => {
                let sorted: BTreeMap<String, Value> = map
                    .iter()
                    .map(|(k, v)| (k.clone(), canonicalize(v)))
                    .collect();
                Value::Object(sorted.into_iter().collect())
            }
            Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
            other => other.clone(),
        }
    }

    serde_json::to_string(&canonicalize(value)).unwrap_or_default()
}

/// SHA-256 hex digest of `value`'s canonical JSON representation. Used as
/// `Task.parameters_hash`.
pub fn parameters_hash(value: &Value) -> String {
    sha256_hex(canonical_json(value).as_bytes())
}

/// SHA-256 hex digest of normalised content text. Used as
/// `ContentDedup.content_hash`.
pub fn content_hash(normalised_text: &str) -> String {
    sha256_hex(normalised_text.as_bytes())
}

/// Lowercase hex SHA-256 digest of arbitrary bytes.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Normalise free text before hashing for content dedup: trim, collapse
/// internal whitespace runs, lowercase. Two posts that differ only in
/// capitalisation or incidental whitespace hash identically.
pub fn normalise_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_json_stable_under_key_reordering() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(canonical_json(&a), canonical_json(&b));
    }

    #[test]
    fn canonical_json_stable_under_whitespace() {
        let a: Value = serde_json::from_str(r#"{"a":1,"b":2}"#).unwrap();
        let b: Value = serde_json::from_str("{\n  \"b\": 2,\n  \"a\": 1\n}").unwrap();
        assert_eq!(canonical_json(&a), canonical_json(&b));
    }

    #[test]
    fn parameters_hash_matches_for_equivalent_params() {
        let a = json!({"topic": "rust", "limit": 10});
        let b = json!({"limit": 10, "topic": "rust"});
        assert_eq!(parameters_hash(&a), parameters_hash(&b));
    }

    #[test]
    fn parameters_hash_differs_for_different_params() {
        let a = json!({"topic": "rust", "limit": 10});
        let b = json!({"topic": "rust", "limit": 11});
        assert_ne!(parameters_hash(&a), parameters_hash(&b));
    }

    #[test]
    fn normalise_text_ignores_case_and_spacing() {
        let a = normalise_text("Hello    World\n");
        let b = normalise_text("hello world");
        assert_eq!(a, b);
        assert_eq!(content_hash(&a), content_hash(&b));
    }
}
