//! Payload construction and metadata sanitization for indexed chunks.

use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};

/// Metadata keys clients and loaders are allowed to attach to a chunk.
///
/// `gcp_url` is a legacy alias accepted on input and stored as `storage_url`.
const ALLOWED_METADATA_KEYS: [&str; 7] = [
    "source",
    "page",
    "filename",
    "project_id",
    "collection_name",
    "storage_url",
    "gcp_url",
];

/// Filter chunk metadata down to the allow-listed scalar fields.
///
/// Nested objects and arrays are dropped even under an allowed key, and the
/// legacy `gcp_url` key is renamed to `storage_url` on the way through.
pub fn sanitize_chunk_metadata(metadata: &Map<String, Value>) -> Map<String, Value> {
    let mut sanitized = Map::new();
    for key in ALLOWED_METADATA_KEYS {
        let Some(value) = metadata.get(key) else {
            continue;
        };
        if !matches!(
            value,
            Value::String(_) | Value::Number(_) | Value::Bool(_)
        ) {
            tracing::debug!(key, "Dropping non-scalar metadata value");
            continue;
        }
        let stored_key = if key == "gcp_url" { "storage_url" } else { key };
        if !sanitized.contains_key(stored_key) {
            sanitized.insert(stored_key.to_string(), value.clone());
        }
    }
    sanitized
}

/// Assemble the payload stored alongside a chunk vector.
///
/// Sanitized metadata comes first, then the reserved fields; a reserved field
/// always wins over a metadata key of the same name.
pub fn build_payload(
    text: &str,
    chunk_hash: &str,
    timestamp: &str,
    metadata: &Map<String, Value>,
) -> Map<String, Value> {
    let mut payload = sanitize_chunk_metadata(metadata);
    payload.insert("text".into(), json!(text));
    payload.insert("chunk_hash".into(), json!(chunk_hash));
    payload.insert("timestamp".into(), json!(timestamp));
    payload
}

/// Deterministic identity hash of a chunk's text.
pub fn compute_chunk_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Current UTC time formatted as RFC 3339, used as the payload timestamp.
pub fn current_timestamp_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_metadata() -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("source".into(), json!("physics.pdf"));
        map.insert("page".into(), json!(12));
        map.insert("gcp_url".into(), json!("https://storage.example/physics.pdf"));
        map.insert("secret_note".into(), json!("should vanish"));
        map.insert("nested".into(), json!({"a": 1}));
        map
    }

    #[test]
    fn sanitize_keeps_allowed_scalars_only() {
        let sanitized = sanitize_chunk_metadata(&raw_metadata());
        assert_eq!(sanitized.get("source"), Some(&json!("physics.pdf")));
        assert_eq!(sanitized.get("page"), Some(&json!(12)));
        assert!(!sanitized.contains_key("secret_note"));
        assert!(!sanitized.contains_key("nested"));
    }

    #[test]
    fn sanitize_renames_gcp_url() {
        let sanitized = sanitize_chunk_metadata(&raw_metadata());
        assert_eq!(
            sanitized.get("storage_url"),
            Some(&json!("https://storage.example/physics.pdf"))
        );
        assert!(!sanitized.contains_key("gcp_url"));
    }

    #[test]
    fn sanitize_drops_non_scalar_under_allowed_key() {
        let mut map = Map::new();
        map.insert("source".into(), json!(["a", "b"]));
        let sanitized = sanitize_chunk_metadata(&map);
        assert!(sanitized.is_empty());
    }

    #[test]
    fn build_payload_reserved_fields_win() {
        let mut map = raw_metadata();
        map.insert("text".into(), json!("spoofed"));
        let payload = build_payload("real chunk text", "abc123", "2026-01-01T00:00:00Z", &map);
        assert_eq!(payload.get("text"), Some(&json!("real chunk text")));
        assert_eq!(payload.get("chunk_hash"), Some(&json!("abc123")));
        assert_eq!(payload.get("timestamp"), Some(&json!("2026-01-01T00:00:00Z")));
    }

    #[test]
    fn chunk_hash_is_deterministic_and_distinct() {
        assert_eq!(compute_chunk_hash("abc"), compute_chunk_hash("abc"));
        assert_ne!(compute_chunk_hash("abc"), compute_chunk_hash("abd"));
    }
}
