//! Storage key derivation.
//!
//! Service keys are arbitrary strings chosen by callers. Before they reach a
//! storage adapter they are hashed with SHA-256 so every backend, the
//! filesystem included, sees a fixed-length key made of `[0-9a-f_]` only.

use sha2::{Digest, Sha256};

/// Prefix of every storage key produced by [`storage_key`].
pub const STORAGE_KEY_PREFIX: &str = "cb_";

/// Derives the storage key for a service key: `"cb_" + hex(sha256(service_key))`.
///
/// # Examples
///
/// ```rust
/// use durable_breaker::storage_key;
///
/// let key = storage_key("payments-api");
/// assert!(key.starts_with("cb_"));
/// assert_eq!(key.len(), 3 + 64);
/// ```
pub fn storage_key(service_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(service_key.as_bytes());
    format!("{}{}", STORAGE_KEY_PREFIX, hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digest() {
        // sha256("") is a well-known constant.
        assert_eq!(
            storage_key(""),
            "cb_e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_path_unsafe_keys_are_neutralised() {
        let key = storage_key("../../etc/passwd");
        let digest = key.strip_prefix(STORAGE_KEY_PREFIX).unwrap();
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(!key.contains('/') && !key.contains('.'));
    }

    #[test]
    fn test_distinct_services_get_distinct_keys() {
        assert_ne!(storage_key("a"), storage_key("b"));
        assert_eq!(storage_key("a"), storage_key("a"));
    }
}
