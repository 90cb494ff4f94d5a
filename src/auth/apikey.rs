use rand::Rng;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

const KEY_PREFIX: &str = "zk";
const KEY_BYTES: usize = 32;
/// Characters of the raw key stored and shown for identification,
/// e.g. "zk_3f9a02c1".
const DISPLAY_PREFIX_LENGTH: usize = 11;

/// Generates a new API key with the format: zk_<64 hex chars>
/// Returns (raw_key, prefix, hash). The raw key is shown once; only its
/// SHA-256 digest is stored, so lookups are a single indexed query.
#[must_use]
pub fn generate_key() -> (String, String, String) {
    let mut bytes = [0u8; KEY_BYTES];
    rand::thread_rng().fill(&mut bytes);
    let raw_key = format!("{KEY_PREFIX}_{}", hex::encode(bytes));
    let prefix = raw_key[..DISPLAY_PREFIX_LENGTH].to_string();
    let hash = hash_key(&raw_key);
    (raw_key, prefix, hash)
}

/// Hashes a raw key for storage and lookup
#[must_use]
pub fn hash_key(raw_key: &str) -> String {
    hex::encode(Sha256::digest(raw_key.as_bytes()))
}

/// Validates the shape of a presented key before any store lookup
pub fn validate_key_format(raw_key: &str) -> Result<()> {
    let Some(body) = raw_key.strip_prefix(&format!("{KEY_PREFIX}_")) else {
        return Err(Error::InvalidKeyFormat);
    };
    if body.len() != KEY_BYTES * 2 || !body.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(Error::InvalidKeyFormat);
    }
    Ok(())
}

/// Whether an Authorization bearer credential looks like an API key rather
/// than some other token type.
#[must_use]
pub fn is_api_key(credential: &str) -> bool {
    credential.starts_with(&format!("{KEY_PREFIX}_"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_format() {
        let (raw_key, prefix, hash) = generate_key();

        assert!(raw_key.starts_with("zk_"));
        assert_eq!(raw_key.len(), 3 + 64);
        assert_eq!(prefix.len(), 11);
        assert!(raw_key.starts_with(&prefix));
        assert_eq!(hash.len(), 64);
        validate_key_format(&raw_key).unwrap();
    }

    #[test]
    fn test_hash_is_deterministic() {
        let (raw_key, _, hash) = generate_key();
        assert_eq!(hash_key(&raw_key), hash);
    }

    #[test]
    fn test_keys_are_unique() {
        let (first, _, _) = generate_key();
        let (second, _, _) = generate_key();
        assert_ne!(first, second);
    }

    #[test]
    fn test_validate_rejects_bad_shapes() {
        assert!(validate_key_format("nope").is_err());
        assert!(validate_key_format("zk_short").is_err());
        assert!(validate_key_format(&format!("zk_{}", "g".repeat(64))).is_err());
        assert!(validate_key_format(&format!("ak_{}", "0".repeat(64))).is_err());
    }

    #[test]
    fn test_is_api_key() {
        assert!(is_api_key("zk_anything"));
        assert!(!is_api_key("Bearer zk_"));
        assert!(!is_api_key("session-token"));
    }
}
