//! SHA-256 hashing for API keys.
//!
//! Raw keys are never persisted — only their hash, so a leaked database
//! backup doesn't hand out working credentials.

use sha2::{Digest, Sha256};

/// Hex-encode the SHA-256 digest of an API key.
#[must_use]
pub fn hash_api_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex_encode(&hasher.finalize())
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        write!(out, "{b:02x}").expect("writing to a String never fails");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_key_hashes_the_same() {
        assert_eq!(hash_api_key("sk-test-123"), hash_api_key("sk-test-123"));
    }

    #[test]
    fn different_keys_hash_differently() {
        assert_ne!(hash_api_key("sk-test-123"), hash_api_key("sk-test-456"));
    }

    #[test]
    fn hash_is_64_hex_chars() {
        let h = hash_api_key("sk-test-123");
        assert_eq!(h.len(), 64);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
