//! API key and tenant id generation, hashing and header parsing

use crate::core::constants::{
    API_KEY_PREFIX, API_KEY_PREFIX_DISPLAY_LEN, API_KEY_RANDOM_BYTES, TENANT_ID_PREFIX,
    TENANT_ID_RANDOM_BYTES,
};
use crate::utils::crypto::{generate_token, sha256_hex};

/// Generate opaque API key: ax_live_{48 hex chars}
pub fn generate_api_key() -> String {
    format!("{}{}", API_KEY_PREFIX, generate_token(API_KEY_RANDOM_BYTES))
}

/// Generate tenant id: tn_{24 hex chars}
pub fn generate_tenant_id() -> String {
    format!("{}{}", TENANT_ID_PREFIX, generate_token(TENANT_ID_RANDOM_BYTES))
}

/// SHA-256 of the raw key (hex encoded); only this is ever stored
pub fn hash_api_key(key: &str) -> String {
    sha256_hex(key)
}

/// Extract prefix for display (first 12 chars, e.g., "ax_live_1a2b")
pub fn key_prefix(key: &str) -> String {
    key.chars().take(API_KEY_PREFIX_DISPLAY_LEN).collect()
}

/// Extract the token from an `Authorization: Bearer <token>` value
pub fn extract_bearer(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_api_key() {
        let key = generate_api_key();
        assert!(key.starts_with(API_KEY_PREFIX));
        assert_eq!(key.len(), API_KEY_PREFIX.len() + API_KEY_RANDOM_BYTES * 2);
        assert!(key[API_KEY_PREFIX.len()..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_generate_api_key_uniqueness() {
        assert_ne!(generate_api_key(), generate_api_key());
    }

    #[test]
    fn test_generate_tenant_id() {
        let id = generate_tenant_id();
        assert!(id.starts_with("tn_"));
        assert_eq!(id.len(), 3 + 24);
    }

    #[test]
    fn test_hash_api_key() {
        let key = "ax_live_0123456789abcdef";
        let hash = hash_api_key(key);
        assert_eq!(hash, hash_api_key(key));
        assert_eq!(hash.len(), 64);
        assert_ne!(hash, hash_api_key("ax_live_other"));
    }

    #[test]
    fn test_key_prefix() {
        assert_eq!(key_prefix("ax_live_1a2b3c4d5e6f"), "ax_live_1a2b");
        assert_eq!(key_prefix("short"), "short");
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer("Bearer abc123"), Some("abc123"));
        assert_eq!(extract_bearer("Bearer  abc123 "), Some("abc123"));
        assert_eq!(extract_bearer("Bearer "), None);
        assert_eq!(extract_bearer("Basic abc123"), None);
        assert_eq!(extract_bearer("abc123"), None);
    }
}
