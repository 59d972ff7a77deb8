//! Admin key verification

use crate::utils::api_key::extract_bearer;
use crate::utils::crypto::{constant_time_eq, sha256_hex};

/// Holds only the SHA-256 digest of the configured admin key
pub struct AdminAuth {
    key_digest: String,
}

impl AdminAuth {
    pub fn new(admin_key: &str) -> Self {
        Self {
            key_digest: sha256_hex(admin_key),
        }
    }

    /// Digests are compared so the check is independent of the presented length
    pub fn verify(&self, authorization: Option<&str>) -> bool {
        authorization
            .and_then(extract_bearer)
            .is_some_and(|token| constant_time_eq(&sha256_hex(token), &self.key_digest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify() {
        let admin = AdminAuth::new("root-key");
        assert!(admin.verify(Some("Bearer root-key")));
        assert!(!admin.verify(Some("Bearer root-key2")));
        assert!(!admin.verify(Some("root-key")));
        assert!(!admin.verify(None));
    }
}
