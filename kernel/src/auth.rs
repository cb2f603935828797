//! Bearer/API-key authentication for the `/a2a` and `/discover` endpoints.
//!
//! The shared-secret check here follows `server/gateway/src/auth.rs`'s
//! `ApiKeyStore::verify` (reject on no match, one credential kind at a
//! time), strengthened with `subtle::ConstantTimeEq` — the same crate
//! `ryanmaclean-tundra/crates/at-bridge/src/auth.rs` uses to compare
//! bearer tokens — over a SHA-256 digest of both sides so the comparison
//! itself leaks no timing signal about how many leading bytes matched.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Shared-secret authenticator. `/health` and the agent-card endpoint are
/// exempt per spec §4.1; every other route on the protocol surface must
/// pass `validate`.
#[derive(Clone)]
pub struct ApiKeyAuth {
    expected: String,
}

impl ApiKeyAuth {
    pub fn new(expected: impl Into<String>) -> Self {
        Self {
            expected: expected.into(),
        }
    }

    /// Validate a raw `Authorization` header value, accepting either
    /// `Bearer <key>` or a bare API key.
    pub fn validate(&self, header: &str) -> bool {
        let provided = header.strip_prefix("Bearer ").unwrap_or(header);
        let expected_hash = Sha256::digest(self.expected.as_bytes());
        let provided_hash = Sha256::digest(provided.as_bytes());
        expected_hash.ct_eq(&provided_hash).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_bearer_prefixed_key() {
        let auth = ApiKeyAuth::new("secret-token");
        assert!(auth.validate("Bearer secret-token"));
    }

    #[test]
    fn accepts_bare_key() {
        let auth = ApiKeyAuth::new("secret-token");
        assert!(auth.validate("secret-token"));
    }

    #[test]
    fn rejects_wrong_key() {
        let auth = ApiKeyAuth::new("secret-token");
        assert!(!auth.validate("Bearer wrong"));
    }
}
