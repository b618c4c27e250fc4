//! Subscriber credential tokens
//!
//! The token is the first 8 bytes of `SHA-256(username ":" password)`,
//! rendered as 16 lowercase hex characters, and travels in the `token` query
//! parameter. Sixty-four bits carried in a URL end up in proxy and access
//! logs; treat it as a shared key for a trusted network, not as strong
//! authentication. An `Authorization: Bearer` header is accepted as well.

use sha2::{Digest, Sha256};

/// Length of a token in hex characters
pub const TOKEN_LEN: usize = 16;

/// Expected credential token
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    /// Derive the token for a username/password pair
    pub fn derive(username: &str, password: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(username.as_bytes());
        hasher.update(b":");
        hasher.update(password.as_bytes());
        let digest = hasher.finalize();

        Self(hex::encode(&digest[..TOKEN_LEN / 2]))
    }

    /// Token for the configured credentials, if any
    ///
    /// Authentication is enabled as soon as either field is non-empty.
    pub fn from_credentials(username: &str, password: &str) -> Option<Self> {
        if username.is_empty() && password.is_empty() {
            None
        } else {
            Some(Self::derive(username, password))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check a presented token
    ///
    /// Length and content must match exactly. The comparison does not
    /// short-circuit on the first differing byte.
    pub fn verify(&self, candidate: &str) -> bool {
        let expected = self.0.as_bytes();
        let candidate = candidate.as_bytes();
        if candidate.len() != expected.len() {
            return false;
        }

        expected
            .iter()
            .zip(candidate)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

impl std::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AuthToken(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_shape() {
        let token = AuthToken::derive("user", "secret");

        assert_eq!(token.as_str().len(), TOKEN_LEN);
        assert!(token.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_token_is_digest_prefix() {
        let digest = Sha256::digest(b"user:secret");
        let token = AuthToken::derive("user", "secret");

        assert_eq!(token.as_str(), hex::encode(&digest[..8]));
    }

    #[test]
    fn test_known_digest_prefix() {
        // SHA-256("") starts with e3b0c44298fc1c14; ":" alone is the empty pair
        let digest = Sha256::digest(b"");
        assert_eq!(hex::encode(&digest[..8]), "e3b0c44298fc1c14");
        assert_ne!(AuthToken::derive("", "").as_str(), "e3b0c44298fc1c14");
    }

    #[test]
    fn test_disabled_without_credentials() {
        assert!(AuthToken::from_credentials("", "").is_none());
        assert!(AuthToken::from_credentials("user", "").is_some());
        assert!(AuthToken::from_credentials("", "pass").is_some());
    }

    #[test]
    fn test_verify() {
        let token = AuthToken::derive("user", "secret");
        let good = token.as_str().to_string();

        assert!(token.verify(&good));
        assert!(!token.verify(&good[..15]));
        assert!(!token.verify(&format!("{good}0")));
        assert!(!token.verify(""));
    }

    #[test]
    fn test_debug_hides_token() {
        let token = AuthToken::derive("user", "secret");
        assert_eq!(format!("{token:?}"), "AuthToken(..)");
    }
}
