//! PKCE (RFC 7636) verifier/challenge generation.

use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;
use sha2::{Digest, Sha256};

/// The only challenge method the gateway issues.
pub const PKCE_METHOD_S256: &str = "S256";

/// Secret code verifier. Kept out of logs.
#[derive(Clone, PartialEq, Eq)]
pub struct PkceVerifier(String);

impl PkceVerifier {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PkceVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PkceVerifier([redacted])")
    }
}

/// One login attempt's verifier, its challenge and the challenge method.
#[derive(Debug, Clone)]
pub struct PkcePair {
    pub verifier: PkceVerifier,
    pub challenge: String,
    pub method: &'static str,
}

impl PkcePair {
    /// Generate a fresh pair.
    ///
    /// The verifier is 48 random bytes encoded as base64url (64 characters,
    /// all from the RFC 7636 unreserved set).
    #[must_use]
    pub fn generate() -> Self {
        let random_bytes: [u8; 48] = rand::rng().random();
        let verifier = URL_SAFE_NO_PAD.encode(random_bytes);
        let challenge = challenge_for(&verifier);

        Self {
            verifier: PkceVerifier(verifier),
            challenge,
            method: PKCE_METHOD_S256,
        }
    }
}

/// S256 transform: `BASE64URL(SHA256(verifier))` without padding.
#[must_use]
pub fn challenge_for(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}
