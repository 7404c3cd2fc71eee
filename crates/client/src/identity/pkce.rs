//! PKCE and CSRF helpers for the authorization code flow.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::Rng;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};

/// Generate a random alphanumeric string for `state`, `nonce` and verifiers.
#[must_use]
pub fn generate_random_string(length: usize) -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::rng();
    (0..length)
        .map(|_| {
            let idx = rng.random_range(0..CHARSET.len());
            CHARSET.get(idx).map_or('A', |b| char::from(*b))
        })
        .collect()
}

/// A PKCE verifier and its S256 challenge.
pub struct Pkce {
    verifier: SecretString,
    challenge: String,
}

impl Pkce {
    /// Verifier length; RFC 7636 allows 43 to 128 characters.
    const VERIFIER_LENGTH: usize = 64;

    /// Generate a fresh verifier.
    #[must_use]
    pub fn generate() -> Self {
        Self::from_verifier(generate_random_string(Self::VERIFIER_LENGTH))
    }

    fn from_verifier(verifier: String) -> Self {
        let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
        Self {
            verifier: SecretString::from(verifier),
            challenge,
        }
    }

    /// The `code_challenge` parameter.
    #[must_use]
    pub fn challenge(&self) -> &str {
        &self.challenge
    }

    /// The `code_verifier` sent with the code exchange.
    #[must_use]
    pub fn verifier(&self) -> &str {
        self.verifier.expose_secret()
    }

    /// Take ownership of the verifier once the challenge has been sent.
    #[must_use]
    pub fn into_verifier(self) -> SecretString {
        self.verifier
    }
}
