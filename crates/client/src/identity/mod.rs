//! Identity provider integration.
//!
//! # Architecture
//!
//! - [`IdentityProvider`] is the seam to the external OpenID Connect provider:
//!   it builds browser URLs and performs the token grants.
//! - [`OidcProvider`] implements it against a Keycloak-style realm.
//! - [`TokenHolder`] keeps the current [`TokenSet`] and refreshes it on demand,
//!   so every API request carries a token with enough validity left.
//!
//! # Flow
//!
//! ```text
//! authorization_url ──▶ browser login ──▶ callback ?code&state
//!                                             │
//!                        exchange_code ◀──────┘
//!                              │
//!                         TokenHolder ──▶ ensure_fresh ──▶ refresh grant
//! ```

mod claims;
mod holder;
mod oidc;
mod pkce;

pub use claims::{Claims, RealmAccess};
pub use holder::TokenHolder;
pub use oidc::OidcProvider;
pub use pkce::{Pkce, generate_random_string};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

#[cfg(test)]
pub(crate) use claims::tests::make_token;

/// Errors from the identity provider or the held tokens.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// HTTP request to the provider failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider rejected a token request.
    #[error("Provider rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    /// A token could not be decoded.
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// No tokens are held.
    #[error("No active session")]
    NoSession,

    /// The access token expired and cannot be refreshed.
    #[error("Session expired")]
    Expired,

    /// The callback URL is not a usable login callback.
    #[error("Invalid callback: {0}")]
    InvalidCallback(String),

    /// The callback `state` does not match the pending login.
    #[error("State mismatch in login callback")]
    StateMismatch,
}

/// Token endpoint response.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub refresh_expires_in: Option<i64>,
    #[serde(default)]
    pub id_token: Option<String>,
}

/// Tokens issued for the current login.
///
/// Implements `Debug` manually to redact tokens.
#[derive(Clone)]
pub struct TokenSet {
    access_token: SecretString,
    refresh_token: Option<SecretString>,
    id_token: Option<SecretString>,
    /// Access token expiry, seconds since the epoch.
    pub expires_at: i64,
    /// Refresh token expiry, when the provider reports one.
    pub refresh_expires_at: Option<i64>,
    pub claims: Claims,
}

impl std::fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSet")
            .field("subject", &self.claims.sub)
            .field("expires_at", &self.expires_at)
            .field("refresh_expires_at", &self.refresh_expires_at)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .finish_non_exhaustive()
    }
}

impl TokenSet {
    /// Build a token set from a token endpoint response received at `now`.
    ///
    /// The access token's `exp` claim wins over `expires_in`.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::InvalidToken` if the access token cannot be
    /// decoded.
    pub fn from_response(response: TokenResponse, now: i64) -> Result<Self, IdentityError> {
        let claims = Claims::decode(&response.access_token)?;
        let expires_at = claims
            .exp
            .or_else(|| response.expires_in.map(|secs| now + secs))
            .unwrap_or(now);

        Ok(Self {
            access_token: SecretString::from(response.access_token),
            refresh_token: response.refresh_token.map(SecretString::from),
            id_token: response.id_token.map(SecretString::from),
            expires_at,
            refresh_expires_at: response
                .refresh_expires_in
                .filter(|secs| *secs > 0)
                .map(|secs| now + secs),
            claims,
        })
    }

    /// Check whether the access token expires within `seconds` of `now`.
    #[must_use]
    pub const fn expires_within(&self, seconds: i64, now: i64) -> bool {
        now >= self.expires_at - seconds
    }

    /// Check if a refresh token is available and not expired.
    #[must_use]
    pub fn can_refresh(&self, now: i64) -> bool {
        self.refresh_token.is_some()
            && self
                .refresh_expires_at
                .is_none_or(|expires_at| now < expires_at)
    }

    #[must_use]
    pub const fn access_token(&self) -> &SecretString {
        &self.access_token
    }

    #[must_use]
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_ref().map(ExposeSecret::expose_secret)
    }

    #[must_use]
    pub fn id_token(&self) -> Option<&str> {
        self.id_token.as_ref().map(ExposeSecret::expose_secret)
    }
}

/// Parameters of one authorization request.
#[derive(Debug, Clone, Copy)]
pub struct AuthorizationParams<'a> {
    pub state: &'a str,
    pub nonce: &'a str,
    pub code_challenge: &'a str,
}

/// The external OpenID Connect provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// URL of the provider's login page.
    fn authorization_url(&self, params: AuthorizationParams<'_>) -> String;

    /// URL of the provider's self-registration page.
    fn registration_url(&self, params: AuthorizationParams<'_>) -> String;

    /// URL that ends the provider's browser session.
    fn logout_url(&self, id_token: Option<&str>) -> String;

    /// Exchange an authorization code for tokens.
    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<TokenSet, IdentityError>;

    /// Obtain a new token set with a refresh token.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, IdentityError>;

    /// Revoke the provider-side session.
    async fn end_session(&self, refresh_token: &str) -> Result<(), IdentityError>;
}


#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn response(claims: &serde_json::Value) -> TokenResponse {
        TokenResponse {
            access_token: make_token(claims),
            expires_in: Some(300),
            refresh_token: Some("r".to_string()),
            refresh_expires_in: Some(1800),
            id_token: None,
        }
    }

    #[test]
    fn test_expiry_prefers_exp_claim() {
        let tokens =
            TokenSet::from_response(response(&serde_json::json!({"sub": "a", "exp": 5000})), 1000)
                .unwrap();
        assert_eq!(tokens.expires_at, 5000);
        assert_eq!(tokens.refresh_expires_at, Some(2800));

        let tokens =
            TokenSet::from_response(response(&serde_json::json!({"sub": "a"})), 1000).unwrap();
        assert_eq!(tokens.expires_at, 1300);
    }

    #[test]
    fn test_expires_within() {
        let tokens =
            TokenSet::from_response(response(&serde_json::json!({"sub": "a", "exp": 1100})), 1000)
                .unwrap();
        assert!(!tokens.expires_within(60, 1000));
        assert!(tokens.expires_within(60, 1040));
        assert!(tokens.expires_within(0, 1100));
    }

    #[test]
    fn test_can_refresh() {
        let tokens =
            TokenSet::from_response(response(&serde_json::json!({"sub": "a"})), 1000).unwrap();
        assert!(tokens.can_refresh(2000));
        assert!(!tokens.can_refresh(2800));
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let tokens =
            TokenSet::from_response(response(&serde_json::json!({"sub": "a"})), 1000).unwrap();
        let debug_output = format!("{tokens:?}");
        assert!(!debug_output.contains(tokens.access_token().expose_secret()));
        assert!(debug_output.contains("has_refresh_token"));
    }
}
