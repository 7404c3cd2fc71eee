//! Access token claims.
//!
//! The payload segment of the JWT is decoded without checking the signature.
//! The backend verifies every token it receives; the client only reads the
//! claims to learn the expiry and the realm roles.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::Deserialize;
use shopfront_core::Role;

use super::IdentityError;

/// Claims carried by an access token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Claims {
    /// Subject (the provider's user ID).
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub preferred_username: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// Expiry, seconds since the epoch.
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub realm_access: Option<RealmAccess>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RealmAccess {
    #[serde(default)]
    pub roles: Vec<String>,
}

impl Claims {
    /// Decode the claims of a compact-serialized JWT.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::InvalidToken` if the token is not three
    /// dot-separated segments or the payload is not base64url JSON.
    pub fn decode(token: &str) -> Result<Self, IdentityError> {
        let mut segments = token.split('.');
        let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
            (Some(_), Some(payload), Some(_), None) => payload,
            _ => {
                return Err(IdentityError::InvalidToken(
                    "expected three segments".to_string(),
                ));
            }
        };

        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|e| IdentityError::InvalidToken(format!("payload encoding: {e}")))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| IdentityError::InvalidToken(format!("payload json: {e}")))
    }

    /// Realm roles granted to the user.
    #[must_use]
    pub fn roles(&self) -> &[String] {
        self.realm_access
            .as_ref()
            .map(|access| access.roles.as_slice())
            .unwrap_or_default()
    }

    /// Role implied by the realm roles.
    #[must_use]
    pub fn role(&self) -> Role {
        Role::from_realm_roles(self.roles())
    }

    /// Best human-readable name: full name, then username, then email.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.preferred_username.as_deref())
            .or(self.email.as_deref())
            .unwrap_or(&self.sub)
    }
}
