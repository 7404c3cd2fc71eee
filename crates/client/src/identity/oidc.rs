//! OpenID Connect provider over a Keycloak realm.
//!
//! Endpoints follow the realm layout
//! `{base}/realms/{realm}/protocol/openid-connect/{auth,registrations,token,logout}`.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, instrument, warn};

use super::{AuthorizationParams, IdentityError, IdentityProvider, TokenResponse, TokenSet};
use crate::config::OidcConfig;

/// Scopes requested at login.
const SCOPES: &str = "openid email profile";

/// OpenID Connect client for a single realm.
#[derive(Clone)]
pub struct OidcProvider {
    inner: Arc<OidcProviderInner>,
}

struct OidcProviderInner {
    client: reqwest::Client,
    /// `{base}/realms/{realm}/protocol/openid-connect`
    endpoint: String,
    client_id: String,
    client_secret: Option<SecretString>,
    redirect_uri: String,
    post_logout_redirect_uri: String,
}

impl OidcProvider {
    /// Create a provider client from configuration.
    #[must_use]
    pub fn new(config: &OidcConfig, client: reqwest::Client) -> Self {
        let endpoint = format!(
            "{}/realms/{}/protocol/openid-connect",
            config.base_url.as_str().trim_end_matches('/'),
            urlencoding::encode(&config.realm)
        );

        Self {
            inner: Arc::new(OidcProviderInner {
                client,
                endpoint,
                client_id: config.client_id.clone(),
                client_secret: config
                    .client_secret()
                    .map(|secret| SecretString::from(secret.to_string())),
                redirect_uri: config.redirect_uri.clone(),
                post_logout_redirect_uri: site_root(&config.redirect_uri),
            }),
        }
    }

    /// Get the OAuth client ID.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.inner.client_id
    }

    fn browser_url(&self, action: &str, params: AuthorizationParams<'_>) -> String {
        format!(
            "{}/{action}?\
            client_id={}&\
            response_type=code&\
            redirect_uri={}&\
            scope={}&\
            state={}&\
            nonce={}&\
            code_challenge={}&\
            code_challenge_method=S256",
            self.inner.endpoint,
            urlencoding::encode(&self.inner.client_id),
            urlencoding::encode(&self.inner.redirect_uri),
            urlencoding::encode(SCOPES),
            urlencoding::encode(params.state),
            urlencoding::encode(params.nonce),
            urlencoding::encode(params.code_challenge)
        )
    }

    /// POST a form to the token endpoint and parse the token set.
    async fn token_request(&self, params: &[(&str, &str)]) -> Result<TokenSet, IdentityError> {
        let url = format!("{}/token", self.inner.endpoint);

        let mut form: Vec<(&str, &str)> = params.to_vec();
        form.push(("client_id", self.inner.client_id.as_str()));
        if let Some(secret) = &self.inner.client_secret {
            form.push(("client_secret", secret.expose_secret()));
        }

        let response = self.inner.client.post(&url).form(&form).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Token request rejected");
            return Err(IdentityError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let token_response: TokenResponse = response.json().await?;
        TokenSet::from_response(token_response, chrono::Utc::now().timestamp())
    }
}

#[async_trait]
impl IdentityProvider for OidcProvider {
    fn authorization_url(&self, params: AuthorizationParams<'_>) -> String {
        self.browser_url("auth", params)
    }

    fn registration_url(&self, params: AuthorizationParams<'_>) -> String {
        self.browser_url("registrations", params)
    }

    fn logout_url(&self, id_token: Option<&str>) -> String {
        let mut url = format!(
            "{}/logout?client_id={}&post_logout_redirect_uri={}",
            self.inner.endpoint,
            urlencoding::encode(&self.inner.client_id),
            urlencoding::encode(&self.inner.post_logout_redirect_uri)
        );
        if let Some(id_token) = id_token {
            url.push_str("&id_token_hint=");
            url.push_str(&urlencoding::encode(id_token));
        }
        url
    }

    #[instrument(skip_all)]
    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<TokenSet, IdentityError> {
        let tokens = self
            .token_request(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.inner.redirect_uri.as_str()),
                ("code_verifier", code_verifier),
            ])
            .await?;
        debug!(subject = %tokens.claims.sub, "Exchanged authorization code");
        Ok(tokens)
    }

    #[instrument(skip_all)]
    async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, IdentityError> {
        let tokens = self
            .token_request(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .await?;
        debug!(expires_at = tokens.expires_at, "Refreshed access token");
        Ok(tokens)
    }

    #[instrument(skip_all)]
    async fn end_session(&self, refresh_token: &str) -> Result<(), IdentityError> {
        let url = format!("{}/logout", self.inner.endpoint);

        let mut form = vec![
            ("client_id", self.inner.client_id.as_str()),
            ("refresh_token", refresh_token),
        ];
        if let Some(secret) = &self.inner.client_secret {
            form.push(("client_secret", secret.expose_secret()));
        }

        let response = self.inner.client.post(&url).form(&form).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IdentityError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

/// Origin of the redirect URI with a root path, used as the post-logout target.
fn site_root(redirect_uri: &str) -> String {
    url::Url::parse(redirect_uri).map_or_else(
        |_| redirect_uri.to_string(),
        |mut url| {
            url.set_path("/");
            url.set_query(None);
            url.set_fragment(None);
            url.to_string()
        },
    )
}
