//! Holder for the current login's tokens.

use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use secrecy::{ExposeSecret, SecretString};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, instrument, warn};

use super::{Claims, IdentityError, IdentityProvider, TokenSet};

/// Called when held tokens are dropped because they can no longer be used.
type RevokedHook = Arc<dyn Fn() + Send + Sync>;

/// Shared, refresh-on-demand token store.
///
/// Clones share the same tokens. Concurrent callers that find the token close
/// to expiry wait on a single refresh instead of each starting their own.
///
/// Tokens that cannot be renewed are revoked: they are dropped and the hook
/// registered with [`TokenHolder::on_revoked`] runs.
#[derive(Clone)]
pub struct TokenHolder {
    inner: Arc<TokenHolderInner>,
}

struct TokenHolderInner {
    provider: Arc<dyn IdentityProvider>,
    tokens: RwLock<Option<TokenSet>>,
    refresh_lock: Mutex<()>,
    min_validity: i64,
    on_revoked: StdMutex<Option<RevokedHook>>,
}

impl TokenHolder {
    /// Create an empty holder.
    ///
    /// `min_validity` is the number of seconds of validity a token must have
    /// left to be used without refreshing first.
    #[must_use]
    pub fn new(provider: Arc<dyn IdentityProvider>, min_validity: i64) -> Self {
        Self {
            inner: Arc::new(TokenHolderInner {
                provider,
                tokens: RwLock::new(None),
                refresh_lock: Mutex::new(()),
                min_validity,
                on_revoked: StdMutex::new(None),
            }),
        }
    }

    /// The identity provider tokens are obtained from.
    #[must_use]
    pub fn provider(&self) -> &dyn IdentityProvider {
        self.inner.provider.as_ref()
    }

    /// Replace the held tokens.
    pub async fn set(&self, tokens: TokenSet) {
        *self.inner.tokens.write().await = Some(tokens);
    }

    /// Drop the held tokens, returning them.
    pub async fn clear(&self) -> Option<TokenSet> {
        self.inner.tokens.write().await.take()
    }

    /// Run `hook` whenever the tokens are revoked. Replaces any earlier hook.
    pub fn on_revoked(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self
            .inner
            .on_revoked
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(hook));
    }

    /// Drop tokens the provider or the backend no longer accepts.
    ///
    /// Unlike [`Self::clear`], this tells the revocation hook.
    pub async fn revoke(&self) {
        if self.clear().await.is_none() {
            return;
        }
        let hook = self
            .inner
            .on_revoked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(hook) = hook {
            hook();
        }
    }

    pub async fn is_authenticated(&self) -> bool {
        self.inner.tokens.read().await.is_some()
    }

    /// Claims of the held access token.
    pub async fn claims(&self) -> Option<Claims> {
        self.inner
            .tokens
            .read()
            .await
            .as_ref()
            .map(|tokens| tokens.claims.clone())
    }

    /// ID token of the held login, for the logout hint.
    pub async fn id_token(&self) -> Option<String> {
        self.inner
            .tokens
            .read()
            .await
            .as_ref()
            .and_then(|tokens| tokens.id_token().map(String::from))
    }

    /// Refresh token of the held login, for resuming it in a later process.
    pub async fn refresh_token(&self) -> Option<SecretString> {
        self.inner
            .tokens
            .read()
            .await
            .as_ref()
            .and_then(|tokens| tokens.refresh_token().map(SecretString::from))
    }

    /// Exchange an authorization code and hold the resulting tokens.
    ///
    /// # Errors
    ///
    /// Returns the provider's error; held tokens are left unchanged.
    #[instrument(skip_all)]
    pub async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<(), IdentityError> {
        let tokens = self.inner.provider.exchange_code(code, code_verifier).await?;
        self.set(tokens).await;
        Ok(())
    }

    /// Resume a login from a stored refresh token.
    ///
    /// # Errors
    ///
    /// Returns the provider's error if the refresh grant is refused.
    #[instrument(skip_all)]
    pub async fn restore(&self, refresh_token: &str) -> Result<(), IdentityError> {
        let tokens = self.inner.provider.refresh(refresh_token).await?;
        self.set(tokens).await;
        Ok(())
    }

    /// A bearer token with at least `min_validity` seconds left.
    ///
    /// Refreshes first when the held token is too close to expiry.
    ///
    /// # Errors
    ///
    /// - `IdentityError::NoSession` if no tokens are held
    /// - `IdentityError::Expired` if the token expired and cannot be refreshed
    /// - the provider's error if the refresh grant fails
    pub async fn access_token(&self) -> Result<SecretString, IdentityError> {
        self.ensure_fresh().await?;
        self.inner
            .tokens
            .read()
            .await
            .as_ref()
            .map(|tokens| tokens.access_token().clone())
            .ok_or(IdentityError::NoSession)
    }

    /// Refresh the held tokens if they expire within `min_validity`.
    ///
    /// A failed refresh revokes the tokens: a session that cannot be renewed
    /// is over.
    ///
    /// # Errors
    ///
    /// See [`Self::access_token`].
    pub async fn ensure_fresh(&self) -> Result<(), IdentityError> {
        if !self.needs_refresh().await? {
            return Ok(());
        }

        let _guard = self.inner.refresh_lock.lock().await;

        // Another caller may have refreshed while we waited for the lock
        if !self.needs_refresh().await? {
            return Ok(());
        }

        self.refresh_locked().await
    }

    /// Renew the tokens after the backend rejected `rejected`.
    ///
    /// Nothing is done if another caller already replaced that token.
    ///
    /// # Errors
    ///
    /// See [`Self::access_token`]. On error the tokens are revoked.
    pub async fn refresh_rejected(&self, rejected: &SecretString) -> Result<(), IdentityError> {
        let _guard = self.inner.refresh_lock.lock().await;

        let still_held = self
            .inner
            .tokens
            .read()
            .await
            .as_ref()
            .map(|tokens| tokens.access_token().expose_secret() == rejected.expose_secret())
            .ok_or(IdentityError::NoSession)?;
        if !still_held {
            return Ok(());
        }

        self.refresh_locked().await
    }

    /// Run the refresh grant. The caller holds `refresh_lock`.
    async fn refresh_locked(&self) -> Result<(), IdentityError> {
        let now = chrono::Utc::now().timestamp();
        let refresh_token = {
            let tokens = self.inner.tokens.read().await;
            match tokens.as_ref() {
                Some(tokens) if tokens.can_refresh(now) => {
                    tokens.refresh_token().map(String::from)
                }
                _ => None,
            }
        };

        let Some(refresh_token) = refresh_token else {
            warn!("Access token expiring and no usable refresh token");
            self.revoke().await;
            return Err(IdentityError::Expired);
        };

        match self.inner.provider.refresh(&refresh_token).await {
            Ok(tokens) => {
                debug!(expires_at = tokens.expires_at, "Access token refreshed");
                self.set(tokens).await;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed, dropping session");
                self.revoke().await;
                Err(e)
            }
        }
    }

    async fn needs_refresh(&self) -> Result<bool, IdentityError> {
        let now = chrono::Utc::now().timestamp();
        self.inner
            .tokens
            .read()
            .await
            .as_ref()
            .map(|tokens| tokens.expires_within(self.inner.min_validity, now))
            .ok_or(IdentityError::NoSession)
    }
}
