//! Application state wiring every client component together.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::info;

use crate::account::CustomerAccount;
use crate::api::StoreApi;
use crate::back_office::BackOffice;
use crate::cart::CartSync;
use crate::config::ClientConfig;
use crate::error::Result;
use crate::gateway::{ApiError, ApiGateway, GatewayOptions};
use crate::guard::{GuardDecision, RouteGuard};
use crate::identity::{OidcProvider, TokenHolder};
use crate::navigation::Route;
use crate::session::{SessionContext, SessionState};
use crate::wishlist::WishlistSync;

/// Shared client state.
///
/// This struct is cheaply cloneable via `Arc`. Build it once at startup and
/// hand clones to whatever needs the session, the mirrors or the API.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ClientConfig,
    api: StoreApi,
    session: SessionContext,
    cart: CartSync,
    wishlist: WishlistSync,
}

impl AppState {
    /// Build the client from configuration. Nothing is fetched yet; call
    /// [`SessionContext::initialize`] (or `restore`) next.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Api` if an HTTP client cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(ApiError::from)?;
        let provider = Arc::new(OidcProvider::new(&config.oidc, http));
        let tokens = TokenHolder::new(provider, config.token_min_validity_secs);

        let gateway = ApiGateway::new(
            &config.api_base_url,
            tokens.clone(),
            GatewayOptions::from_config(&config),
        )?;
        let api = StoreApi::new(gateway, config.catalog_cache_ttl);

        Ok(Self::from_parts(config, api, tokens))
    }

    /// Build the client around an existing API client and token holder.
    #[must_use]
    pub fn from_parts(config: ClientConfig, api: StoreApi, tokens: TokenHolder) -> Self {
        let session = SessionContext::new(tokens, Arc::new(api.clone()));
        let cart = CartSync::new(Arc::new(api.clone()), session.clone());
        let wishlist = WishlistSync::new(Arc::new(api.clone()), session.clone());

        Self {
            inner: Arc::new(AppStateInner {
                config,
                api,
                session,
                cart,
                wishlist,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn api(&self) -> &StoreApi {
        &self.inner.api
    }

    #[must_use]
    pub fn session(&self) -> &SessionContext {
        &self.inner.session
    }

    #[must_use]
    pub fn cart(&self) -> &CartSync {
        &self.inner.cart
    }

    #[must_use]
    pub fn wishlist(&self) -> &WishlistSync {
        &self.inner.wishlist
    }

    #[must_use]
    pub fn account(&self) -> CustomerAccount {
        CustomerAccount::new(self.inner.api.clone(), self.inner.session.clone())
    }

    #[must_use]
    pub fn back_office(&self) -> BackOffice {
        BackOffice::new(self.inner.api.clone(), self.inner.session.clone())
    }

    /// Guard decision for `route` under the current session.
    #[must_use]
    pub fn guard(&self, route: Route) -> GuardDecision {
        RouteGuard::new(route).evaluate(&self.inner.session.state())
    }

    /// Start the tasks that keep the mirrors following the session.
    ///
    /// Must be called from within a tokio runtime. The tasks stop when the
    /// returned handle is dropped.
    #[must_use]
    pub fn spawn_sync(&self) -> SyncTasks {
        let cart = tokio::spawn(
            self.inner
                .cart
                .clone()
                .run(self.inner.session.subscribe()),
        );
        let wishlist = tokio::spawn(
            self.inner
                .wishlist
                .clone()
                .run(self.inner.session.subscribe()),
        );
        SyncTasks { cart, wishlist }
    }

    /// Sign out and empty both mirrors before returning the provider
    /// logout URL.
    pub async fn logout(&self) -> String {
        let url = self.inner.session.logout().await;
        self.inner
            .cart
            .sync_with_session(&SessionState::Anonymous)
            .await;
        self.inner
            .wishlist
            .sync_with_session(&SessionState::Anonymous)
            .await;
        info!("Session and mirrors cleared");
        url
    }
}

/// Handles of the mirror tasks. Aborts them on drop.
pub struct SyncTasks {
    cart: JoinHandle<()>,
    wishlist: JoinHandle<()>,
}

impl Drop for SyncTasks {
    fn drop(&mut self) {
        self.cart.abort();
        self.wishlist.abort();
    }
}
