//! Session context: who is signed in, and with what role.
//!
//! [`SessionContext`] is created once at startup and passed to everything
//! that needs to know the user. State changes are published on a
//! `tokio::sync::watch` channel, so a subscriber always sees the latest
//! state and never a stale one.
//!
//! A session is never half-authenticated: if the backend profile cannot be
//! loaded after the provider issued tokens, the tokens are dropped and the
//! session is anonymous. Tokens revoked later (a refresh that fails, or the
//! backend rejecting them) end the session the same way.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use shopfront_core::Role;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::api::StoreApi;
use crate::error::{ClientError, Result, clear_sentry_user, set_sentry_user};
use crate::gateway::ApiError;
use crate::identity::{
    AuthorizationParams, IdentityError, Pkce, TokenHolder, generate_random_string,
};
use crate::models::{Identity, UserProfile};
use crate::navigation::{Navigation, Route};

/// Query or fragment parameters the provider appends to the callback URL.
const CALLBACK_PARAMS: [&str; 3] = ["code", "state", "session_state"];

/// Current session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Identity not resolved yet.
    Loading,
    Anonymous,
    Authenticated(Identity),
}

impl SessionState {
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    #[must_use]
    pub const fn identity(&self) -> Option<&Identity> {
        match self {
            Self::Authenticated(identity) => Some(identity),
            _ => None,
        }
    }

    #[must_use]
    pub fn role(&self) -> Option<Role> {
        self.identity().map(|identity| identity.role)
    }

    /// The identity if it holds `role`.
    ///
    /// # Errors
    ///
    /// - `ClientError::NotAuthenticated` if nobody is signed in
    /// - `ClientError::Forbidden` if the user holds another role
    pub fn require_role(&self, role: Role) -> Result<&Identity> {
        match self {
            Self::Authenticated(identity) if identity.role == role => Ok(identity),
            Self::Authenticated(_) => Err(ClientError::Forbidden { required: role }),
            Self::Loading | Self::Anonymous => Err(ClientError::NotAuthenticated),
        }
    }
}

/// Source of the backend's user record.
#[async_trait]
pub trait ProfileBackend: Send + Sync {
    async fn fetch_profile(&self) -> std::result::Result<UserProfile, ApiError>;
}

#[async_trait]
impl ProfileBackend for StoreApi {
    async fn fetch_profile(&self) -> std::result::Result<UserProfile, ApiError> {
        self.profile().await
    }
}

/// A login started in the browser and not yet completed.
struct PendingLogin {
    state: String,
    code_verifier: SecretString,
}

/// Session context shared by the whole client.
#[derive(Clone)]
pub struct SessionContext {
    inner: Arc<SessionContextInner>,
}

struct SessionContextInner {
    tokens: TokenHolder,
    profiles: Arc<dyn ProfileBackend>,
    state: watch::Sender<SessionState>,
    pending: Mutex<Option<PendingLogin>>,
    /// Set once the post-login redirect has fired; reset on logout.
    redirect_consumed: AtomicBool,
}

impl SessionContextInner {
    /// The tokens behind a signed-in session were revoked.
    fn end_revoked_session(&self) {
        let ended = self.state.send_if_modified(|state| {
            if state.is_authenticated() {
                *state = SessionState::Anonymous;
                true
            } else {
                false
            }
        });
        if ended {
            warn!("Session ended: tokens can no longer be renewed");
            self.redirect_consumed.store(false, Ordering::SeqCst);
            clear_sentry_user();
        }
    }
}

impl SessionContext {
    /// Create a context in the `Loading` state.
    ///
    /// The context watches `tokens`: when they are revoked, a signed-in
    /// session becomes `Anonymous`.
    #[must_use]
    pub fn new(tokens: TokenHolder, profiles: Arc<dyn ProfileBackend>) -> Self {
        let (state, _) = watch::channel(SessionState::Loading);
        let inner = Arc::new(SessionContextInner {
            tokens,
            profiles,
            state,
            pending: Mutex::new(None),
            redirect_consumed: AtomicBool::new(false),
        });

        let weak = Arc::downgrade(&inner);
        inner.tokens.on_revoked(move || {
            if let Some(inner) = weak.upgrade() {
                inner.end_revoked_session();
            }
        });

        Self { inner }
    }

    /// Receiver of state changes, starting from the current state.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// Snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenHolder {
        &self.inner.tokens
    }

    /// The signed-in identity if it holds `role`.
    ///
    /// # Errors
    ///
    /// See [`SessionState::require_role`].
    pub fn require_role(&self, role: Role) -> Result<Identity> {
        self.inner.state.borrow().require_role(role).cloned()
    }

    /// The signed-in identity, whatever its role.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::NotAuthenticated` if nobody is signed in.
    pub fn require_identity(&self) -> Result<Identity> {
        self.inner
            .state
            .borrow()
            .identity()
            .cloned()
            .ok_or(ClientError::NotAuthenticated)
    }

    /// Resolve the session at startup.
    ///
    /// `current_url` is the location the app was opened at. When it is the
    /// provider's login callback for a login started with [`Self::login`],
    /// the code is exchanged first. Otherwise whatever tokens the holder
    /// already has are used.
    ///
    /// Never fails: every failure ends in `Anonymous`. Returns where to go
    /// next, if anywhere.
    #[instrument(skip_all)]
    pub async fn initialize(&self, current_url: &str) -> Option<Navigation> {
        self.publish(SessionState::Loading);

        let location = parse_location(current_url);
        let has_pending = self.lock_pending().is_some();
        if has_pending && location.as_ref().is_some_and(has_callback_params) {
            return match self.complete_login(current_url).await {
                Ok(redirect) => redirect,
                Err(e) => {
                    warn!(error = %e, "Login callback failed");
                    None
                }
            };
        }

        match self.resolve().await {
            Ok(identity) => self.login_redirect(location.as_ref(), identity.role),
            Err(e) => {
                debug!(error = %e, "No session");
                None
            }
        }
    }

    /// Start a login. Returns the provider URL to open in the browser.
    #[must_use]
    pub fn login(&self) -> String {
        self.start_authorization(|provider, params| provider.authorization_url(params))
    }

    /// Start a registration. Returns the provider URL to open in the browser.
    #[must_use]
    pub fn register(&self) -> String {
        self.start_authorization(|provider, params| provider.registration_url(params))
    }

    /// Finish a login from the provider's callback URL.
    ///
    /// # Errors
    ///
    /// - `IdentityError::InvalidCallback` if the URL carries an error or no
    ///   code, or no login is pending
    /// - `IdentityError::StateMismatch` if `state` does not match
    /// - the provider's or backend's error if the exchange or the profile
    ///   fetch fails; the session is then `Anonymous`
    #[instrument(skip_all)]
    pub async fn complete_login(&self, callback_url: &str) -> Result<Option<Navigation>> {
        let location = parse_location(callback_url).ok_or_else(|| {
            IdentityError::InvalidCallback("not a URL".to_string())
        })?;

        let result = self.exchange_callback(&location).await;
        if let Err(e) = result {
            self.publish(SessionState::Anonymous);
            return Err(e);
        }

        let identity = self.resolve().await?;
        info!(role = %identity.role, "Login completed");
        Ok(self.login_redirect(Some(&location), identity.role))
    }

    /// Resume a session from a refresh token obtained earlier.
    ///
    /// # Errors
    ///
    /// Returns the provider's or backend's error; the session is then
    /// `Anonymous`.
    #[instrument(skip_all)]
    pub async fn restore(&self, refresh_token: &str) -> Result<Identity> {
        self.publish(SessionState::Loading);
        if let Err(e) = self.inner.tokens.restore(refresh_token).await {
            self.publish(SessionState::Anonymous);
            return Err(e.into());
        }
        self.resolve().await
    }

    /// Sign out.
    ///
    /// The local session is cleared and subscribers are notified before any
    /// network call. Provider-side revocation is best-effort. Returns the
    /// provider logout URL to open in the browser.
    #[instrument(skip_all)]
    pub async fn logout(&self) -> String {
        self.publish(SessionState::Anonymous);
        self.inner.redirect_consumed.store(false, Ordering::SeqCst);
        self.lock_pending().take();
        clear_sentry_user();

        let tokens = self.inner.tokens.clear().await;
        let id_token = tokens.as_ref().and_then(|t| t.id_token().map(String::from));
        let provider = self.inner.tokens.provider();

        if let Some(refresh_token) = tokens.as_ref().and_then(|t| t.refresh_token())
            && let Err(e) = provider.end_session(refresh_token).await
        {
            warn!(error = %e, "Provider logout failed");
        }

        info!("Logged out");
        provider.logout_url(id_token.as_deref())
    }

    /// Replace the signed-in identity after a profile change.
    ///
    /// Ignored unless the profile belongs to the signed-in user.
    pub fn update_identity(&self, profile: UserProfile) {
        self.inner.state.send_if_modified(|state| match state {
            SessionState::Authenticated(current) if current.subject == profile.subject => {
                *current = Identity::from(profile);
                true
            }
            _ => false,
        });
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    fn publish(&self, state: SessionState) {
        self.inner.state.send_replace(state);
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, Option<PendingLogin>> {
        self.inner
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn start_authorization(
        &self,
        build: impl FnOnce(
            &dyn crate::identity::IdentityProvider,
            AuthorizationParams<'_>,
        ) -> String,
    ) -> String {
        let state = generate_random_string(32);
        let nonce = generate_random_string(32);
        let pkce = Pkce::generate();

        let url = build(
            self.inner.tokens.provider(),
            AuthorizationParams {
                state: &state,
                nonce: &nonce,
                code_challenge: pkce.challenge(),
            },
        );

        *self.lock_pending() = Some(PendingLogin {
            state,
            code_verifier: pkce.into_verifier(),
        });
        url
    }

    async fn exchange_callback(&self, location: &Url) -> Result<()> {
        if let Some(error) = callback_param(location, "error") {
            let description = callback_param(location, "error_description").unwrap_or(error);
            return Err(IdentityError::InvalidCallback(description).into());
        }

        let code = callback_param(location, "code")
            .ok_or_else(|| IdentityError::InvalidCallback("missing code".to_string()))?;
        let state = callback_param(location, "state")
            .ok_or_else(|| IdentityError::InvalidCallback("missing state".to_string()))?;

        let pending = self
            .lock_pending()
            .take()
            .ok_or_else(|| IdentityError::InvalidCallback("no login in progress".to_string()))?;
        if pending.state != state {
            return Err(IdentityError::StateMismatch.into());
        }

        self.inner
            .tokens
            .exchange_code(&code, pending.code_verifier.expose_secret())
            .await?;
        Ok(())
    }

    /// Turn held tokens into an identity, or collapse to `Anonymous`.
    async fn resolve(&self) -> Result<Identity> {
        match self.fetch_identity().await {
            Ok(identity) => {
                set_sentry_user(&identity.id, identity.email.as_ref().map(|e| e.as_str()));
                self.publish(SessionState::Authenticated(identity.clone()));
                Ok(identity)
            }
            Err(e) => {
                if self.inner.tokens.clear().await.is_some() {
                    warn!(error = %e, "Discarding tokens: identity could not be resolved");
                }
                self.publish(SessionState::Anonymous);
                Err(e)
            }
        }
    }

    async fn fetch_identity(&self) -> Result<Identity> {
        if !self.inner.tokens.is_authenticated().await {
            return Err(ClientError::NotAuthenticated);
        }
        self.inner.tokens.ensure_fresh().await?;
        let profile = self.inner.profiles.fetch_profile().await?;
        Ok(Identity::from(profile))
    }

    /// Redirect to the role's landing page after login, at most once.
    fn login_redirect(&self, location: Option<&Url>, role: Role) -> Option<Navigation> {
        if !location.is_some_and(is_post_login_location) {
            return None;
        }
        if self.inner.redirect_consumed.swap(true, Ordering::SeqCst) {
            return None;
        }
        Some(Navigation::replace(Route::home_for(role)))
    }
}

/// Parse an absolute URL or a path relative to the site root.
fn parse_location(current_url: &str) -> Option<Url> {
    Url::parse(current_url).ok().or_else(|| {
        Url::parse("http://localhost/")
            .ok()
            .and_then(|base| base.join(current_url).ok())
    })
}

/// Look up a parameter in the query, then in the fragment (the provider's
/// fragment response mode).
fn callback_param(location: &Url, name: &str) -> Option<String> {
    location
        .query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
        .or_else(|| {
            location.fragment().and_then(|fragment| {
                url::form_urlencoded::parse(fragment.as_bytes())
                    .find(|(key, _)| key == name)
                    .map(|(_, value)| value.into_owned())
            })
        })
}

fn has_callback_params(location: &Url) -> bool {
    CALLBACK_PARAMS
        .iter()
        .any(|name| callback_param(location, name).is_some())
}

/// Login and registration pages, or the root carrying callback parameters.
fn is_post_login_location(location: &Url) -> bool {
    match Route::from_path(location.path()) {
        Some(route) if route.is_auth_page() => true,
        Some(Route::Home) => has_callback_params(location),
        _ => false,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use std::sync::atomic::AtomicUsize;

    use shopfront_core::{Email, UserId};

    use super::*;
    use crate::identity::testing::StaticProvider;

    /// Profile backend returning a fixed profile, or failing with a status.
    pub(crate) struct FakeProfiles {
        pub profile: Mutex<std::result::Result<UserProfile, u16>>,
        pub calls: AtomicUsize,
    }

    impl FakeProfiles {
        pub(crate) fn ok(subject: &str, role: Role) -> Self {
            Self {
                profile: Mutex::new(Ok(UserProfile {
                    id: UserId::new(1),
                    subject: subject.to_string(),
                    email: Email::parse(&format!("{subject}@shop.test")).ok(),
                    name: subject.to_string(),
                    role,
                    image: None,
                })),
                calls: AtomicUsize::new(0),
            }
        }

        pub(crate) fn failing(status: u16) -> Self {
            Self {
                profile: Mutex::new(Err(status)),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ProfileBackend for FakeProfiles {
        async fn fetch_profile(&self) -> std::result::Result<UserProfile, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.profile
                .lock()
                .unwrap()
                .clone()
                .map_err(|status| ApiError::Status {
                    status,
                    body: String::new(),
                })
        }
    }

    /// A session signed in as `subject` with `role`.
    pub(crate) async fn signed_in(subject: &str, role: Role) -> SessionContext {
        let provider = Arc::new(StaticProvider::new(subject, &[]));
        let tokens = TokenHolder::new(provider.clone(), 60);
        tokens.set(provider.issue(300)).await;
        let session = SessionContext::new(tokens, Arc::new(FakeProfiles::ok(subject, role)));
        session.initialize("/").await;
        session
    }

    fn session_with(profiles: FakeProfiles) -> (SessionContext, Arc<StaticProvider>) {
        let provider = Arc::new(StaticProvider::new("kc-1", &[]));
        let tokens = TokenHolder::new(provider.clone(), 60);
        (SessionContext::new(tokens, Arc::new(profiles)), provider)
    }

    #[tokio::test]
    async fn test_starts_loading() {
        let (session, _) = session_with(FakeProfiles::ok("kc-1", Role::Customer));
        assert!(session.state().is_loading());
    }

    #[tokio::test]
    async fn test_initialize_without_tokens_is_anonymous() {
        let (session, _) = session_with(FakeProfiles::ok("kc-1", Role::Customer));
        assert_eq!(session.initialize("/").await, None);
        assert_eq!(session.state(), SessionState::Anonymous);
    }

    #[tokio::test]
    async fn test_initialize_with_tokens_resolves_profile_role() {
        let (session, provider) = session_with(FakeProfiles::ok("kc-1", Role::Admin));
        session.tokens().set(provider.issue(300)).await;

        let redirect = session.initialize("http://localhost:3000/login").await;
        assert_eq!(redirect, Some(Navigation::replace(Route::AdminHome)));
        assert_eq!(session.state().role(), Some(Role::Admin));
    }

    #[tokio::test]
    async fn test_profile_failure_collapses_to_anonymous() {
        for status in [401, 500] {
            let (session, provider) = session_with(FakeProfiles::failing(status));
            session.tokens().set(provider.issue(300)).await;

            session.initialize("/").await;
            let state = session.state();
            assert_eq!(state, SessionState::Anonymous);
            assert!(state.identity().is_none());
            assert!(!session.tokens().is_authenticated().await);
        }
    }

    #[tokio::test]
    async fn test_redirect_only_from_auth_pages_or_callback_root() {
        let (session, provider) = session_with(FakeProfiles::ok("kc-1", Role::Customer));
        session.tokens().set(provider.issue(300)).await;
        assert_eq!(session.initialize("/cart").await, None);

        let (session, provider) = session_with(FakeProfiles::ok("kc-1", Role::Customer));
        session.tokens().set(provider.issue(300)).await;
        assert_eq!(session.initialize("/").await, None);

        let (session, provider) = session_with(FakeProfiles::ok("kc-1", Role::Customer));
        session.tokens().set(provider.issue(300)).await;
        assert_eq!(
            session.initialize("/#state=x&session_state=y&code=z").await,
            Some(Navigation::replace(Route::CustomerHome))
        );
    }

    #[tokio::test]
    async fn test_redirect_fires_once_until_logout() {
        let (session, provider) = session_with(FakeProfiles::ok("kc-1", Role::Customer));
        session.tokens().set(provider.issue(300)).await;
        assert!(session.initialize("/register").await.is_some());
        assert!(session.initialize("/register").await.is_none());

        session.logout().await;
        session.tokens().set(provider.issue(300)).await;
        assert!(session.initialize("/login").await.is_some());
    }

    #[tokio::test]
    async fn test_login_callback_round_trip() {
        let (session, _) = session_with(FakeProfiles::ok("kc-1", Role::Customer));
        let login_url = Url::parse(&session.login()).unwrap();
        let state = callback_param(&login_url, "state").unwrap();

        let redirect = session
            .complete_login(&format!("http://localhost:3000/login?state={state}&code=ok"))
            .await
            .unwrap();
        assert_eq!(redirect, Some(Navigation::replace(Route::CustomerHome)));
        assert!(session.state().is_authenticated());
    }

    #[tokio::test]
    async fn test_callback_state_mismatch() {
        let (session, _) = session_with(FakeProfiles::ok("kc-1", Role::Customer));
        let _ = session.login();

        let err = session
            .complete_login("/login?state=forged&code=ok")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::Identity(IdentityError::StateMismatch)
        ));
        assert_eq!(session.state(), SessionState::Anonymous);
    }

    #[tokio::test]
    async fn test_initialize_completes_pending_login() {
        let (session, _) = session_with(FakeProfiles::ok("kc-1", Role::Customer));
        let login_url = Url::parse(&session.register()).unwrap();
        let state = callback_param(&login_url, "state").unwrap();

        let redirect = session
            .initialize(&format!("/?state={state}&session_state=s&code=ok"))
            .await;
        assert_eq!(redirect, Some(Navigation::replace(Route::CustomerHome)));
    }

    #[tokio::test]
    async fn test_logout_publishes_anonymous_and_ends_session() {
        let (session, provider) = session_with(FakeProfiles::ok("kc-1", Role::Customer));
        session.tokens().set(provider.issue(300)).await;
        session.initialize("/").await;
        let mut rx = session.subscribe();

        let url = session.logout().await;
        assert_eq!(url, "https://idp.test/logout");
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), SessionState::Anonymous);
        assert!(!session.tokens().is_authenticated().await);
        assert_eq!(provider.ended.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_require_role() {
        let session = signed_in("kc-1", Role::Customer).await;
        assert!(session.require_role(Role::Customer).is_ok());
        assert!(matches!(
            session.require_role(Role::Admin),
            Err(ClientError::Forbidden {
                required: Role::Admin
            })
        ));

        session.logout().await;
        assert!(matches!(
            session.require_identity(),
            Err(ClientError::NotAuthenticated)
        ));
    }

    #[tokio::test]
    async fn test_update_identity_same_subject_only() {
        let session = signed_in("kc-1", Role::Customer).await;
        let mut profile = UserProfile {
            id: UserId::new(1),
            subject: "kc-1".to_string(),
            email: None,
            name: "Renamed".to_string(),
            role: Role::Customer,
            image: None,
        };
        session.update_identity(profile.clone());
        assert_eq!(session.require_identity().unwrap().name, "Renamed");

        profile.subject = "kc-2".to_string();
        profile.name = "Intruder".to_string();
        session.update_identity(profile);
        assert_eq!(session.require_identity().unwrap().name, "Renamed");
    }

    #[tokio::test]
    async fn test_unrenewable_token_ends_session() {
        let mut provider = StaticProvider::new("kc-9", &[]);
        provider.fail_refresh = true;
        let provider = Arc::new(provider);
        let tokens = TokenHolder::new(provider.clone(), 60);
        tokens.set(provider.issue(300)).await;
        let session = SessionContext::new(tokens, Arc::new(FakeProfiles::ok("kc-9", Role::Admin)));
        session.initialize("/").await;
        assert!(session.require_role(Role::Admin).is_ok());
        let mut changes = session.subscribe();
        changes.mark_unchanged();

        // Close to expiry, and the provider refuses to renew it
        session.tokens().set(provider.issue(10)).await;
        assert!(session.tokens().access_token().await.is_err());

        assert!(changes.has_changed().unwrap());
        assert_eq!(session.state(), SessionState::Anonymous);
        assert!(matches!(
            session.require_role(Role::Admin),
            Err(ClientError::NotAuthenticated)
        ));
    }
}
