//! Role-gated route guard.
//!
//! A [`RouteGuard`] decides whether a page may render for the current
//! session, and where to send the user if not.
//!
//! ```rust,ignore
//! let decision = RouteGuard::new(Route::AdminOrders).evaluate(&session.state());
//! if let Some(navigation) = decision.redirect {
//!     return navigate(navigation);
//! }
//! ```

use serde::Serialize;
use shopfront_core::Role;
use tokio::sync::watch;

use crate::navigation::{Navigation, Route};
use crate::session::SessionState;

/// Outcome of a guard check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardState {
    /// The session is still resolving; render a placeholder.
    Loading,
    Unauthenticated,
    AuthorizedForRoute,
    /// Signed in, but with a role the page does not allow.
    WrongRole,
}

/// A guard state and the navigation it calls for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GuardDecision {
    pub state: GuardState,
    pub redirect: Option<Navigation>,
}

impl GuardDecision {
    /// Whether the guarded page may render.
    #[must_use]
    pub const fn renders_children(&self) -> bool {
        matches!(self.state, GuardState::AuthorizedForRoute)
    }

    const fn stay(state: GuardState) -> Self {
        Self {
            state,
            redirect: None,
        }
    }

    const fn redirect(state: GuardState, route: Route) -> Self {
        Self {
            state,
            redirect: Some(Navigation::replace(route)),
        }
    }
}

/// Guard for one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteGuard {
    route: Route,
    required_role: Option<Role>,
    redirect_to: Option<Route>,
}

impl RouteGuard {
    /// Guard `route` with the role from the route table.
    #[must_use]
    pub const fn new(route: Route) -> Self {
        Self {
            route,
            required_role: route.required_role(),
            redirect_to: None,
        }
    }

    /// Override the role the page requires.
    #[must_use]
    pub const fn require(mut self, role: Role) -> Self {
        self.required_role = Some(role);
        self
    }

    /// Send users with the wrong role here instead of their role's home.
    #[must_use]
    pub const fn redirect_to(mut self, route: Route) -> Self {
        self.redirect_to = Some(route);
        self
    }

    #[must_use]
    pub const fn route(&self) -> Route {
        self.route
    }

    /// Decide for `state`.
    #[must_use]
    pub fn evaluate(&self, state: &SessionState) -> GuardDecision {
        match state {
            SessionState::Loading => GuardDecision::stay(GuardState::Loading),
            SessionState::Anonymous
                if self.route.requires_session() || self.required_role.is_some() =>
            {
                GuardDecision::redirect(GuardState::Unauthenticated, Route::Login)
            }
            SessionState::Anonymous => GuardDecision::stay(GuardState::AuthorizedForRoute),
            SessionState::Authenticated(identity) => match self.required_role {
                Some(required) if required != identity.role => GuardDecision::redirect(
                    GuardState::WrongRole,
                    self.redirect_to.unwrap_or_else(|| Route::home_for(identity.role)),
                ),
                _ => GuardDecision::stay(GuardState::AuthorizedForRoute),
            },
        }
    }

    /// Wait until the session has resolved, then decide.
    ///
    /// If the session channel closes first, the last published state is
    /// used.
    pub async fn resolve(&self, session: &mut watch::Receiver<SessionState>) -> GuardDecision {
        let resolved = session
            .wait_for(|state| !state.is_loading())
            .await
            .map(|state| self.evaluate(&state));

        match resolved {
            Ok(decision) => decision,
            Err(_) => self.evaluate(&session.borrow()),
        }
    }
}
