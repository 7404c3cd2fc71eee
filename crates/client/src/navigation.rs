//! Route table and navigation requests.
//!
//! Every page of the storefront is a [`Route`]. Code that decides the user
//! should be somewhere else returns a [`Navigation`]; the caller performs it.
//! Nothing in this crate navigates on its own.

use serde::Serialize;
use shopfront_core::Role;

/// A storefront page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Route {
    Home,
    Login,
    Register,
    AdminLogin,
    CustomerHome,
    CustomerProducts,
    Cart,
    Wishlist,
    Orders,
    Profile,
    Faq,
    AdminHome,
    AdminProducts,
    AdminOrders,
    AdminFaq,
}

impl Route {
    /// Every route, in table order.
    pub const ALL: [Self; 15] = [
        Self::Home,
        Self::Login,
        Self::Register,
        Self::AdminLogin,
        Self::CustomerHome,
        Self::CustomerProducts,
        Self::Cart,
        Self::Wishlist,
        Self::Orders,
        Self::Profile,
        Self::Faq,
        Self::AdminHome,
        Self::AdminProducts,
        Self::AdminOrders,
        Self::AdminFaq,
    ];

    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Home => "/",
            Self::Login => "/login",
            Self::Register => "/register",
            Self::AdminLogin => "/admin/login",
            Self::CustomerHome => "/customer",
            Self::CustomerProducts => "/customer/products",
            Self::Cart => "/cart",
            Self::Wishlist => "/wishlist",
            Self::Orders => "/orders",
            Self::Profile => "/profile",
            Self::Faq => "/faq",
            Self::AdminHome => "/admin",
            Self::AdminProducts => "/admin/products",
            Self::AdminOrders => "/admin/orders",
            Self::AdminFaq => "/admin/faq",
        }
    }

    /// Look up a route by path. A trailing slash is ignored.
    #[must_use]
    pub fn from_path(path: &str) -> Option<Self> {
        let trimmed = path.trim_end_matches('/');
        let path = if trimmed.is_empty() { "/" } else { trimmed };
        Self::ALL.into_iter().find(|route| route.path() == path)
    }

    /// Role a user must hold to see the page. `None` means the page is
    /// public, or (for [`Route::Profile`]) open to any signed-in user.
    #[must_use]
    pub const fn required_role(self) -> Option<Role> {
        match self {
            Self::CustomerHome
            | Self::CustomerProducts
            | Self::Cart
            | Self::Wishlist
            | Self::Orders
            | Self::Faq => Some(Role::Customer),
            Self::AdminHome | Self::AdminProducts | Self::AdminOrders | Self::AdminFaq => {
                Some(Role::Admin)
            }
            Self::Home | Self::Login | Self::Register | Self::AdminLogin | Self::Profile => None,
        }
    }

    /// Whether the page needs a signed-in user.
    #[must_use]
    pub const fn requires_session(self) -> bool {
        self.required_role().is_some() || matches!(self, Self::Profile)
    }

    /// Login and registration pages, which signed-in users leave.
    #[must_use]
    pub const fn is_auth_page(self) -> bool {
        matches!(self, Self::Login | Self::Register | Self::AdminLogin)
    }

    /// Landing page for a role.
    #[must_use]
    pub const fn home_for(role: Role) -> Self {
        match role {
            Role::Admin => Self::AdminHome,
            Role::Customer => Self::CustomerHome,
        }
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}

/// A request to move to another page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Navigation {
    pub route: Route,
    /// Replace the current history entry instead of pushing one.
    pub replace: bool,
}

impl Navigation {
    #[must_use]
    pub const fn push(route: Route) -> Self {
        Self {
            route,
            replace: false,
        }
    }

    #[must_use]
    pub const fn replace(route: Route) -> Self {
        Self {
            route,
            replace: true,
        }
    }

    #[must_use]
    pub const fn path(&self) -> &'static str {
        self.route.path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_round_trip() {
        for route in Route::ALL {
            assert_eq!(Route::from_path(route.path()), Some(route));
        }
        assert_eq!(Route::from_path("/cart/"), Some(Route::Cart));
        assert_eq!(Route::from_path(""), Some(Route::Home));
        assert_eq!(Route::from_path("/nowhere"), None);
    }

    #[test]
    fn test_required_roles() {
        assert_eq!(Route::AdminOrders.required_role(), Some(Role::Admin));
        assert_eq!(Route::Cart.required_role(), Some(Role::Customer));
        assert_eq!(Route::Login.required_role(), None);
        assert!(Route::Profile.requires_session());
        assert!(!Route::Home.requires_session());
    }

    #[test]
    fn test_home_for_role_matches_role_home_path() {
        assert_eq!(Route::home_for(Role::Admin).path(), Role::Admin.home_path());
        assert_eq!(
            Route::home_for(Role::Customer).path(),
            Role::Customer.home_path()
        );
    }

    #[test]
    fn test_auth_pages() {
        assert!(Route::Login.is_auth_page());
        assert!(Route::AdminLogin.is_auth_page());
        assert!(!Route::Home.is_auth_page());
    }
}
