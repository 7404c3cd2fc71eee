//! User roles.

use serde::{Deserialize, Deserializer, Serialize};

/// Error returned when a role string is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoleError {
    #[error("invalid role: {0}")]
    Unknown(String),
}

/// The closed set of roles a signed-in user can hold.
///
/// Derived once when the session resolves and passed down from there.
/// Admins manage the catalog and orders and never hold a cart; customers
/// shop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Customer,
}

impl Role {
    /// Derive a role from a backend role claim.
    ///
    /// Only an explicit `ADMIN` grants admin rights; every other value
    /// (including the backend's `COSTUMER` spelling) is a customer.
    #[must_use]
    pub fn from_claim(claim: &str) -> Self {
        if claim.trim().eq_ignore_ascii_case("admin") {
            Self::Admin
        } else {
            Self::Customer
        }
    }

    /// Derive a role from identity-provider realm roles.
    #[must_use]
    pub fn from_realm_roles<S: AsRef<str>>(roles: &[S]) -> Self {
        if roles.iter().any(|r| r.as_ref().eq_ignore_ascii_case("admin")) {
            Self::Admin
        } else {
            Self::Customer
        }
    }

    /// Landing route for this role.
    #[must_use]
    pub const fn home_path(self) -> &'static str {
        match self {
            Self::Admin => "/admin",
            Self::Customer => "/customer",
        }
    }

    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Admin => write!(f, "admin"),
            Self::Customer => write!(f, "customer"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = RoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "customer" | "costumer" => Ok(Self::Customer),
            _ => Err(RoleError::Unknown(s.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let claim = String::deserialize(deserializer)?;
        Ok(Self::from_claim(&claim))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_claim() {
        assert_eq!(Role::from_claim("ADMIN"), Role::Admin);
        assert_eq!(Role::from_claim("COSTUMER"), Role::Customer);
        assert_eq!(Role::from_claim("CUSTOMER"), Role::Customer);
        assert_eq!(Role::from_claim(""), Role::Customer);
    }

    #[test]
    fn test_from_realm_roles() {
        assert_eq!(
            Role::from_realm_roles(&["offline_access", "admin"]),
            Role::Admin
        );
        assert_eq!(Role::from_realm_roles(&["customer"]), Role::Customer);
        assert_eq!(Role::from_realm_roles::<&str>(&[]), Role::Customer);
    }

    #[test]
    fn test_parse_strict() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("Customer".parse::<Role>().unwrap(), Role::Customer);
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn test_deserialize_is_lenient() {
        let role: Role = serde_json::from_str("\"ADMIN\"").unwrap();
        assert_eq!(role, Role::Admin);
        let role: Role = serde_json::from_str("\"COSTUMER\"").unwrap();
        assert_eq!(role, Role::Customer);
    }

    #[test]
    fn test_home_path() {
        assert_eq!(Role::Admin.home_path(), "/admin");
        assert_eq!(Role::Customer.home_path(), "/customer");
    }
}
