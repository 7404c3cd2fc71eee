//! Unified error handling with Sentry integration.
//!
//! Every public operation of the client returns [`Result<T>`], whose error
//! wraps the layer that failed: the identity provider, the HTTP gateway, or a
//! local precondition such as a missing session or the wrong role.

use shopfront_core::{ProductId, Role};
use thiserror::Error;

use crate::config::ConfigError;
use crate::gateway::ApiError;
use crate::identity::IdentityError;

/// Client-level error type.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Identity provider operation failed.
    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    /// Backend API call failed.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The operation needs a signed-in user.
    #[error("Not authenticated")]
    NotAuthenticated,

    /// The signed-in user does not hold the role the operation needs.
    #[error("Forbidden: requires {required} role")]
    Forbidden { required: Role },

    /// The product is already a line in the cart.
    #[error("Product {0} is already in the cart")]
    AlreadyInCart(ProductId),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller supplied an unusable argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl ClientError {
    /// Whether the error means the user must sign in (again).
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        match self {
            Self::NotAuthenticated | Self::Identity(_) => true,
            Self::Api(err) => err.is_unauthorized(),
            _ => false,
        }
    }

    /// Report the error to Sentry when it indicates a fault rather than a
    /// user mistake, and log it.
    pub fn report(&self) {
        if matches!(self, Self::Api(err) if err.is_server_fault()) {
            let event_id = sentry::capture_error(self);
            tracing::error!(error = %self, sentry_event_id = %event_id, "Request error");
        } else {
            tracing::debug!(error = %self, "Request error");
        }
    }
}

/// Result type alias for `ClientError`.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for a client action.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added product", Some(&[("product_id", "123")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    for (key, value) in data.unwrap_or_default() {
        breadcrumb.data.insert(
            (*key).to_string(),
            serde_json::Value::String((*value).to_string()),
        );
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_display() {
        let err = ClientError::Forbidden {
            required: Role::Admin,
        };
        assert_eq!(err.to_string(), "Forbidden: requires admin role");

        let err = ClientError::AlreadyInCart(ProductId::new(9));
        assert_eq!(err.to_string(), "Product 9 is already in the cart");
    }

    #[test]
    fn test_is_unauthorized() {
        assert!(ClientError::NotAuthenticated.is_unauthorized());
        assert!(
            ClientError::Api(ApiError::Status {
                status: 401,
                body: String::new(),
            })
            .is_unauthorized()
        );
        assert!(
            !ClientError::Api(ApiError::Status {
                status: 500,
                body: String::new(),
            })
            .is_unauthorized()
        );
        assert!(
            !ClientError::Forbidden {
                required: Role::Customer
            }
            .is_unauthorized()
        );
    }
}
