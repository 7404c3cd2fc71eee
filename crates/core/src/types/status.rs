//! Order status.

use serde::{Deserialize, Serialize};

/// Error returned when an order status string is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderStatusError {
    #[error("invalid order status: {0}")]
    Unknown(String),
}

/// Lifecycle of an order.
///
/// The backend keeps exactly one `Pending` order per customer; that order is
/// the cart. Placing it moves it to `Placed`, after which an admin advances
/// it to `Shipped` and `Delivered`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    #[default]
    Pending,
    Placed,
    Shipped,
    Delivered,
}

impl OrderStatus {
    /// Wire spelling, as used in path segments (`/order/{id}/{status}`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Placed => "Placed",
            Self::Shipped => "Shipped",
            Self::Delivered => "Delivered",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = OrderStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "placed" => Ok(Self::Placed),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            _ => Err(OrderStatusError::Unknown(s.to_string())),
        }
    }
}
