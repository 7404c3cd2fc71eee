//! Domain projections of backend resources.
//!
//! These are the shapes the rest of the client works with. Wire DTOs live in
//! [`crate::api::types`] and are converted into these at the API boundary.

use chrono::{DateTime, Utc};
use serde::Serialize;
use shopfront_core::{
    CartItemId, CategoryId, Email, FaqId, ImageRef, Money, OrderId, OrderStatus, ProductId,
    ReviewId, Role, UserId, WishlistItemId,
};
use uuid::Uuid;

/// The signed-in user as far as the storefront is concerned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    /// Backend user ID.
    pub id: UserId,
    /// Identity provider subject; the backend keys carts and wishlists on it.
    pub subject: String,
    pub email: Option<Email>,
    pub name: String,
    pub role: Role,
}

impl Identity {
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub discount_price: Option<Money>,
    pub category_id: Option<CategoryId>,
    pub category_name: Option<String>,
    pub image: Option<ImageRef>,
    /// Units in stock, when the backend reports it.
    pub stock: Option<u32>,
}

impl Product {
    /// Price the customer pays: the discount price when one is set.
    #[must_use]
    pub fn effective_price(&self) -> Money {
        self.discount_price.unwrap_or(self.price)
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        self.stock.is_none_or(|stock| stock > 0)
    }
}

/// A customer review on a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Review {
    pub id: ReviewId,
    pub rating: u8,
    pub description: String,
    pub username: String,
    pub image: Option<ImageRef>,
}

/// A question and answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Faq {
    pub id: FaqId,
    pub question: String,
    pub answer: String,
}

/// Product detail page data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductDetail {
    pub product: Product,
    pub reviews: Vec<Review>,
    pub faqs: Vec<Faq>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub description: String,
}

/// One cart line. Quantity is always at least 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartItem {
    pub id: CartItemId,
    pub product_id: ProductId,
    pub name: String,
    /// Unit price.
    pub price: Money,
    pub quantity: u32,
    pub image: Option<ImageRef>,
}

impl CartItem {
    /// Unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Money {
        self.price.times(self.quantity)
    }
}

/// One wishlist entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WishlistItem {
    pub id: WishlistItemId,
    pub product_id: ProductId,
    pub name: String,
    pub price: Money,
    pub description: Option<String>,
    pub image: Option<ImageRef>,
}

/// Order-level amounts the server computes for the pending order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OrderSummary {
    /// Amount after discount.
    pub amount: Money,
    /// Amount before discount.
    pub total_amount: Money,
    pub discount: Money,
    pub coupon_name: Option<String>,
}

/// An order. The customer's single `Pending` order is the server-side cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub description: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub address: Option<String>,
    pub payment: Option<String>,
    pub status: OrderStatus,
    pub tracking_id: Option<Uuid>,
    pub user_name: Option<String>,
    pub summary: OrderSummary,
    pub items: Vec<CartItem>,
}

/// The backend's record of the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    pub id: UserId,
    pub subject: String,
    pub email: Option<Email>,
    pub name: String,
    pub role: Role,
    pub image: Option<ImageRef>,
}

impl From<UserProfile> for Identity {
    fn from(profile: UserProfile) -> Self {
        Self {
            id: profile.id,
            subject: profile.subject,
            email: profile.email,
            name: profile.name,
            role: profile.role,
        }
    }
}

/// Changes to apply to the signed-in user's profile. `None` leaves a field
/// unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<Email>,
    pub image: Option<ImageRef>,
}

impl ProfileUpdate {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.image.is_none()
    }
}

/// Back-office order statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Analytics {
    pub placed: u64,
    pub shipped: u64,
    pub delivered: u64,
    pub current_month_orders: u64,
    pub previous_month_orders: u64,
    pub current_month_earnings: Money,
    pub previous_month_earnings: Money,
}

/// Input for creating or replacing a product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: Money,
    pub category_id: CategoryId,
    /// Raw image bytes, uploaded as a multipart file part.
    pub image: Option<Vec<u8>>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn product(price: i64, discount: Option<i64>) -> Product {
        Product {
            id: ProductId::new(1),
            name: "Lamp".to_string(),
            description: String::new(),
            price: Money::from_minor(price),
            discount_price: discount.map(Money::from_minor),
            category_id: None,
            category_name: None,
            image: None,
            stock: None,
        }
    }

    #[test]
    fn test_effective_price() {
        assert_eq!(product(1000, None).effective_price(), Money::from_minor(1000));
        assert_eq!(
            product(1000, Some(800)).effective_price(),
            Money::from_minor(800)
        );
    }

    #[test]
    fn test_line_total() {
        let item = CartItem {
            id: CartItemId::new(1),
            product_id: ProductId::new(1),
            name: "Lamp".to_string(),
            price: Money::from_minor(1000),
            quantity: 3,
            image: None,
        };
        assert_eq!(item.line_total().display(), "30.00");
    }

    #[test]
    fn test_identity_from_profile() {
        let profile = UserProfile {
            id: UserId::new(3),
            subject: "kc-3".to_string(),
            email: Some(Email::parse("ann@shop.test").unwrap()),
            name: "Ann".to_string(),
            role: Role::Admin,
            image: None,
        };
        let identity = Identity::from(profile);
        assert!(identity.is_admin());
        assert_eq!(identity.subject, "kc-3");
    }
}
