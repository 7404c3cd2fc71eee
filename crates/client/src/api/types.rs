//! Wire formats of the backend REST API.
//!
//! Field names follow the backend's camelCase JSON. Nullable fields are
//! `Option` with `#[serde(default)]` so a missing key and `null` read the same.

use serde::{Deserialize, Serialize};
use shopfront_core::{
    CartItemId, CategoryId, FaqId, Money, OrderId, OrderStatus, ProductId, ReviewId, UserId,
    WishlistItemId,
};
use uuid::Uuid;

// ─────────────────────────────────────────────────────────────────────────────
// Responses
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDto {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Money,
    #[serde(default)]
    pub discount_price: Option<Money>,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub category_name: Option<String>,
    /// Base64 image payload.
    #[serde(default)]
    pub byte_img: Option<String>,
    #[serde(default, alias = "stock")]
    pub quantity: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewDto {
    pub id: ReviewId,
    #[serde(default)]
    pub rating: Option<i64>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub returned_img: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaqDto {
    pub id: FaqId,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub answer: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetailDto {
    pub product_dto: ProductDto,
    #[serde(default)]
    pub review_dto_list: Vec<ReviewDto>,
    #[serde(default)]
    pub faq_dto_list: Vec<FaqDto>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryDto {
    pub id: CategoryId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemDto {
    pub id: CartItemId,
    /// Unit price.
    pub price: Money,
    pub product_id: ProductId,
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub returned_img: Option<String>,
    #[serde(default)]
    pub quantity: i64,
}

/// `java.util.Date` as Jackson writes it: epoch millis by default, ISO text
/// when the backend is configured for it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum WireDate {
    Millis(i64),
    Text(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDto {
    pub id: OrderId,
    #[serde(default)]
    pub order_description: Option<String>,
    #[serde(default)]
    pub date: Option<WireDate>,
    #[serde(default)]
    pub amount: Option<Money>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub payment: Option<String>,
    #[serde(default)]
    pub order_status: OrderStatus,
    #[serde(default)]
    pub total_amount: Option<Money>,
    #[serde(default)]
    pub discount: Option<Money>,
    #[serde(default)]
    pub tracking_id: Option<Uuid>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub cart_items: Vec<CartItemDto>,
    #[serde(default)]
    pub coupon_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistDto {
    pub id: WishlistItemId,
    pub product_id: ProductId,
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub product_description: Option<String>,
    #[serde(default)]
    pub price: Option<Money>,
    #[serde(default)]
    pub returned_img: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDto {
    pub id: UserId,
    pub keycloak_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "userRole")]
    pub role: Option<String>,
    #[serde(default)]
    pub img: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalyticsDto {
    pub placed: i64,
    pub shipped: i64,
    pub delivered: i64,
    pub current_month_orders: i64,
    pub previous_month_orders: i64,
    pub current_month_earnings: Money,
    pub previous_month_earnings: Money,
}

// ─────────────────────────────────────────────────────────────────────────────
// Requests
// ─────────────────────────────────────────────────────────────────────────────

/// Body of `POST /api/customer/cart` and `POST /api/customer/wishlist`.
/// `user_id` is the identity provider subject.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRefRequest<'a> {
    pub user_id: &'a str,
    pub product_id: ProductId,
}

#[derive(Debug, Serialize)]
pub struct QuantityRequest {
    pub quantity: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest<'a> {
    pub user_id: &'a str,
    pub address: &'a str,
    pub order_description: &'a str,
}

#[derive(Debug, Serialize)]
pub struct ProfileUpdateRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub img: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct FaqRequest<'a> {
    pub question: &'a str,
    pub answer: &'a str,
}

#[derive(Debug, Serialize)]
pub struct CategoryRequest<'a> {
    pub name: &'a str,
    pub description: &'a str,
}
