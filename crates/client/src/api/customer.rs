//! Customer endpoints: cart, orders, wishlist, profile and FAQs.

use shopfront_core::{CartItemId, ProductId, WishlistItemId};
use tracing::instrument;
use uuid::Uuid;

use super::StoreApi;
use super::conversions::{
    convert_faq, convert_order, convert_orders, convert_profile, convert_wishlist_item,
};
use super::types::{
    FaqDto, OrderDto, PlaceOrderRequest, ProductRefRequest, ProfileDto, ProfileUpdateRequest,
    QuantityRequest, WishlistDto,
};
use crate::gateway::ApiError;
use crate::models::{Faq, Order, ProfileUpdate, UserProfile, WishlistItem};

impl StoreApi {
    // ─────────────────────────────────────────────────────────────────────────
    // Cart
    // ─────────────────────────────────────────────────────────────────────────

    /// The pending order holding the cart, if the customer has one.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails.
    #[instrument(skip(self))]
    pub async fn cart(&self) -> Result<Option<Order>, ApiError> {
        let dto: Option<OrderDto> = self
            .inner
            .gateway
            .get("/api/customer/cart")
            .await?
            .into_optional()?;
        Ok(dto.map(convert_order))
    }

    /// Add one unit of a product to the cart of `subject`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Status` with 409 if the product is already in the
    /// cart.
    #[instrument(skip(self, subject, product_id), fields(product_id = %product_id))]
    pub async fn add_to_cart(&self, subject: &str, product_id: ProductId) -> Result<(), ApiError> {
        self.inner
            .gateway
            .post(
                "/api/customer/cart",
                &ProductRefRequest {
                    user_id: subject,
                    product_id,
                },
            )
            .await?;
        Ok(())
    }

    /// Set the quantity of a cart line.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails.
    #[instrument(skip(self, item_id), fields(item_id = %item_id))]
    pub async fn update_cart_item(
        &self,
        item_id: CartItemId,
        quantity: u32,
    ) -> Result<(), ApiError> {
        self.inner
            .gateway
            .put(
                &format!("/api/customer/cart/{item_id}"),
                &QuantityRequest { quantity },
            )
            .await?;
        Ok(())
    }

    /// Remove a cart line.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails.
    #[instrument(skip(self, item_id), fields(item_id = %item_id))]
    pub async fn remove_cart_item(&self, item_id: CartItemId) -> Result<(), ApiError> {
        self.inner
            .gateway
            .delete(&format!("/api/customer/cart/{item_id}"))
            .await?;
        Ok(())
    }

    /// Remove every cart line.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self) -> Result<(), ApiError> {
        self.inner.gateway.delete("/api/customer/cart").await?;
        Ok(())
    }

    /// Apply a coupon to the pending order and return the repriced order.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Status` with 400 if the coupon is unknown or expired.
    #[instrument(skip(self))]
    pub async fn apply_coupon(&self, code: &str) -> Result<Order, ApiError> {
        let dto: OrderDto = self
            .inner
            .gateway
            .get(&format!(
                "/api/customer/coupon/{}",
                urlencoding::encode(code.trim())
            ))
            .await?
            .into_json()?;
        Ok(convert_order(dto))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Orders
    // ─────────────────────────────────────────────────────────────────────────

    /// Place the pending order.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails.
    #[instrument(skip(self, subject, address, description))]
    pub async fn place_order(
        &self,
        subject: &str,
        address: &str,
        description: &str,
    ) -> Result<Order, ApiError> {
        let dto: OrderDto = self
            .inner
            .gateway
            .post(
                "/api/customer/placeOrder",
                &PlaceOrderRequest {
                    user_id: subject,
                    address,
                    order_description: description,
                },
            )
            .await?
            .into_json()?;
        Ok(convert_order(dto))
    }

    /// Placed, shipped and delivered orders of the signed-in customer.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails.
    #[instrument(skip(self))]
    pub async fn my_orders(&self) -> Result<Vec<Order>, ApiError> {
        let dtos: Option<Vec<OrderDto>> = self
            .inner
            .gateway
            .get("/api/customer/myorders")
            .await?
            .into_optional()?;
        Ok(convert_orders(dtos.unwrap_or_default()))
    }

    /// Look up an order by tracking ID. Needs no session.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails.
    #[instrument(skip(self))]
    pub async fn track_order(&self, tracking_id: Uuid) -> Result<Option<Order>, ApiError> {
        let dto: Option<OrderDto> = self
            .inner
            .gateway
            .get_public(&format!("/order/trackOrder/{tracking_id}"))
            .await?
            .into_optional()?;
        Ok(dto.map(convert_order))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Wishlist
    // ─────────────────────────────────────────────────────────────────────────

    /// # Errors
    ///
    /// Returns `ApiError` if the request fails.
    #[instrument(skip(self))]
    pub async fn wishlist(&self) -> Result<Vec<WishlistItem>, ApiError> {
        let dtos: Option<Vec<WishlistDto>> = self
            .inner
            .gateway
            .get("/api/customer/wishlist")
            .await?
            .into_optional()?;
        Ok(dtos
            .unwrap_or_default()
            .into_iter()
            .map(convert_wishlist_item)
            .collect())
    }

    /// # Errors
    ///
    /// Returns `ApiError` if the request fails.
    #[instrument(skip(self, subject, product_id), fields(product_id = %product_id))]
    pub async fn add_to_wishlist(
        &self,
        subject: &str,
        product_id: ProductId,
    ) -> Result<(), ApiError> {
        self.inner
            .gateway
            .post(
                "/api/customer/wishlist",
                &ProductRefRequest {
                    user_id: subject,
                    product_id,
                },
            )
            .await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `ApiError` if the request fails.
    #[instrument(skip(self, item_id), fields(item_id = %item_id))]
    pub async fn remove_from_wishlist(&self, item_id: WishlistItemId) -> Result<(), ApiError> {
        self.inner
            .gateway
            .delete(&format!("/api/customer/wishlist/{item_id}"))
            .await?;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Profile & FAQ
    // ─────────────────────────────────────────────────────────────────────────

    /// The backend's record of the signed-in user. The backend creates the
    /// record on first access.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails.
    #[instrument(skip(self))]
    pub async fn profile(&self) -> Result<UserProfile, ApiError> {
        let dto: ProfileDto = self
            .inner
            .gateway
            .get("/api/user/profile")
            .await?
            .into_json()?;
        Ok(convert_profile(dto))
    }

    /// Update the signed-in user's profile and return the stored result.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails.
    #[instrument(skip_all)]
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<UserProfile, ApiError> {
        let payload = self
            .inner
            .gateway
            .put(
                "/api/user/profile",
                &ProfileUpdateRequest {
                    name: update.name.as_deref(),
                    email: update.email.as_ref().map(|e| e.as_str()),
                    img: update.image.as_ref().map(|i| i.as_base64()),
                },
            )
            .await?;

        match payload.into_optional::<ProfileDto>()? {
            Some(dto) => Ok(convert_profile(dto)),
            None => self.profile().await,
        }
    }

    /// Storefront FAQs.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails.
    #[instrument(skip(self))]
    pub async fn faqs(&self) -> Result<Vec<Faq>, ApiError> {
        let dtos: Option<Vec<FaqDto>> = self
            .inner
            .gateway
            .get("/api/customer/faqs")
            .await?
            .into_optional()?;
        Ok(dtos.unwrap_or_default().into_iter().map(convert_faq).collect())
    }
}
