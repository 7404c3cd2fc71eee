//! Customer-facing operations outside the cart and wishlist.
//!
//! Every call checks the session role first and fails locally, without a
//! request, when it does not match.

use shopfront_core::{ProductId, Role};
use tracing::instrument;
use uuid::Uuid;

use crate::api::StoreApi;
use crate::error::{ClientError, Result};
use crate::models::{Faq, Order, Product, ProductDetail, ProfileUpdate, UserProfile};
use crate::session::SessionContext;

/// Catalog, orders, profile and FAQs for the signed-in customer.
#[derive(Clone)]
pub struct CustomerAccount {
    api: StoreApi,
    session: SessionContext,
}

impl CustomerAccount {
    #[must_use]
    pub const fn new(api: StoreApi, session: SessionContext) -> Self {
        Self { api, session }
    }

    fn require_customer(&self) -> Result<()> {
        self.session.require_role(Role::Customer).map(|_| ())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Catalog
    // ─────────────────────────────────────────────────────────────────────────

    /// # Errors
    ///
    /// `ClientError::NotAuthenticated` / `ClientError::Forbidden` unless a
    /// customer is signed in, or `ClientError::Api`.
    pub async fn products(&self) -> Result<Vec<Product>> {
        self.require_customer()?;
        Ok(self.api.products().await?)
    }

    /// # Errors
    ///
    /// See [`Self::products`].
    pub async fn products_by_category(&self, category: &str) -> Result<Vec<Product>> {
        self.require_customer()?;
        Ok(self.api.products_by_category(category).await?)
    }

    /// # Errors
    ///
    /// See [`Self::products`].
    pub async fn search_products(&self, term: &str) -> Result<Vec<Product>> {
        self.require_customer()?;
        Ok(self.api.search_products(term).await?)
    }

    /// # Errors
    ///
    /// See [`Self::products`]; `ClientError::NotFound` if the backend has no
    /// such product.
    pub async fn product_detail(&self, id: ProductId) -> Result<ProductDetail> {
        self.require_customer()?;
        self.api.product_detail(id).await.map_err(|e| {
            if e.status() == Some(404) {
                ClientError::NotFound(format!("product {id}"))
            } else {
                e.into()
            }
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Orders
    // ─────────────────────────────────────────────────────────────────────────

    /// # Errors
    ///
    /// See [`Self::products`].
    #[instrument(skip(self))]
    pub async fn my_orders(&self) -> Result<Vec<Order>> {
        self.require_customer()?;
        Ok(self.api.my_orders().await?)
    }

    /// Look up an order by tracking ID. Works without a session.
    ///
    /// # Errors
    ///
    /// `ClientError::NotFound` if no order has the tracking ID, or
    /// `ClientError::Api`.
    #[instrument(skip(self))]
    pub async fn track_order(&self, tracking_id: Uuid) -> Result<Order> {
        self.api
            .track_order(tracking_id)
            .await?
            .ok_or_else(|| ClientError::NotFound(format!("order {tracking_id}")))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Profile & FAQ
    // ─────────────────────────────────────────────────────────────────────────

    /// The signed-in user's profile. Open to any role.
    ///
    /// # Errors
    ///
    /// `ClientError::NotAuthenticated` if nobody is signed in, or
    /// `ClientError::Api`.
    pub async fn profile(&self) -> Result<UserProfile> {
        self.session.require_identity()?;
        Ok(self.api.profile().await?)
    }

    /// Update the signed-in user's profile. The session identity follows.
    ///
    /// # Errors
    ///
    /// `ClientError::InvalidArgument` if the update changes nothing, plus
    /// those of [`Self::profile`].
    #[instrument(skip_all)]
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<UserProfile> {
        self.session.require_identity()?;
        if update.is_empty() {
            return Err(ClientError::InvalidArgument(
                "profile update is empty".to_string(),
            ));
        }
        let profile = self.api.update_profile(update).await?;
        self.session.update_identity(profile.clone());
        Ok(profile)
    }

    /// # Errors
    ///
    /// See [`Self::products`].
    pub async fn faqs(&self) -> Result<Vec<Faq>> {
        self.require_customer()?;
        Ok(self.api.faqs().await?)
    }
}
