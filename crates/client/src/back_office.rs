//! Admin back-office operations.
//!
//! Every call requires an admin session and fails with
//! `ClientError::Forbidden` for customers without contacting the backend.

use shopfront_core::{OrderId, OrderStatus, ProductId, Role};
use tracing::{info, instrument};

use crate::api::StoreApi;
use crate::error::{ClientError, Result, add_breadcrumb};
use crate::models::{Analytics, Category, Faq, NewProduct, Order, Product};
use crate::session::SessionContext;

/// Catalog, order and FAQ management for admins.
#[derive(Clone)]
pub struct BackOffice {
    api: StoreApi,
    session: SessionContext,
}

impl BackOffice {
    #[must_use]
    pub const fn new(api: StoreApi, session: SessionContext) -> Self {
        Self { api, session }
    }

    fn require_admin(&self) -> Result<()> {
        self.session.require_role(Role::Admin).map(|_| ())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Catalog
    // ─────────────────────────────────────────────────────────────────────────

    /// # Errors
    ///
    /// `ClientError::NotAuthenticated` / `ClientError::Forbidden` unless an
    /// admin is signed in, or `ClientError::Api`.
    pub async fn categories(&self) -> Result<Vec<Category>> {
        self.require_admin()?;
        Ok(self.api.categories().await?)
    }

    /// # Errors
    ///
    /// `ClientError::InvalidArgument` if `name` is blank, plus those of
    /// [`Self::categories`].
    pub async fn create_category(&self, name: &str, description: &str) -> Result<Category> {
        self.require_admin()?;
        let name = require_text("category name", name)?;
        Ok(self.api.create_category(name, description.trim()).await?)
    }

    /// # Errors
    ///
    /// See [`Self::categories`].
    pub async fn products(&self) -> Result<Vec<Product>> {
        self.require_admin()?;
        Ok(self.api.admin_products().await?)
    }

    /// # Errors
    ///
    /// `ClientError::InvalidArgument` if the name is blank or the price
    /// negative, plus those of [`Self::categories`].
    #[instrument(skip_all, fields(name = %product.name))]
    pub async fn create_product(&self, product: &NewProduct) -> Result<Product> {
        self.require_admin()?;
        validate_product(product)?;
        let created = self.api.create_product(product).await?;
        info!(product_id = %created.id, "Product created");
        Ok(created)
    }

    /// # Errors
    ///
    /// See [`Self::create_product`].
    #[instrument(skip(self, product), fields(product_id = %id))]
    pub async fn update_product(&self, id: ProductId, product: &NewProduct) -> Result<Product> {
        self.require_admin()?;
        validate_product(product)?;
        Ok(self.api.update_product(id, product).await?)
    }

    /// # Errors
    ///
    /// See [`Self::categories`].
    #[instrument(skip(self, id), fields(product_id = %id))]
    pub async fn delete_product(&self, id: ProductId) -> Result<()> {
        self.require_admin()?;
        add_breadcrumb(
            "admin",
            "Delete product",
            Some(&[("product_id", id.to_string().as_str())][..]),
        );
        self.api.delete_product(id).await?;
        info!("Product deleted");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Orders
    // ─────────────────────────────────────────────────────────────────────────

    /// # Errors
    ///
    /// See [`Self::categories`].
    pub async fn placed_orders(&self) -> Result<Vec<Order>> {
        self.require_admin()?;
        Ok(self.api.placed_orders().await?)
    }

    /// Move an order forward to `status`.
    ///
    /// # Errors
    ///
    /// `ClientError::InvalidArgument` for `Pending`, which only the cart
    /// holds, plus those of [`Self::categories`].
    #[instrument(skip(self, id), fields(order_id = %id))]
    pub async fn change_order_status(&self, id: OrderId, status: OrderStatus) -> Result<Order> {
        self.require_admin()?;
        if status == OrderStatus::Pending {
            return Err(ClientError::InvalidArgument(
                "orders cannot be moved back to pending".to_string(),
            ));
        }
        Ok(self.api.change_order_status(id, status).await?)
    }

    /// # Errors
    ///
    /// See [`Self::categories`].
    pub async fn analytics(&self) -> Result<Analytics> {
        self.require_admin()?;
        Ok(self.api.analytics().await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // FAQ
    // ─────────────────────────────────────────────────────────────────────────

    /// # Errors
    ///
    /// See [`Self::categories`].
    pub async fn faqs(&self) -> Result<Vec<Faq>> {
        self.require_admin()?;
        Ok(self.api.admin_faqs().await?)
    }

    /// # Errors
    ///
    /// `ClientError::InvalidArgument` if either text is blank, plus those of
    /// [`Self::categories`].
    pub async fn create_faq(&self, question: &str, answer: &str) -> Result<Faq> {
        self.require_admin()?;
        let question = require_text("question", question)?;
        let answer = require_text("answer", answer)?;
        Ok(self.api.create_faq(question, answer).await?)
    }
}

fn require_text<'a>(field: &str, value: &'a str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ClientError::InvalidArgument(format!("{field} is empty")));
    }
    Ok(trimmed)
}

fn validate_product(product: &NewProduct) -> Result<()> {
    require_text("product name", &product.name)?;
    if product.price.amount().is_sign_negative() {
        return Err(ClientError::InvalidArgument(
            "price must not be negative".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use shopfront_core::{CategoryId, Money};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::api::tests::signed_in_api;
    use crate::session::tests::signed_in;

    async fn back_office(server: &MockServer, role: Role) -> BackOffice {
        let api = signed_in_api(server, "kc-1", &[]).await;
        BackOffice::new(api, signed_in("kc-1", role).await)
    }

    #[tokio::test]
    async fn test_customer_is_forbidden_without_request() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&server)
            .await;

        let office = back_office(&server, Role::Customer).await;
        assert!(matches!(
            office.delete_product(ProductId::new(1)).await,
            Err(ClientError::Forbidden {
                required: Role::Admin
            })
        ));
    }

    #[tokio::test]
    async fn test_delete_product_accepts_no_content() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/admin/product/3"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let office = back_office(&server, Role::Admin).await;
        office.delete_product(ProductId::new(3)).await.unwrap();
    }

    #[tokio::test]
    async fn test_validation_happens_before_request() {
        let server = MockServer::start().await;
        let office = back_office(&server, Role::Admin).await;

        let product = NewProduct {
            name: "  ".to_string(),
            description: String::new(),
            price: Money::from(1),
            category_id: CategoryId::new(1),
            image: None,
        };
        assert!(matches!(
            office.create_product(&product).await,
            Err(ClientError::InvalidArgument(_))
        ));
        assert!(matches!(
            office
                .change_order_status(OrderId::new(1), OrderStatus::Pending)
                .await,
            Err(ClientError::InvalidArgument(_))
        ));
        assert!(matches!(
            office.create_faq("Why?", "").await,
            Err(ClientError::InvalidArgument(_))
        ));
    }
}
