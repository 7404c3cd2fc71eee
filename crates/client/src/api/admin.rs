//! Back-office endpoints: categories, products, orders, analytics and FAQs.

use reqwest::multipart::{Form, Part};
use shopfront_core::{OrderId, OrderStatus, ProductId};
use tracing::instrument;

use super::StoreApi;
use super::conversions::{
    convert_analytics, convert_category, convert_faq, convert_order, convert_orders,
    convert_product, convert_products,
};
use super::types::{
    AnalyticsDto, CategoryDto, CategoryRequest, FaqDto, FaqRequest, OrderDto, ProductDto,
};
use crate::gateway::ApiError;
use crate::models::{Analytics, Category, Faq, NewProduct, Order, Product};

impl StoreApi {
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails.
    #[instrument(skip(self))]
    pub async fn categories(&self) -> Result<Vec<Category>, ApiError> {
        let dtos: Option<Vec<CategoryDto>> =
            self.inner.gateway.get("/api/admin").await?.into_optional()?;
        Ok(dtos
            .unwrap_or_default()
            .into_iter()
            .map(convert_category)
            .collect())
    }

    /// # Errors
    ///
    /// Returns `ApiError` if the request fails.
    #[instrument(skip(self, description))]
    pub async fn create_category(
        &self,
        name: &str,
        description: &str,
    ) -> Result<Category, ApiError> {
        let dto: CategoryDto = self
            .inner
            .gateway
            .post(
                "/api/admin/category",
                &CategoryRequest { name, description },
            )
            .await?
            .into_json()?;
        Ok(convert_category(dto))
    }

    /// Every product, uncached.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails.
    #[instrument(skip(self))]
    pub async fn admin_products(&self) -> Result<Vec<Product>, ApiError> {
        let dtos: Option<Vec<ProductDto>> = self
            .inner
            .gateway
            .get("/api/admin/products")
            .await?
            .into_optional()?;
        Ok(convert_products(dtos.unwrap_or_default()))
    }

    /// # Errors
    ///
    /// Returns `ApiError` if the request fails.
    #[instrument(skip_all, fields(name = %product.name))]
    pub async fn create_product(&self, product: &NewProduct) -> Result<Product, ApiError> {
        let dto: ProductDto = self
            .inner
            .gateway
            .post_multipart("/api/admin/product", product_form(product)?)
            .await?
            .into_json()?;
        self.invalidate_catalog();
        Ok(convert_product(dto))
    }

    /// # Errors
    ///
    /// Returns `ApiError` if the request fails.
    #[instrument(skip(self, product), fields(product_id = %id))]
    pub async fn update_product(
        &self,
        id: ProductId,
        product: &NewProduct,
    ) -> Result<Product, ApiError> {
        let dto: ProductDto = self
            .inner
            .gateway
            .put_multipart(&format!("/api/admin/product/{id}"), product_form(product)?)
            .await?
            .into_json()?;
        self.invalidate_catalog();
        Ok(convert_product(dto))
    }

    /// # Errors
    ///
    /// Returns `ApiError` if the request fails.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn delete_product(&self, id: ProductId) -> Result<(), ApiError> {
        self.inner
            .gateway
            .delete(&format!("/api/admin/product/{id}"))
            .await?;
        self.invalidate_catalog();
        Ok(())
    }

    /// Orders past the cart stage.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails.
    #[instrument(skip(self))]
    pub async fn placed_orders(&self) -> Result<Vec<Order>, ApiError> {
        let dtos: Option<Vec<OrderDto>> = self
            .inner
            .gateway
            .get("/api/admin/placedOrders")
            .await?
            .into_optional()?;
        Ok(convert_orders(dtos.unwrap_or_default()))
    }

    /// Move an order to `status`.
    ///
    /// The backend exposes this as a GET. Setting a status is idempotent, so
    /// the gateway's read retries apply.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails.
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn change_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, ApiError> {
        let dto: OrderDto = self
            .inner
            .gateway
            .get(&format!("/api/admin/order/{id}/{}", status.as_str()))
            .await?
            .into_json()?;
        Ok(convert_order(dto))
    }

    /// # Errors
    ///
    /// Returns `ApiError` if the request fails.
    #[instrument(skip(self))]
    pub async fn analytics(&self) -> Result<Analytics, ApiError> {
        let dto: AnalyticsDto = self
            .inner
            .gateway
            .get("/api/admin/order/analytics")
            .await?
            .into_optional()?
            .unwrap_or_default();
        Ok(convert_analytics(dto))
    }

    /// # Errors
    ///
    /// Returns `ApiError` if the request fails.
    #[instrument(skip(self))]
    pub async fn admin_faqs(&self) -> Result<Vec<Faq>, ApiError> {
        let dtos: Option<Vec<FaqDto>> = self
            .inner
            .gateway
            .get("/api/admin/faqs")
            .await?
            .into_optional()?;
        Ok(dtos.unwrap_or_default().into_iter().map(convert_faq).collect())
    }

    /// # Errors
    ///
    /// Returns `ApiError` if the request fails.
    #[instrument(skip_all)]
    pub async fn create_faq(&self, question: &str, answer: &str) -> Result<Faq, ApiError> {
        let dto: FaqDto = self
            .inner
            .gateway
            .post("/api/admin/faq", &FaqRequest { question, answer })
            .await?
            .into_json()?;
        Ok(convert_faq(dto))
    }
}

/// Multipart form for product create/update. The image goes in the `img` part.
fn product_form(product: &NewProduct) -> Result<Form, ApiError> {
    let mut form = Form::new()
        .text("name", product.name.clone())
        .text("description", product.description.clone())
        .text("price", product.price.amount().to_string())
        .text("categoryId", product.category_id.to_string());

    if let Some(bytes) = &product.image {
        let part = Part::bytes(bytes.clone())
            .file_name("image.jpg")
            .mime_str("image/jpeg")?;
        form = form.part("img", part);
    }

    Ok(form)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use shopfront_core::{CategoryId, Money};
    use wiremock::matchers::{body_string_contains, header_regex, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::api::tests::{product_json, signed_in_api};

    #[tokio::test]
    async fn test_create_product_is_multipart() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/admin/product"))
            .and(header_regex("content-type", "^multipart/form-data; boundary="))
            .and(body_string_contains("name=\"categoryId\""))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(product_json(5, "Desk", 99.9)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let api = signed_in_api(&server, "kc-admin", &["admin"]).await;
        let product = api
            .create_product(&NewProduct {
                name: "Desk".to_string(),
                description: "Oak".to_string(),
                price: Money::from_minor(9990),
                category_id: CategoryId::new(1),
                image: Some(vec![0xFF, 0xD8]),
            })
            .await
            .unwrap();
        assert_eq!(product.id, ProductId::new(5));
    }

    #[tokio::test]
    async fn test_change_order_status_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/admin/order/4/Shipped"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": 4, "orderStatus": "Shipped", "cartItems": []
            })))
            .expect(1)
            .mount(&server)
            .await;

        let api = signed_in_api(&server, "kc-admin", &["admin"]).await;
        let order = api
            .change_order_status(OrderId::new(4), OrderStatus::Shipped)
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Shipped);
    }

    #[tokio::test]
    async fn test_analytics() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/admin/order/analytics"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "placed": 3, "shipped": 2, "delivered": 1,
                "currentMonthOrders": 4, "previousMonthOrders": 2,
                "currentMonthEarnings": 120, "previousMonthEarnings": 80
            })))
            .mount(&server)
            .await;

        let api = signed_in_api(&server, "kc-admin", &["admin"]).await;
        let analytics = api.analytics().await.unwrap();
        assert_eq!(analytics.placed, 3);
        assert_eq!(analytics.current_month_earnings, Money::from(120));
    }
}
