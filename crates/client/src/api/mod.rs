//! Typed endpoints of the storefront backend.
//!
//! [`StoreApi`] turns gateway payloads into domain models. Catalog listings
//! are cached with `moka` for a short TTL; everything else goes to the
//! backend every time.
//!
//! Role checks are not made here. [`crate::account::CustomerAccount`] and
//! [`crate::back_office::BackOffice`] gate these calls on the session role.

mod admin;
mod cache;
mod conversions;
mod customer;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use shopfront_core::ProductId;
use tracing::{debug, instrument};

use crate::gateway::{ApiError, ApiGateway};
use crate::models::{Product, ProductDetail};

use cache::{CacheKey, CacheValue};
use conversions::{convert_product_detail, convert_products};
use types::{ProductDetailDto, ProductDto};

/// Client for the backend REST API.
#[derive(Clone)]
pub struct StoreApi {
    inner: Arc<StoreApiInner>,
}

struct StoreApiInner {
    gateway: ApiGateway,
    cache: Cache<CacheKey, CacheValue>,
}

impl StoreApi {
    /// Create an API client whose catalog cache entries live for `cache_ttl`.
    #[must_use]
    pub fn new(gateway: ApiGateway, cache_ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(cache_ttl)
            .build();

        Self {
            inner: Arc::new(StoreApiInner { gateway, cache }),
        }
    }

    #[must_use]
    pub fn gateway(&self) -> &ApiGateway {
        &self.inner.gateway
    }

    /// Drop every cached catalog entry.
    pub fn invalidate_catalog(&self) {
        self.inner.cache.invalidate_all();
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Catalog
    // ─────────────────────────────────────────────────────────────────────────

    /// All products.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails.
    pub async fn products(&self) -> Result<Vec<Product>, ApiError> {
        self.product_list(CacheKey::Products, "/api/customer/products".to_string())
            .await
    }

    /// Products in the named category.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails.
    pub async fn products_by_category(&self, category: &str) -> Result<Vec<Product>, ApiError> {
        let path = format!(
            "/api/customer/products/category/{}",
            urlencoding::encode(category)
        );
        self.product_list(CacheKey::Category(category.to_string()), path)
            .await
    }

    /// Products whose name matches `term`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails.
    pub async fn search_products(&self, term: &str) -> Result<Vec<Product>, ApiError> {
        let term = term.trim();
        if term.is_empty() {
            return self.products().await;
        }
        let path = format!("/api/customer/search/{}", urlencoding::encode(term));
        self.product_list(CacheKey::Search(term.to_lowercase()), path)
            .await
    }

    /// Product with its reviews and FAQs.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails or the product does not exist.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn product_detail(&self, id: ProductId) -> Result<ProductDetail, ApiError> {
        let key = CacheKey::Detail(id);
        if let Some(CacheValue::Detail(detail)) = self.inner.cache.get(&key).await {
            debug!("Cache hit for product detail");
            return Ok(*detail);
        }

        let dto: ProductDetailDto = self
            .inner
            .gateway
            .get(&format!("/api/customer/product/{id}"))
            .await?
            .into_json()?;
        let detail = convert_product_detail(dto);

        self.inner
            .cache
            .insert(key, CacheValue::Detail(Box::new(detail.clone())))
            .await;
        Ok(detail)
    }

    #[instrument(skip(self, key))]
    async fn product_list(&self, key: CacheKey, path: String) -> Result<Vec<Product>, ApiError> {
        if let Some(CacheValue::Products(products)) = self.inner.cache.get(&key).await {
            debug!("Cache hit for product list");
            return Ok(products);
        }

        let dtos: Vec<ProductDto> = self
            .inner
            .gateway
            .get(&path)
            .await?
            .into_optional()?
            .unwrap_or_default();
        let products = convert_products(dtos);

        self.inner
            .cache
            .insert(key, CacheValue::Products(products.clone()))
            .await;
        Ok(products)
    }
}
