//! Cache types for catalog responses.

use shopfront_core::ProductId;

use crate::models::{Product, ProductDetail};

/// Cache key for catalog reads.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum CacheKey {
    Products,
    Category(String),
    Search(String),
    Detail(ProductId),
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Products(Vec<Product>),
    Detail(Box<ProductDetail>),
}
