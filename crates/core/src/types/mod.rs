//! Core types for Shopfront.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod image;
pub mod money;
pub mod role;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use image::ImageRef;
pub use money::Money;
pub use role::{Role, RoleError};
pub use status::{OrderStatus, OrderStatusError};
