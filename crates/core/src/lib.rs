//! Shopfront Core - Shared domain types.
//!
//! This crate provides the types shared by every Shopfront component:
//! - `client` - Session context, API gateway, cart/wishlist synchronizers
//! - `cli` - Terminal front end driving the client
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients. Everything
//! here can be constructed and tested without a backend.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, money, roles, emails, order statuses and images

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
