//! Shopfront client library.
//!
//! Everything a storefront front end needs besides its views: who is signed
//! in, typed calls to the backend, client-held mirrors of the cart and
//! wishlist, and the role checks that gate each page.
//!
//! # Architecture
//!
//! ```text
//! SessionContext ──watch──▶ CartSync / WishlistSync
//!       │                          │
//!       ▼                          ▼
//!  TokenHolder ◀── ApiGateway ◀── StoreApi
//!       │
//!  IdentityProvider (OIDC)
//! ```
//!
//! [`state::AppState`] builds and wires all of it from a
//! [`config::ClientConfig`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod account;
pub mod api;
pub mod back_office;
pub mod cart;
pub mod config;
pub mod error;
pub mod gateway;
pub mod guard;
pub mod identity;
mod mirror;
pub mod models;
pub mod navigation;
pub mod session;
pub mod state;
pub mod wishlist;

pub use account::CustomerAccount;
pub use api::StoreApi;
pub use back_office::BackOffice;
pub use cart::{CartBackend, CartSnapshot, CartSync};
pub use config::{ClientConfig, ConfigError, OidcConfig};
pub use error::{ClientError, Result};
pub use gateway::{ApiError, ApiGateway, GatewayOptions, Payload};
pub use guard::{GuardDecision, GuardState, RouteGuard};
pub use identity::{IdentityError, IdentityProvider, OidcProvider, TokenHolder};
pub use mirror::SyncStatus;
pub use navigation::{Navigation, Route};
pub use session::{ProfileBackend, SessionContext, SessionState};
pub use state::{AppState, SyncTasks};
pub use wishlist::{WishlistBackend, WishlistSnapshot, WishlistSync};
