//! Command implementations.
//!
//! Each module maps one top-level command onto the client library and
//! prints the result with [`crate::output`].

pub mod admin;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod orders;
pub mod profile;
pub mod wishlist;

use shopfront_client::ClientError;
use thiserror::Error;

/// Errors that can end a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The client library failed.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Reading input or writing output failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The command line named something that does not exist.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
