//! Embedded product and profile images.
//!
//! The backend stores images as raw bytes and serializes them into JSON as
//! standard base64 strings. [`ImageRef`] keeps that payload as-is and renders
//! it as a `data:` URL on demand.

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};

/// MIME type used when rendering images as data URLs.
const IMAGE_MIME: &str = "image/jpeg";

/// A base64-encoded image payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageRef(String);

impl ImageRef {
    /// Wrap a base64 payload received from the backend.
    ///
    /// Returns `None` for an empty payload.
    #[must_use]
    pub fn from_base64(payload: impl Into<String>) -> Option<Self> {
        let payload = payload.into();
        if payload.trim().is_empty() {
            None
        } else {
            Some(Self(payload))
        }
    }

    /// Encode raw image bytes.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(STANDARD.encode(bytes))
    }

    /// The base64 payload.
    #[must_use]
    pub fn as_base64(&self) -> &str {
        &self.0
    }

    /// Render as `data:image/jpeg;base64,<payload>`.
    #[must_use]
    pub fn data_url(&self) -> String {
        format!("data:{IMAGE_MIME};base64,{}", self.0)
    }

    /// Decode the payload back into bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not valid base64.
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(self.0.as_bytes())
    }
}
