//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SHOPFRONT_API_BASE_URL` - Backend REST API base URL (e.g. `http://localhost:8081`)
//! - `SHOPFRONT_OIDC_URL` - Identity provider base URL (e.g. `http://localhost:8090`)
//! - `SHOPFRONT_OIDC_REALM` - Identity provider realm (e.g. `ecommerce`)
//! - `SHOPFRONT_OIDC_CLIENT_ID` - OAuth client ID
//!
//! ## Optional
//! - `SHOPFRONT_OIDC_CLIENT_SECRET` - OAuth client secret (confidential clients only)
//! - `SHOPFRONT_REDIRECT_URI` - Login callback URI (default: `http://localhost:3000/login`)
//! - `SHOPFRONT_TOKEN_MIN_VALIDITY_SECS` - Refresh tokens with less validity left (default: 60)
//! - `SHOPFRONT_MAX_RETRIES` - Retries for idempotent reads (default: 2)
//! - `SHOPFRONT_REQUEST_TIMEOUT_SECS` - Per-request timeout (default: 30)
//! - `SHOPFRONT_CATALOG_CACHE_TTL_SECS` - Product listing cache TTL (default: 300)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "insert",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend REST API base URL
    pub api_base_url: Url,
    /// Identity provider configuration
    pub oidc: OidcConfig,
    /// Minimum remaining token validity before a request triggers a refresh
    pub token_min_validity_secs: i64,
    /// Retries for idempotent reads after the first attempt
    pub max_retries: u32,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Product listing cache TTL
    pub catalog_cache_ttl: Duration,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

/// OpenID Connect identity provider configuration.
///
/// Implements `Debug` manually to redact the client secret.
#[derive(Clone)]
pub struct OidcConfig {
    /// Provider base URL
    pub base_url: Url,
    /// Realm that issues storefront tokens
    pub realm: String,
    /// OAuth client ID (public)
    pub client_id: String,
    /// OAuth client secret, absent for public clients
    pub client_secret: Option<SecretString>,
    /// Where the provider sends the browser after login
    pub redirect_uri: String,
}

impl std::fmt::Debug for OidcConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OidcConfig")
            .field("base_url", &self.base_url.as_str())
            .field("realm", &self.realm)
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("redirect_uri", &self.redirect_uri)
            .finish()
    }
}

impl ClientConfig {
    /// Default minimum token validity in seconds.
    pub const DEFAULT_MIN_VALIDITY_SECS: i64 = 60;

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api_base_url = get_url("SHOPFRONT_API_BASE_URL")?;
        let oidc = OidcConfig::from_env()?;
        let token_min_validity_secs = get_parsed_or_default(
            "SHOPFRONT_TOKEN_MIN_VALIDITY_SECS",
            Self::DEFAULT_MIN_VALIDITY_SECS,
        )?;
        let max_retries = get_parsed_or_default("SHOPFRONT_MAX_RETRIES", 2u32)?;
        let request_timeout =
            Duration::from_secs(get_parsed_or_default("SHOPFRONT_REQUEST_TIMEOUT_SECS", 30u64)?);
        let catalog_cache_ttl = Duration::from_secs(get_parsed_or_default(
            "SHOPFRONT_CATALOG_CACHE_TTL_SECS",
            300u64,
        )?);
        let sentry_dsn = get_optional_env("SENTRY_DSN");

        Ok(Self {
            api_base_url,
            oidc,
            token_min_validity_secs,
            max_retries,
            request_timeout,
            catalog_cache_ttl,
            sentry_dsn,
        })
    }

    /// Configuration pointing both the backend and the provider at local URLs.
    ///
    /// Used by tests and examples that run against mock servers.
    #[must_use]
    pub fn local(api_base_url: Url, oidc_base_url: Url) -> Self {
        Self {
            api_base_url,
            oidc: OidcConfig {
                base_url: oidc_base_url,
                realm: "ecommerce".to_string(),
                client_id: "ecommerce-app".to_string(),
                client_secret: None,
                redirect_uri: "http://localhost:3000/login".to_string(),
            },
            token_min_validity_secs: Self::DEFAULT_MIN_VALIDITY_SECS,
            max_retries: 2,
            request_timeout: Duration::from_secs(30),
            catalog_cache_ttl: Duration::from_secs(300),
            sentry_dsn: None,
        }
    }
}

impl OidcConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let client_secret = match get_optional_env("SHOPFRONT_OIDC_CLIENT_SECRET") {
            Some(value) => {
                validate_secret_strength(&value, "SHOPFRONT_OIDC_CLIENT_SECRET")?;
                Some(SecretString::from(value))
            }
            None => None,
        };

        Ok(Self {
            base_url: get_url("SHOPFRONT_OIDC_URL")?,
            realm: get_required_env("SHOPFRONT_OIDC_REALM")?,
            client_id: get_required_env("SHOPFRONT_OIDC_CLIENT_ID")?,
            client_secret,
            redirect_uri: get_env_or_default(
                "SHOPFRONT_REDIRECT_URI",
                "http://localhost:3000/login",
            ),
        })
    }

    /// Expose the client secret for a token request.
    pub(crate) fn client_secret(&self) -> Option<&str> {
        self.client_secret.as_ref().map(ExposeSecret::expose_secret)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable, treating empty values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Get a required environment variable as an absolute URL.
fn get_url(key: &str) -> Result<Url, ConfigError> {
    parse_url(key, &get_required_env(key)?)
}

fn parse_url(key: &str, value: &str) -> Result<Url, ConfigError> {
    let url =
        Url::parse(value).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be an absolute http(s) URL".to_string(),
        ));
    }
    Ok(url)
}

/// Parse an optional environment variable, falling back to a default.
fn get_parsed_or_default<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_optional_env(key).map_or(Ok(default), |value| {
        value
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

/// Reject secrets that look like copied placeholder values.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();
    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("appears to be a placeholder (contains '{pattern}')"),
        ));
    }
    Ok(())
}
