//! Typed HTTP gateway to the storefront backend.
//!
//! Every request goes through [`ApiGateway`], which:
//!
//! - refreshes the access token before sending when it is close to expiry
//! - on a 401, renews the token once and sends the request again; a token
//!   the backend still rejects is revoked, which ends the session
//! - attaches `Authorization: Bearer <token>` (public endpoints skip this)
//! - maps responses to [`Payload`] or a typed [`ApiError`]
//! - retries idempotent reads on transient failures; mutations are sent once
//!
//! There is no fallback data. A failed call is an error.

use std::sync::Arc;
use std::time::Duration;

use reqwest::multipart::Form;
use reqwest::{Method, StatusCode, header};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::config::ClientConfig;
use crate::error::add_breadcrumb;
use crate::identity::{IdentityError, TokenHolder};

/// Longest error body kept in `ApiError::Status`.
const MAX_ERROR_BODY: usize = 500;

/// Errors that can occur when calling the backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// No usable access token for an authenticated call.
    #[error("Unauthorized: {0}")]
    Unauthorized(#[source] IdentityError),

    /// Rate limited by the backend.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// A body was expected but the backend sent none.
    #[error("Empty response body")]
    EmptyBody,
}

impl ApiError {
    /// HTTP status carried by the error, if any.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::RateLimited(_) => Some(429),
            _ => None,
        }
    }

    /// Whether the backend or the provider refused the credentials.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_) | Self::Status { status: 401, .. })
    }

    /// Whether the failure is worth retrying for an idempotent request.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Status { status, .. } => *status >= 500,
            Self::RateLimited(_) => true,
            _ => false,
        }
    }

    /// Whether the failure points at the backend rather than the request.
    #[must_use]
    pub fn is_server_fault(&self) -> bool {
        match self {
            Self::Http(_) | Self::Parse(_) => true,
            Self::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// A successful response.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// 204, or a body that is not JSON.
    Empty,
    Json(serde_json::Value),
}

impl Payload {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Deserialize the body.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::EmptyBody` for an empty payload, or
    /// `ApiError::Parse` if the JSON does not match `T`.
    pub fn into_json<T: DeserializeOwned>(self) -> Result<T, ApiError> {
        match self {
            Self::Empty => Err(ApiError::EmptyBody),
            Self::Json(value) => Ok(serde_json::from_value(value)?),
        }
    }

    /// Deserialize the body, treating an empty payload or JSON `null` as `None`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Parse` if the JSON does not match `T`.
    pub fn into_optional<T: DeserializeOwned>(self) -> Result<Option<T>, ApiError> {
        match self {
            Self::Empty | Self::Json(serde_json::Value::Null) => Ok(None),
            Self::Json(value) => Ok(Some(serde_json::from_value(value)?)),
        }
    }
}

/// Whether a request carries the user's token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Auth {
    Bearer,
    Public,
}

enum Body {
    None,
    Json(serde_json::Value),
    Multipart(Form),
}

impl Body {
    /// A copy to send again, if the body can be rebuilt.
    fn replay(&self) -> Option<Self> {
        match self {
            Self::None => Some(Self::None),
            Self::Json(value) => Some(Self::Json(value.clone())),
            Self::Multipart(_) => None,
        }
    }
}

/// Transport tuning for the gateway.
#[derive(Debug, Clone, Copy)]
pub struct GatewayOptions {
    /// Retries after the first attempt, for GET only.
    pub max_retries: u32,
    pub request_timeout: Duration,
    /// Delay before retry `n` is `retry_backoff * n`.
    pub retry_backoff: Duration,
}

impl GatewayOptions {
    #[must_use]
    pub const fn from_config(config: &ClientConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            request_timeout: config.request_timeout,
            retry_backoff: Duration::from_millis(250),
        }
    }
}

/// HTTP gateway to the backend REST API.
#[derive(Clone)]
pub struct ApiGateway {
    inner: Arc<ApiGatewayInner>,
}

struct ApiGatewayInner {
    client: reqwest::Client,
    base_url: String,
    tokens: TokenHolder,
    options: GatewayOptions,
}

impl ApiGateway {
    /// Create a gateway for `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Http` if the HTTP client cannot be built.
    pub fn new(
        base_url: &url::Url,
        tokens: TokenHolder,
        options: GatewayOptions,
    ) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(options.request_timeout)
            .user_agent(concat!("shopfront/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            inner: Arc::new(ApiGatewayInner {
                client,
                base_url: base_url.as_str().trim_end_matches('/').to_string(),
                tokens,
                options,
            }),
        })
    }

    /// Tokens used for authenticated calls.
    #[must_use]
    pub fn tokens(&self) -> &TokenHolder {
        &self.inner.tokens
    }

    /// Authenticated GET.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` once retries are exhausted.
    pub async fn get(&self, path: &str) -> Result<Payload, ApiError> {
        self.get_with(path, Auth::Bearer).await
    }

    /// GET without credentials.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` once retries are exhausted.
    pub async fn get_public(&self, path: &str) -> Result<Payload, ApiError> {
        self.get_with(path, Auth::Public).await
    }

    /// Authenticated POST with a JSON body.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on any failure; the request is not retried.
    pub async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Payload, ApiError> {
        let body = Body::Json(serde_json::to_value(body)?);
        self.send(Method::POST, path, body, Auth::Bearer).await
    }

    /// Authenticated PUT with a JSON body.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on any failure; the request is not retried.
    pub async fn put<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Payload, ApiError> {
        let body = Body::Json(serde_json::to_value(body)?);
        self.send(Method::PUT, path, body, Auth::Bearer).await
    }

    /// Authenticated DELETE.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on any failure; the request is not retried.
    pub async fn delete(&self, path: &str) -> Result<Payload, ApiError> {
        self.send(Method::DELETE, path, Body::None, Auth::Bearer)
            .await
    }

    /// Authenticated multipart POST.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on any failure; the request is not retried.
    pub async fn post_multipart(&self, path: &str, form: Form) -> Result<Payload, ApiError> {
        self.send(Method::POST, path, Body::Multipart(form), Auth::Bearer)
            .await
    }

    /// Authenticated multipart PUT.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on any failure; the request is not retried.
    pub async fn put_multipart(&self, path: &str, form: Form) -> Result<Payload, ApiError> {
        self.send(Method::PUT, path, Body::Multipart(form), Auth::Bearer)
            .await
    }

    async fn get_with(&self, path: &str, auth: Auth) -> Result<Payload, ApiError> {
        let max_retries = self.inner.options.max_retries;
        let mut attempt = 0u32;

        loop {
            match self.send(Method::GET, path, Body::None, auth).await {
                Err(e) if attempt < max_retries && e.is_transient() => {
                    attempt += 1;
                    warn!(path, attempt, error = %e, "Retrying GET");
                    add_breadcrumb("http", "Retrying GET", Some(&[("path", path)][..]));
                    tokio::time::sleep(self.inner.options.retry_backoff * attempt).await;
                }
                result => return result,
            }
        }
    }

    #[instrument(skip(self, method, body), fields(method = %method))]
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Body,
        auth: Auth,
    ) -> Result<Payload, ApiError> {
        if auth == Auth::Public {
            return self.send_once(method, path, body, None).await;
        }

        let token = self.bearer().await?;
        let replay = body.replay();
        let result = self.send_once(method.clone(), path, body, Some(&token)).await;

        match result {
            Err(e) if e.status() == Some(401) => {
                warn!(path, "Backend rejected the access token");
                self.inner
                    .tokens
                    .refresh_rejected(&token)
                    .await
                    .map_err(ApiError::Unauthorized)?;

                // A multipart form is consumed by the first attempt
                let Some(body) = replay else {
                    return Err(e);
                };
                let token = self.bearer().await?;
                let retried = self.send_once(method, path, body, Some(&token)).await;
                if retried.as_ref().err().and_then(ApiError::status) == Some(401) {
                    warn!(path, "Renewed token rejected too, ending session");
                    self.inner.tokens.revoke().await;
                }
                retried
            }
            result => result,
        }
    }

    async fn bearer(&self) -> Result<SecretString, ApiError> {
        self.inner
            .tokens
            .access_token()
            .await
            .map_err(ApiError::Unauthorized)
    }

    async fn send_once(
        &self,
        method: Method,
        path: &str,
        body: Body,
        token: Option<&SecretString>,
    ) -> Result<Payload, ApiError> {
        let url = format!("{}{path}", self.inner.base_url);
        let mut request = self.inner.client.request(method, &url);

        if let Some(token) = token {
            request = request.bearer_auth(token.expose_secret());
        }

        request = match body {
            Body::None => request,
            Body::Json(value) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(value.to_string()),
            // reqwest sets the multipart content type with its boundary
            Body::Multipart(form) => request.multipart(form),
        };

        let response = request.send().await?;
        read_response(response).await
    }
}

/// Map a response to a payload or error.
async fn read_response(response: reqwest::Response) -> Result<Payload, ApiError> {
    let status = response.status();

    if status == StatusCode::NO_CONTENT {
        return Ok(Payload::Empty);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(1);
        return Err(ApiError::RateLimited(retry_after));
    }

    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("application/json"));

    let text = response.text().await?;

    if !status.is_success() {
        debug!(status = status.as_u16(), "Backend returned non-success status");
        return Err(ApiError::Status {
            status: status.as_u16(),
            body: text.chars().take(MAX_ERROR_BODY).collect(),
        });
    }

    if !is_json || text.trim().is_empty() {
        return Ok(Payload::Empty);
    }

    Ok(Payload::Json(serde_json::from_str(&text)?))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::Ordering;

    use url::Url;
    use wiremock::matchers::{body_json, header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::identity::testing::StaticProvider;

    async fn gateway(
        server: &MockServer,
        token_lifetime: i64,
    ) -> (ApiGateway, Arc<StaticProvider>) {
        let provider = Arc::new(StaticProvider::new("kc-1", &["customer"]));
        let tokens = TokenHolder::new(provider.clone(), 60);
        tokens.set(provider.issue(token_lifetime)).await;
        let gateway = ApiGateway::new(
            &Url::parse(&server.uri()).unwrap(),
            tokens,
            GatewayOptions {
                max_retries: 2,
                request_timeout: Duration::from_secs(5),
                retry_backoff: Duration::ZERO,
            },
        )
        .unwrap();
        (gateway, provider)
    }

    #[tokio::test]
    async fn test_get_attaches_bearer_and_parses_json() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/customer/cart"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": 1})))
            .expect(1)
            .mount(&server)
            .await;

        let (gateway, _) = gateway(&server, 300).await;
        let payload = gateway.get("/api/customer/cart").await.unwrap();
        assert_eq!(payload, Payload::Json(serde_json::json!({"id": 1})));
    }

    #[tokio::test]
    async fn test_no_content_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/customer/cart/5"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let (gateway, _) = gateway(&server, 300).await;
        let payload = gateway.delete("/api/customer/cart/5").await.unwrap();
        assert!(payload.is_empty());
        assert_eq!(payload.into_optional::<serde_json::Value>().unwrap(), None);
    }

    #[tokio::test]
    async fn test_non_json_body_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/customer/cart/5"))
            .respond_with(ResponseTemplate::new(200).set_body_string("updated"))
            .mount(&server)
            .await;

        let (gateway, _) = gateway(&server, 300).await;
        let payload = gateway
            .put("/api/customer/cart/5", &serde_json::json!({"quantity": 2}))
            .await
            .unwrap();
        assert!(payload.is_empty());
    }

    #[tokio::test]
    async fn test_json_body_sets_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/customer/cart"))
            .and(header("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let (gateway, _) = gateway(&server, 300).await;
        gateway
            .post("/api/customer/cart", &serde_json::json!({"productId": 1}))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_error_status_is_typed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/customer/cart"))
            .respond_with(ResponseTemplate::new(409).set_body_string("Product already in cart"))
            .expect(1)
            .mount(&server)
            .await;

        let (gateway, _) = gateway(&server, 300).await;
        let err = gateway
            .post("/api/customer/cart", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(409));
        assert!(
            matches!(err, ApiError::Status { ref body, .. } if body == "Product already in cart")
        );
    }

    #[tokio::test]
    async fn test_get_retries_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/customer/products"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/customer/products"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let (gateway, _) = gateway(&server, 300).await;
        let payload = gateway.get("/api/customer/products").await.unwrap();
        assert_eq!(payload, Payload::Json(serde_json::json!([])));
    }

    #[tokio::test]
    async fn test_get_gives_up_after_max_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/customer/products"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let (gateway, _) = gateway(&server, 300).await;
        let err = gateway.get("/api/customer/products").await.unwrap_err();
        assert_eq!(err.status(), Some(500));
    }

    #[tokio::test]
    async fn test_mutations_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/customer/cart"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let (gateway, _) = gateway(&server, 300).await;
        assert!(gateway.delete("/api/customer/cart").await.is_err());
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/admin/products"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;

        let (gateway, _) = gateway(&server, 300).await;
        let err = gateway.get("/api/admin/products").await.unwrap_err();
        assert_eq!(err.status(), Some(403));
    }

    #[tokio::test]
    async fn test_rejected_token_renewed_and_request_replayed() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/customer/cart/3"))
            .respond_with(ResponseTemplate::new(401))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/api/customer/cart/3"))
            .and(body_json(serde_json::json!({"quantity": 2})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let (gateway, provider) = gateway(&server, 300).await;
        let payload = gateway
            .put("/api/customer/cart/3", &serde_json::json!({"quantity": 2}))
            .await
            .unwrap();

        assert!(payload.is_empty());
        assert_eq!(provider.refresh_calls.load(Ordering::SeqCst), 1);
        assert!(gateway.tokens().is_authenticated().await);
    }

    #[tokio::test]
    async fn test_token_rejected_twice_is_revoked() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/user/profile"))
            .respond_with(ResponseTemplate::new(401))
            .expect(2)
            .mount(&server)
            .await;

        let (gateway, _) = gateway(&server, 300).await;
        let revoked = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = revoked.clone();
        gateway.tokens().on_revoked(move || flag.store(true, Ordering::SeqCst));

        let err = gateway.get("/api/user/profile").await.unwrap_err();

        assert!(err.is_unauthorized());
        assert!(!gateway.tokens().is_authenticated().await);
        assert!(revoked.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_refreshes_expiring_token_before_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/customer/wishlist"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let (gateway, provider) = gateway(&server, 20).await;
        gateway.get("/api/customer/wishlist").await.unwrap();
        assert_eq!(provider.refresh_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_public_get_without_session() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/order/trackOrder/abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!(null)))
            .mount(&server)
            .await;

        let (gateway, _) = gateway(&server, 300).await;
        gateway.tokens().clear().await;

        assert!(matches!(
            gateway.get("/api/customer/cart").await,
            Err(ApiError::Unauthorized(_))
        ));
        let payload = gateway.get_public("/order/trackOrder/abc").await.unwrap();
        assert_eq!(payload.into_optional::<serde_json::Value>().unwrap(), None);
    }

    #[test]
    fn test_into_json_empty() {
        assert!(matches!(
            Payload::Empty.into_json::<serde_json::Value>(),
            Err(ApiError::EmptyBody)
        ));
    }
}
