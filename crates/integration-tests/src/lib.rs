//! Integration tests for the Shopfront client.
//!
//! The client runs unmodified against a [`wiremock`] server that plays both
//! the identity provider and the storefront backend. The backend double
//! keeps carts and wishlists per token subject, so the tests observe what a
//! real backend would return after each mutation.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p shopfront-integration-tests
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::{Value, json};
use shopfront_client::{AppState, ClientConfig};
use shopfront_core::Role;
use url::Url;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Path of the realm's OpenID Connect endpoints on the mock server.
pub const OIDC_PATH: &str = "/realms/ecommerce/protocol/openid-connect";

/// Access token lifetime handed out by the identity double.
const TOKEN_LIFETIME_SECS: i64 = 300;

/// An unsigned JWT carrying `subject` and `roles`.
#[must_use]
pub fn access_token(subject: &str, roles: &[&str]) -> String {
    let exp = chrono::Utc::now().timestamp() + TOKEN_LIFETIME_SECS;
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(
        json!({
            "sub": subject,
            "exp": exp,
            "email": format!("{subject}@shop.test"),
            "preferred_username": subject,
            "realm_access": { "roles": roles },
        })
        .to_string(),
    );
    format!("{header}.{payload}.")
}

/// Subject of the bearer token on `request`, if any.
fn bearer_subject(request: &Request) -> Option<String> {
    let header = request.headers.get("authorization")?.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?;
    let payload = token.split('.').nth(1)?;
    let claims: Value = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(payload).ok()?).ok()?;
    claims.get("sub")?.as_str().map(String::from)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ─────────────────────────────────────────────────────────────────────────────
// Identity provider and profile
// ─────────────────────────────────────────────────────────────────────────────

/// Who the identity double signs in, and what the profile endpoint answers.
#[derive(Clone, Default)]
pub struct IdentityDouble {
    current: Arc<Mutex<Option<(String, Role)>>>,
    profile_status: Arc<Mutex<Option<u16>>>,
}

impl IdentityDouble {
    /// Issue tokens for `subject` from now on.
    pub fn sign_in_as(&self, subject: &str, role: Role) {
        *lock(&self.current) = Some((subject.to_string(), role));
    }

    /// Make the profile endpoint fail with `status`.
    pub fn fail_profile(&self, status: u16) {
        *lock(&self.profile_status) = Some(status);
    }

    fn current(&self) -> Option<(String, Role)> {
        lock(&self.current).clone()
    }
}

struct TokenResponder(IdentityDouble);

impl Respond for TokenResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let Some((subject, role)) = self.0.current() else {
            return ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_grant"}));
        };
        let roles: &[&str] = if role.is_admin() { &["admin"] } else { &["customer"] };
        ResponseTemplate::new(200).set_body_json(json!({
            "access_token": access_token(&subject, roles),
            "expires_in": TOKEN_LIFETIME_SECS,
            "refresh_token": format!("refresh-{subject}"),
            "refresh_expires_in": 1800,
            "id_token": format!("id-{subject}"),
            "token_type": "Bearer",
        }))
    }
}

struct ProfileResponder(IdentityDouble);

impl Respond for ProfileResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        if let Some(status) = *lock(&self.0.profile_status) {
            return ResponseTemplate::new(status);
        }
        let Some(subject) = bearer_subject(request) else {
            return ResponseTemplate::new(401);
        };
        let role = match self.0.current() {
            Some((current, Role::Admin)) if current == subject => "ADMIN",
            _ => "COSTUMER",
        };
        ResponseTemplate::new(200).set_body_json(json!({
            "id": 1,
            "keycloakId": subject,
            "email": format!("{subject}@shop.test"),
            "name": subject,
            "role": role,
        }))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Storefront backend
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
struct Line {
    id: i64,
    product_id: i64,
    price: f64,
    quantity: i64,
}

#[derive(Clone)]
struct Entry {
    id: i64,
    product_id: i64,
    price: f64,
}

#[derive(Default)]
struct StoreState {
    prices: HashMap<i64, f64>,
    carts: HashMap<String, Vec<Line>>,
    wishlists: HashMap<String, Vec<Entry>>,
    next_id: i64,
    requests: Vec<String>,
    reject_tokens: bool,
}

impl StoreState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn price(&self, product_id: i64) -> f64 {
        self.prices.get(&product_id).copied().unwrap_or(1.0)
    }

    fn order_json(&self, subject: &str) -> Value {
        let lines = self.carts.get(subject).cloned().unwrap_or_default();
        let total: f64 = lines
            .iter()
            .map(|line| line.price * f64::from(u32::try_from(line.quantity).unwrap_or(0)))
            .sum();
        json!({
            "id": 1,
            "orderStatus": "Pending",
            "amount": total,
            "totalAmount": total,
            "discount": 0,
            "cartItems": lines.iter().map(|line| json!({
                "id": line.id,
                "productId": line.product_id,
                "productName": format!("Product {}", line.product_id),
                "price": line.price,
                "quantity": line.quantity,
            })).collect::<Vec<_>>(),
        })
    }

    fn wishlist_json(&self, subject: &str) -> Value {
        let entries = self.wishlists.get(subject).cloned().unwrap_or_default();
        Value::Array(
            entries
                .iter()
                .map(|entry| {
                    json!({
                        "id": entry.id,
                        "productId": entry.product_id,
                        "productName": format!("Product {}", entry.product_id),
                        "price": entry.price,
                    })
                })
                .collect(),
        )
    }
}

/// In-memory storefront backend for the cart and wishlist endpoints.
#[derive(Clone, Default)]
pub struct FakeStore {
    state: Arc<Mutex<StoreState>>,
}

impl FakeStore {
    /// Set the price of a product.
    pub fn set_price(&self, product_id: i64, price: f64) {
        lock(&self.state).prices.insert(product_id, price);
    }

    /// Answer every request with 401, as a backend that no longer accepts
    /// the client's tokens does.
    pub fn reject_tokens(&self) {
        lock(&self.state).reject_tokens = true;
    }

    /// Requests received so far, as `METHOD /path`.
    #[must_use]
    pub fn requests(&self) -> Vec<String> {
        lock(&self.state).requests.clone()
    }

    /// The backend's view of `subject`'s cart as `(item_id, product_id, quantity)`.
    #[must_use]
    pub fn cart_lines(&self, subject: &str) -> Vec<(i64, i64, i64)> {
        lock(&self.state)
            .carts
            .get(subject)
            .map(|lines| {
                lines
                    .iter()
                    .map(|line| (line.id, line.product_id, line.quantity))
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn product_id_of(request: &Request) -> Option<i64> {
    request
        .body_json::<Value>()
        .ok()?
        .get("productId")?
        .as_i64()
}

impl Respond for FakeStore {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let mut state = lock(&self.state);
        state
            .requests
            .push(format!("{} {}", request.method, request.url.path()));

        if state.reject_tokens {
            return ResponseTemplate::new(401);
        }
        let Some(subject) = bearer_subject(request) else {
            return ResponseTemplate::new(401);
        };
        let route = request.url.path().trim_start_matches("/api/customer/");
        let segments: Vec<&str> = route.split('/').collect();

        match (request.method.as_str(), segments.as_slice()) {
            ("GET", ["cart"]) => {
                ResponseTemplate::new(200).set_body_json(state.order_json(&subject))
            }
            ("POST", ["cart"]) => {
                let Some(product_id) = product_id_of(request) else {
                    return ResponseTemplate::new(400);
                };
                let price = state.price(product_id);
                let id = state.next_id();
                let lines = state.carts.entry(subject).or_default();
                if lines.iter().any(|line| line.product_id == product_id) {
                    return ResponseTemplate::new(409);
                }
                lines.push(Line {
                    id,
                    product_id,
                    price,
                    quantity: 1,
                });
                ResponseTemplate::new(201)
            }
            ("PUT", ["cart", item_id]) => {
                let item_id: i64 = item_id.parse().unwrap_or_default();
                let quantity = request
                    .body_json::<Value>()
                    .ok()
                    .and_then(|body| body.get("quantity").and_then(Value::as_i64))
                    .unwrap_or_default();
                let lines = state.carts.entry(subject.clone()).or_default();
                let Some(line) = lines.iter_mut().find(|line| line.id == item_id) else {
                    return ResponseTemplate::new(404);
                };
                line.quantity = quantity;
                ResponseTemplate::new(200).set_body_json(state.order_json(&subject))
            }
            ("DELETE", ["cart", item_id]) => {
                let item_id: i64 = item_id.parse().unwrap_or_default();
                state
                    .carts
                    .entry(subject)
                    .or_default()
                    .retain(|line| line.id != item_id);
                ResponseTemplate::new(204)
            }
            ("DELETE", ["cart"]) => {
                state.carts.remove(&subject);
                ResponseTemplate::new(204)
            }
            ("GET", ["wishlist"]) => {
                ResponseTemplate::new(200).set_body_json(state.wishlist_json(&subject))
            }
            ("POST", ["wishlist"]) => {
                let Some(product_id) = product_id_of(request) else {
                    return ResponseTemplate::new(400);
                };
                let price = state.price(product_id);
                let id = state.next_id();
                state.wishlists.entry(subject).or_default().push(Entry {
                    id,
                    product_id,
                    price,
                });
                ResponseTemplate::new(201)
            }
            ("DELETE", ["wishlist", item_id]) => {
                let item_id: i64 = item_id.parse().unwrap_or_default();
                state
                    .wishlists
                    .entry(subject)
                    .or_default()
                    .retain(|entry| entry.id != item_id);
                ResponseTemplate::new(204)
            }
            _ => ResponseTemplate::new(404),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Test context
// ─────────────────────────────────────────────────────────────────────────────

/// A client wired to a mock server playing the provider and the backend.
pub struct TestContext {
    pub server: MockServer,
    pub state: AppState,
    pub identity: IdentityDouble,
    pub store: FakeStore,
}

impl TestContext {
    /// Start the mock server and build a client with no session.
    ///
    /// # Panics
    ///
    /// Panics if the client cannot be built.
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let identity = IdentityDouble::default();
        let store = FakeStore::default();

        Mock::given(method("POST"))
            .and(path(format!("{OIDC_PATH}/token")))
            .respond_with(TokenResponder(identity.clone()))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("{OIDC_PATH}/logout")))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/user/profile"))
            .respond_with(ProfileResponder(identity.clone()))
            .mount(&server)
            .await;
        Mock::given(path_regex(r"^/api/customer/(cart|wishlist)"))
            .respond_with(store.clone())
            .mount(&server)
            .await;

        let base = Url::parse(&server.uri()).expect("mock server URI");
        let mut config = ClientConfig::local(base.clone(), base);
        config.max_retries = 0;
        let state = AppState::new(config).expect("client state");

        Self {
            server,
            state,
            identity,
            store,
        }
    }

    /// Sign in as `subject` through the refresh grant and bring both
    /// mirrors in line with the new session.
    ///
    /// # Panics
    ///
    /// Panics if the session does not resolve.
    pub async fn sign_in(&self, subject: &str, role: Role) {
        self.identity.sign_in_as(subject, role);
        self.state
            .session()
            .restore(&format!("refresh-{subject}"))
            .await
            .expect("session restore");
        self.sync().await;
    }

    /// Apply the current session state to both mirrors.
    pub async fn sync(&self) {
        let current = self.state.session().state();
        self.state.cart().sync_with_session(&current).await;
        self.state.wishlist().sync_with_session(&current).await;
    }
}
