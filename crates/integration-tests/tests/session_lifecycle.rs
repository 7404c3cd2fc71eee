//! Integration tests for the session lifecycle and what it does to the
//! mirrors: login, profile failures, logout and switching users.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use shopfront_client::{ClientError, Navigation, Route, SessionState, SyncStatus};
use shopfront_core::{ProductId, Role};
use shopfront_integration_tests::{OIDC_PATH, TestContext};
use url::Url;

// =============================================================================
// Login
// =============================================================================

#[tokio::test]
async fn test_login_callback_lands_on_role_home() {
    let ctx = TestContext::start().await;
    ctx.identity.sign_in_as("kc-ann", Role::Customer);

    let authorize = Url::parse(&ctx.state.session().login()).unwrap();
    assert!(authorize.path().ends_with("/auth"));
    let state = authorize
        .query_pairs()
        .find(|(key, _)| key == "state")
        .map(|(_, value)| value.into_owned())
        .unwrap();

    let callback = format!("http://localhost:3000/login?state={state}&code=abc");
    let redirect = ctx.state.session().complete_login(&callback).await.unwrap();

    assert_eq!(redirect, Some(Navigation::replace(Route::CustomerHome)));
    let session = ctx.state.session().state();
    assert_eq!(session.identity().unwrap().subject, "kc-ann");
    assert_eq!(session.role(), Some(Role::Customer));
}

#[tokio::test]
async fn test_callback_with_foreign_state_is_rejected() {
    let ctx = TestContext::start().await;
    ctx.identity.sign_in_as("kc-ann", Role::Customer);
    let _ = ctx.state.session().login();

    let err = ctx
        .state
        .session()
        .complete_login("http://localhost:3000/login?state=forged&code=abc")
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Identity(_)));
    assert_eq!(ctx.state.session().state(), SessionState::Anonymous);
    let requests = ctx.server.received_requests().await.unwrap();
    assert!(
        !requests
            .iter()
            .any(|r| r.url.path() == format!("{OIDC_PATH}/token"))
    );
}

#[tokio::test]
async fn test_admin_login_callback_goes_to_admin_home() {
    let ctx = TestContext::start().await;
    ctx.identity.sign_in_as("kc-root", Role::Admin);

    let authorize = Url::parse(&ctx.state.session().login()).unwrap();
    let state = authorize
        .query_pairs()
        .find(|(key, _)| key == "state")
        .map(|(_, value)| value.into_owned())
        .unwrap();

    let callback = format!("http://localhost:3000/login?state={state}&code=xyz");
    let redirect = ctx.state.session().initialize(&callback).await;

    assert_eq!(redirect, Some(Navigation::replace(Route::AdminHome)));
    assert_eq!(ctx.state.session().state().role(), Some(Role::Admin));
}

// =============================================================================
// Profile failures
// =============================================================================

#[tokio::test]
async fn test_profile_unauthorized_ends_anonymous() {
    let ctx = TestContext::start().await;
    ctx.identity.sign_in_as("kc-ann", Role::Customer);
    ctx.identity.fail_profile(401);

    let result = ctx.state.session().restore("refresh-kc-ann").await;

    assert!(result.is_err());
    let session = ctx.state.session().state();
    assert_eq!(session, SessionState::Anonymous);
    assert!(session.identity().is_none());
    assert!(!ctx.state.session().tokens().is_authenticated().await);
}

#[tokio::test]
async fn test_profile_server_error_ends_anonymous() {
    let ctx = TestContext::start().await;
    ctx.identity.sign_in_as("kc-ann", Role::Customer);
    ctx.identity.fail_profile(500);

    assert!(ctx.state.session().restore("refresh-kc-ann").await.is_err());
    assert_eq!(ctx.state.session().state(), SessionState::Anonymous);
}

#[tokio::test]
async fn test_backend_rejecting_tokens_ends_session() {
    let ctx = TestContext::start().await;
    ctx.store.set_price(1, 10.00);
    ctx.sign_in("kc-ann", Role::Customer).await;
    ctx.state.cart().add_to_cart(ProductId::new(1)).await.unwrap();
    let _tasks = ctx.state.spawn_sync();
    let mut cart = ctx.state.cart().subscribe();

    ctx.store.reject_tokens();
    let err = ctx.state.cart().refresh().await.unwrap_err();

    assert!(matches!(err, ClientError::Api(ref e) if e.is_unauthorized()));
    assert_eq!(ctx.state.session().state(), SessionState::Anonymous);
    assert!(!ctx.state.session().tokens().is_authenticated().await);
    assert!(matches!(
        ctx.state.cart().add_to_cart(ProductId::new(2)).await,
        Err(ClientError::NotAuthenticated)
    ));
    assert_eq!(
        ctx.state.guard(Route::Cart).redirect,
        Some(Navigation::replace(Route::Login))
    );

    tokio::time::timeout(
        Duration::from_secs(5),
        cart.wait_for(|snapshot| snapshot.is_empty() && snapshot.status == SyncStatus::Idle),
    )
    .await
    .unwrap()
    .unwrap();
}

// =============================================================================
// Logout and user switching
// =============================================================================

#[tokio::test]
async fn test_logout_empties_cart_and_wishlist() {
    let ctx = TestContext::start().await;
    ctx.store.set_price(1, 10.00);
    ctx.store.set_price(2, 4.00);
    ctx.sign_in("kc-ann", Role::Customer).await;
    ctx.state.cart().add_to_cart(ProductId::new(1)).await.unwrap();
    ctx.state.cart().add_to_cart(ProductId::new(2)).await.unwrap();
    ctx.state.wishlist().add(ProductId::new(2)).await.unwrap();

    let logout_url = ctx.state.logout().await;

    assert!(logout_url.contains("/logout"));
    assert_eq!(ctx.state.session().state(), SessionState::Anonymous);
    assert!(ctx.state.cart().snapshot().is_empty());
    assert_eq!(ctx.state.cart().total_items(), 0);
    assert!(ctx.state.wishlist().snapshot().is_empty());
    assert_eq!(ctx.state.cart().snapshot().status, SyncStatus::Idle);
}

#[tokio::test]
async fn test_next_customer_never_sees_previous_cart() {
    let ctx = TestContext::start().await;
    ctx.store.set_price(1, 10.00);
    let _tasks = ctx.state.spawn_sync();

    ctx.sign_in("kc-ann", Role::Customer).await;
    ctx.state.cart().add_to_cart(ProductId::new(1)).await.unwrap();
    ctx.state.logout().await;

    let mut cart = ctx.state.cart().subscribe();
    ctx.identity.sign_in_as("kc-bob", Role::Customer);
    ctx.state.session().restore("refresh-kc-bob").await.unwrap();

    let snapshot = tokio::time::timeout(
        Duration::from_secs(5),
        cart.wait_for(|snapshot| snapshot.status.is_ready()),
    )
    .await
    .unwrap()
    .unwrap()
    .clone();

    assert!(snapshot.is_empty());
    assert!(!ctx.state.cart().snapshot().contains(ProductId::new(1)));
}

#[tokio::test]
async fn test_admin_session_has_empty_cart() {
    let ctx = TestContext::start().await;
    ctx.sign_in("kc-root", Role::Admin).await;

    assert!(ctx.state.cart().snapshot().is_empty());
    let err = ctx
        .state
        .cart()
        .add_to_cart(ProductId::new(1))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClientError::Forbidden {
            required: Role::Customer
        }
    ));
    assert!(ctx.store.requests().is_empty());
}
