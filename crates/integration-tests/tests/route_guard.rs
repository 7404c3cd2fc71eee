//! Integration tests for route guards driven by a real session.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use shopfront_client::{GuardState, Navigation, Route, RouteGuard};
use shopfront_core::Role;
use shopfront_integration_tests::TestContext;

#[tokio::test]
async fn test_loading_renders_placeholder() {
    let ctx = TestContext::start().await;

    let decision = ctx.state.guard(Route::AdminOrders);

    assert_eq!(decision.state, GuardState::Loading);
    assert!(decision.redirect.is_none());
    assert!(!decision.renders_children());
}

#[tokio::test]
async fn test_anonymous_sent_to_login() {
    let ctx = TestContext::start().await;
    ctx.state.session().initialize("/cart").await;

    let decision = ctx.state.guard(Route::Cart);

    assert_eq!(decision.state, GuardState::Unauthenticated);
    assert_eq!(decision.redirect, Some(Navigation::replace(Route::Login)));
}

#[tokio::test]
async fn test_anonymous_may_browse_public_pages() {
    let ctx = TestContext::start().await;
    ctx.state.session().initialize("/").await;

    assert!(ctx.state.guard(Route::Home).renders_children());
    assert!(ctx.state.guard(Route::Login).renders_children());
}

#[tokio::test]
async fn test_customer_on_admin_page() {
    let ctx = TestContext::start().await;
    ctx.sign_in("kc-ann", Role::Customer).await;

    let decision = ctx.state.guard(Route::AdminOrders);

    assert_eq!(decision.state, GuardState::WrongRole);
    assert_eq!(
        decision.redirect,
        Some(Navigation::replace(Route::CustomerHome))
    );
}

#[tokio::test]
async fn test_admin_on_customer_page() {
    let ctx = TestContext::start().await;
    ctx.sign_in("kc-root", Role::Admin).await;

    assert_eq!(ctx.state.guard(Route::Cart).state, GuardState::WrongRole);
    assert!(ctx.state.guard(Route::AdminProducts).renders_children());
    assert!(ctx.state.guard(Route::Profile).renders_children());
}

#[tokio::test]
async fn test_resolve_waits_for_session() {
    let ctx = TestContext::start().await;
    ctx.identity.sign_in_as("kc-root", Role::Admin);
    let mut session = ctx.state.session().subscribe();

    let guard = RouteGuard::new(Route::AdminFaq);
    let waiting = tokio::spawn(async move { guard.resolve(&mut session).await });

    ctx.state.session().restore("refresh-kc-root").await.unwrap();
    let decision = tokio::time::timeout(Duration::from_secs(5), waiting)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(decision.state, GuardState::AuthorizedForRoute);
}
