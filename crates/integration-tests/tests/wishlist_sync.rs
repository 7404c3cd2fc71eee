//! Integration tests for the wishlist mirror.

#![allow(clippy::unwrap_used)]

use shopfront_core::{Money, ProductId, Role};
use shopfront_integration_tests::TestContext;

async fn customer_context() -> TestContext {
    let ctx = TestContext::start().await;
    ctx.store.set_price(4, 19.50);
    ctx.store.set_price(5, 3.25);
    ctx.sign_in("kc-ann", Role::Customer).await;
    ctx
}

fn wishlist_posts(ctx: &TestContext) -> usize {
    ctx.store
        .requests()
        .iter()
        .filter(|r| *r == "POST /api/customer/wishlist")
        .count()
}

#[tokio::test]
async fn test_adding_twice_keeps_one_entry() {
    let ctx = customer_context().await;

    let first = ctx.state.wishlist().add(ProductId::new(4)).await.unwrap();
    let second = ctx.state.wishlist().add(ProductId::new(4)).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.price, Money::from_minor(1950));
    assert_eq!(ctx.state.wishlist().snapshot().len(), 1);
    assert_eq!(wishlist_posts(&ctx), 1);
}

#[tokio::test]
async fn test_remove_entry() {
    let ctx = customer_context().await;
    let entry = ctx.state.wishlist().add(ProductId::new(4)).await.unwrap();
    ctx.state.wishlist().add(ProductId::new(5)).await.unwrap();

    ctx.state.wishlist().remove(entry.id).await.unwrap();

    assert!(!ctx.state.wishlist().contains(ProductId::new(4)));
    assert!(ctx.state.wishlist().contains(ProductId::new(5)));
}

#[tokio::test]
async fn test_move_to_cart() {
    let ctx = customer_context().await;
    let entry = ctx.state.wishlist().add(ProductId::new(5)).await.unwrap();

    ctx.state
        .wishlist()
        .move_to_cart(entry.id, ctx.state.cart())
        .await
        .unwrap();

    assert!(ctx.state.wishlist().snapshot().is_empty());
    assert!(ctx.state.cart().snapshot().contains(ProductId::new(5)));
    assert_eq!(ctx.state.cart().total_price(), Money::from_minor(325));
}

#[tokio::test]
async fn test_move_to_cart_when_already_in_cart() {
    let ctx = customer_context().await;
    ctx.state.cart().add_to_cart(ProductId::new(5)).await.unwrap();
    let entry = ctx.state.wishlist().add(ProductId::new(5)).await.unwrap();

    ctx.state
        .wishlist()
        .move_to_cart(entry.id, ctx.state.cart())
        .await
        .unwrap();

    assert!(ctx.state.wishlist().snapshot().is_empty());
    assert_eq!(ctx.state.cart().total_items(), 1);
}
