//! Cart commands.

use clap::Subcommand;
use serde::Serialize;
use shopfront_client::AppState;
use shopfront_client::cart::CartSnapshot;
use shopfront_client::models::{CartItem, OrderSummary};
use shopfront_core::{CartItemId, Money, ProductId};

use super::CommandError;
use crate::output::print_json;

#[derive(Subcommand)]
pub enum CartAction {
    /// Show the cart
    Show,
    /// Add one unit of a product
    Add { product_id: i64 },
    /// Set the quantity of a line (0 or less removes it)
    Set {
        item_id: i64,
        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Remove a line
    Remove { item_id: i64 },
    /// Remove every line
    Clear,
    /// Apply a coupon code
    Coupon { code: String },
}

#[derive(Serialize)]
struct CartView<'a> {
    items: &'a [CartItem],
    total_items: u32,
    total_price: Money,
    summary: &'a OrderSummary,
}

impl<'a> From<&'a CartSnapshot> for CartView<'a> {
    fn from(snapshot: &'a CartSnapshot) -> Self {
        Self {
            items: &snapshot.items,
            total_items: snapshot.total_items(),
            total_price: snapshot.total_price(),
            summary: &snapshot.summary,
        }
    }
}

pub async fn run(state: &AppState, action: CartAction) -> Result<(), CommandError> {
    let cart = state.cart();
    cart.refresh().await?;

    match action {
        CartAction::Show => {}
        CartAction::Add { product_id } => cart.add_to_cart(ProductId::new(product_id)).await?,
        CartAction::Set { item_id, quantity } => {
            cart.update_quantity(CartItemId::new(item_id), quantity)
                .await?;
        }
        CartAction::Remove { item_id } => cart.remove_from_cart(CartItemId::new(item_id)).await?,
        CartAction::Clear => cart.clear_cart().await?,
        CartAction::Coupon { code } => {
            cart.apply_coupon(&code).await?;
        }
    }

    let snapshot = cart.snapshot();
    print_json(&CartView::from(&snapshot))?;
    Ok(())
}
