//! Wishlist commands.

use clap::Subcommand;
use shopfront_client::AppState;
use shopfront_core::{ProductId, WishlistItemId};

use super::CommandError;
use crate::output::print_json;

#[derive(Subcommand)]
pub enum WishlistAction {
    /// Show the wishlist
    Show,
    /// Add a product (no-op if it is already there)
    Add { product_id: i64 },
    /// Remove an entry
    Remove { item_id: i64 },
    /// Move an entry's product to the cart
    MoveToCart { item_id: i64 },
}

pub async fn run(state: &AppState, action: WishlistAction) -> Result<(), CommandError> {
    let wishlist = state.wishlist();
    wishlist.load().await?;

    match action {
        WishlistAction::Show => {}
        WishlistAction::Add { product_id } => {
            wishlist.add(ProductId::new(product_id)).await?;
        }
        WishlistAction::Remove { item_id } => wishlist.remove(WishlistItemId::new(item_id)).await?,
        WishlistAction::MoveToCart { item_id } => {
            wishlist
                .move_to_cart(WishlistItemId::new(item_id), state.cart())
                .await?;
        }
    }

    print_json(&wishlist.items())?;
    Ok(())
}
