//! Catalog and FAQ commands.

use shopfront_client::AppState;
use shopfront_core::ProductId;

use super::CommandError;
use crate::output::print_json;

pub async fn products(
    state: &AppState,
    category: Option<&str>,
    search: Option<&str>,
) -> Result<(), CommandError> {
    let account = state.account();
    let products = match (category, search) {
        (Some(category), _) => account.products_by_category(category).await?,
        (None, Some(term)) => account.search_products(term).await?,
        (None, None) => account.products().await?,
    };
    print_json(&products)?;
    Ok(())
}

pub async fn product(state: &AppState, id: i64) -> Result<(), CommandError> {
    let detail = state.account().product_detail(ProductId::new(id)).await?;
    print_json(&detail)?;
    Ok(())
}

pub async fn faqs(state: &AppState) -> Result<(), CommandError> {
    print_json(&state.account().faqs().await?)?;
    Ok(())
}
