//! Back-office commands.
//!
//! # Usage
//!
//! ```bash
//! shop admin create-product --name Desk --price 99.90 --category-id 1 --image desk.jpg
//! shop admin set-status 7 shipped
//! shop admin add-faq --question "Shipping?" --answer "3-5 days"
//! ```
//!
//! All of these require an admin login.

use std::path::PathBuf;

use clap::{Args, Subcommand};
use rust_decimal::Decimal;
use shopfront_client::AppState;
use shopfront_client::models::NewProduct;
use shopfront_core::{CategoryId, Money, OrderId, OrderStatus, ProductId};

use super::CommandError;
use crate::output::print_json;

#[derive(Subcommand)]
pub enum AdminAction {
    /// List every product
    Products,
    /// Create a product
    CreateProduct(ProductArgs),
    /// Replace a product's fields
    UpdateProduct {
        id: i64,
        #[command(flatten)]
        product: ProductArgs,
    },
    /// Delete a product
    DeleteProduct { id: i64 },
    /// List orders past the cart stage
    Orders,
    /// Move an order to `placed`, `shipped` or `delivered`
    SetStatus { id: i64, status: OrderStatus },
    /// Order and earnings statistics
    Analytics,
    /// List FAQs
    Faqs,
    /// Add a FAQ
    AddFaq {
        #[arg(long)]
        question: String,
        #[arg(long)]
        answer: String,
    },
    /// List categories
    Categories,
    /// Add a category
    AddCategory {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
    },
}

#[derive(Args)]
pub struct ProductArgs {
    #[arg(long)]
    name: String,
    #[arg(long, default_value = "")]
    description: String,
    #[arg(long)]
    price: Decimal,
    #[arg(long)]
    category_id: i64,
    /// JPEG file with the product image
    #[arg(long)]
    image: Option<PathBuf>,
}

impl ProductArgs {
    async fn into_new_product(self) -> Result<NewProduct, CommandError> {
        let image = match self.image {
            Some(path) => Some(tokio::fs::read(path).await?),
            None => None,
        };
        Ok(NewProduct {
            name: self.name,
            description: self.description,
            price: Money::new(self.price),
            category_id: CategoryId::new(self.category_id),
            image,
        })
    }
}

pub async fn run(state: &AppState, action: AdminAction) -> Result<(), CommandError> {
    let office = state.back_office();

    match action {
        AdminAction::Products => print_json(&office.products().await?)?,
        AdminAction::CreateProduct(args) => {
            let product = args.into_new_product().await?;
            print_json(&office.create_product(&product).await?)?;
        }
        AdminAction::UpdateProduct { id, product } => {
            let product = product.into_new_product().await?;
            print_json(&office.update_product(ProductId::new(id), &product).await?)?;
        }
        AdminAction::DeleteProduct { id } => {
            office.delete_product(ProductId::new(id)).await?;
            print_json(&serde_json::json!({ "deleted": id }))?;
        }
        AdminAction::Orders => print_json(&office.placed_orders().await?)?,
        AdminAction::SetStatus { id, status } => {
            print_json(&office.change_order_status(OrderId::new(id), status).await?)?;
        }
        AdminAction::Analytics => print_json(&office.analytics().await?)?,
        AdminAction::Faqs => print_json(&office.faqs().await?)?,
        AdminAction::AddFaq { question, answer } => {
            print_json(&office.create_faq(&question, &answer).await?)?;
        }
        AdminAction::Categories => print_json(&office.categories().await?)?,
        AdminAction::AddCategory { name, description } => {
            print_json(&office.create_category(&name, &description).await?)?;
        }
    }
    Ok(())
}
