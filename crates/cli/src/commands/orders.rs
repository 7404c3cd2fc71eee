//! Order commands.

use clap::Subcommand;
use shopfront_client::AppState;
use uuid::Uuid;

use super::CommandError;
use crate::output::print_json;

#[derive(Subcommand)]
pub enum OrdersAction {
    /// List placed, shipped and delivered orders
    List,
    /// Place the cart as an order
    Place {
        #[arg(long)]
        address: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Look up an order by tracking ID (no login needed)
    Track { tracking_id: Uuid },
}

pub async fn run(state: &AppState, action: OrdersAction) -> Result<(), CommandError> {
    match action {
        OrdersAction::List => print_json(&state.account().my_orders().await?)?,
        OrdersAction::Place {
            address,
            description,
        } => {
            let order = state.cart().place_order(&address, &description).await?;
            print_json(&order)?;
        }
        OrdersAction::Track { tracking_id } => {
            print_json(&state.account().track_order(tracking_id).await?)?;
        }
    }
    Ok(())
}
