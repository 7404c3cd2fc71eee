//! Profile commands.

use std::path::PathBuf;

use clap::Subcommand;
use shopfront_client::AppState;
use shopfront_client::models::ProfileUpdate;
use shopfront_core::{Email, ImageRef};

use super::CommandError;
use crate::output::print_json;

#[derive(Subcommand)]
pub enum ProfileAction {
    /// Show the profile
    Show,
    /// Change name, email or picture
    Update {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<Email>,
        /// JPEG file to use as the profile picture
        #[arg(long)]
        image: Option<PathBuf>,
    },
}

pub async fn run(state: &AppState, action: ProfileAction) -> Result<(), CommandError> {
    let account = state.account();
    let profile = match action {
        ProfileAction::Show => account.profile().await?,
        ProfileAction::Update { name, email, image } => {
            let image = match image {
                Some(path) => Some(ImageRef::from_bytes(&tokio::fs::read(path).await?)),
                None => None,
            };
            account
                .update_profile(&ProfileUpdate { name, email, image })
                .await?
        }
    };
    print_json(&profile)?;
    Ok(())
}
