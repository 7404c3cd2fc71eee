//! Shopfront CLI - Drive the storefront client from a terminal.
//!
//! # Usage
//!
//! ```bash
//! # Sign in through the browser, then export the printed refresh token
//! shop login --show-refresh-token
//! export SHOPFRONT_REFRESH_TOKEN=...
//!
//! # Shop
//! shop products --search lamp
//! shop cart add 12
//! shop cart set 40 3
//! shop orders place --address "1 Main St"
//!
//! # Back office (admin accounts only)
//! shop admin orders
//! shop admin set-status 7 shipped
//! ```
//!
//! Output is JSON on stdout. Logs go to stderr; set `RUST_LOG` to adjust.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use shopfront_client::{AppState, ClientConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod output;

#[derive(Parser)]
#[command(name = "shop")]
#[command(author, version, about = "Shopfront storefront client")]
struct Cli {
    /// Refresh token of an earlier login
    #[arg(
        long,
        global = true,
        env = "SHOPFRONT_REFRESH_TOKEN",
        hide_env_values = true
    )]
    refresh_token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in through the identity provider
    Login {
        /// Print the refresh token so later runs can reuse the login
        #[arg(long)]
        show_refresh_token: bool,
    },
    /// Create an account through the identity provider
    Register {
        #[arg(long)]
        show_refresh_token: bool,
    },
    /// End the session and print the provider logout URL
    Logout,
    /// Show the current session
    Whoami,
    /// Show whether a page would render, and where it would redirect
    Guard {
        /// Page path, e.g. `/admin/orders`
        path: String,
    },
    /// List products
    Products {
        #[arg(long, conflicts_with = "search")]
        category: Option<String>,
        #[arg(long)]
        search: Option<String>,
    },
    /// Show one product with reviews and FAQs
    Product { id: i64 },
    /// Manage the cart
    Cart {
        #[command(subcommand)]
        action: commands::cart::CartAction,
    },
    /// Manage the wishlist
    Wishlist {
        #[command(subcommand)]
        action: commands::wishlist::WishlistAction,
    },
    /// List, place and track orders
    Orders {
        #[command(subcommand)]
        action: commands::orders::OrdersAction,
    },
    /// Show or update the profile
    Profile {
        #[command(subcommand)]
        action: commands::profile::ProfileAction,
    },
    /// Storefront FAQs
    Faq,
    /// Back-office operations
    Admin {
        #[command(subcommand)]
        action: commands::admin::AdminAction,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ClientConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR => sentry_tracing::EventFilter::Event,
        tracing::Level::WARN | tracing::Level::INFO | tracing::Level::DEBUG => {
            sentry_tracing::EventFilter::Breadcrumb
        }
        tracing::Level::TRACE => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = ClientConfig::from_env().expect("Failed to load configuration");

    // Sentry must be initialized before the tracing subscriber
    let _sentry_guard = init_sentry(&config);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "shopfront_client=info,shopfront_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let cli = Cli::parse();

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Command failed: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, config: ClientConfig) -> Result<(), commands::CommandError> {
    let redirect_uri = config.oidc.redirect_uri.clone();
    let state = AppState::new(config)?;

    match cli.refresh_token.as_deref() {
        Some(token) => {
            state.session().restore(token).await?;
        }
        None => {
            state.session().initialize(&redirect_uri).await;
        }
    }

    match cli.command {
        Commands::Login { show_refresh_token } => {
            commands::auth::login(&state, false, show_refresh_token).await
        }
        Commands::Register { show_refresh_token } => {
            commands::auth::login(&state, true, show_refresh_token).await
        }
        Commands::Logout => commands::auth::logout(&state).await,
        Commands::Whoami => commands::auth::whoami(&state),
        Commands::Guard { path } => commands::auth::guard(&state, &path),
        Commands::Products { category, search } => {
            commands::catalog::products(&state, category.as_deref(), search.as_deref()).await
        }
        Commands::Product { id } => commands::catalog::product(&state, id).await,
        Commands::Cart { action } => commands::cart::run(&state, action).await,
        Commands::Wishlist { action } => commands::wishlist::run(&state, action).await,
        Commands::Orders { action } => commands::orders::run(&state, action).await,
        Commands::Profile { action } => commands::profile::run(&state, action).await,
        Commands::Faq => commands::catalog::faqs(&state).await,
        Commands::Admin { action } => commands::admin::run(&state, action).await,
    }
}
