//! Session commands: login, registration, logout and guard checks.

use secrecy::ExposeSecret;
use serde::Serialize;
use shopfront_client::models::Identity;
use shopfront_client::{AppState, Route};
use tokio::io::{AsyncBufReadExt, BufReader};

use super::CommandError;
use crate::output::{print_json, print_line};

#[derive(Serialize)]
struct LoginOutput {
    identity: Identity,
    /// Page the storefront would open next.
    redirect: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
}

#[derive(Serialize)]
struct SessionOutput<'a> {
    authenticated: bool,
    loading: bool,
    identity: Option<&'a Identity>,
}

/// Print the provider URL, read the callback URL from stdin and complete
/// the login.
pub async fn login(
    state: &AppState,
    register: bool,
    show_refresh_token: bool,
) -> Result<(), CommandError> {
    let session = state.session();
    let url = if register {
        session.register()
    } else {
        session.login()
    };

    tracing::info!("Open the URL below, sign in, then paste the address you land on");
    print_line(&url)?;

    let mut callback = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut callback)
        .await?;

    let redirect = session.complete_login(callback.trim()).await?;
    let identity = session.require_identity()?;

    let refresh_token = if show_refresh_token {
        session
            .tokens()
            .refresh_token()
            .await
            .map(|token| token.expose_secret().to_string())
    } else {
        None
    };

    print_json(&LoginOutput {
        identity,
        redirect: redirect.map(|navigation| navigation.path()),
        refresh_token,
    })?;
    Ok(())
}

pub async fn logout(state: &AppState) -> Result<(), CommandError> {
    let url = state.logout().await;
    print_json(&serde_json::json!({ "logout_url": url }))?;
    Ok(())
}

pub fn whoami(state: &AppState) -> Result<(), CommandError> {
    let current = state.session().state();
    print_json(&SessionOutput {
        authenticated: current.is_authenticated(),
        loading: current.is_loading(),
        identity: current.identity(),
    })?;
    Ok(())
}

pub fn guard(state: &AppState, path: &str) -> Result<(), CommandError> {
    let route = Route::from_path(path)
        .ok_or_else(|| CommandError::InvalidInput(format!("unknown page {path}")))?;
    print_json(&state.guard(route))?;
    Ok(())
}
