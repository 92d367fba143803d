//! eventdesk core: session lifecycle for the eventdesk API.
//!
//! Login yields an access token and a refresh token. The access token is
//! attached to every request; an expired one is refreshed once, shared by
//! all requests that hit the expiry together, and the failed request is
//! replayed. A rejected refresh ends the session.
//!
//! ```no_run
//! # async fn demo() -> anyhow::Result<()> {
//! use std::sync::Arc;
//! use eventdesk_core::{auth::NoopNavigator, config::Config, connect, api::UserApi};
//!
//! let client = connect(&Config::load()?, Arc::new(NoopNavigator))?;
//! client.auth().login("alice", "secret").await?;
//! let users = UserApi::new(client).list().await?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use anyhow::{Context, Result};

pub use api::{ApiClient, ApiError, UserApi};
pub use auth::{AuthClient, AuthError, AuthEvent, Navigator, SessionView};
pub use models::User;

/// Build the full client stack described by `config`
pub fn connect(config: &config::Config, navigator: Arc<dyn Navigator>) -> Result<ApiClient> {
    let transport = api::ReqwestTransport::new(config.request_timeout())
        .context("Failed to build HTTP client")?;
    let backend = config
        .credential_backend()
        .context("Failed to open credential storage")?;
    let auth = AuthClient::new(
        Arc::new(transport),
        config.endpoints(),
        auth::CredentialStore::new(backend),
        navigator,
    );
    Ok(ApiClient::new(auth))
}
