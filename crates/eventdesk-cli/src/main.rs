//! eventdesk - command-line front end for the eventdesk API.
//!
//! Logs in, keeps the session between runs, and calls the user resource
//! with automatic access-token refresh.

mod login;

use std::io;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use eventdesk_core::api::UserApi;
use eventdesk_core::config::Config;
use eventdesk_core::{connect, ApiClient, Navigator, SessionView, User};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use login::LoginForm;

/// Username to log in with when none is given on the command line
const USERNAME_ENV: &str = "EVENTDESK_USERNAME";

/// Password to log in with instead of prompting
const PASSWORD_ENV: &str = "EVENTDESK_PASSWORD";

const USAGE: &str = "\
Usage: eventdesk <command>

Commands:
  login [username]              Log in and store the session
  logout                        End the session
  whoami                        Show the logged-in user
  refresh                       Exchange the refresh token for a new access token
  users                         List all users
  user <id>                     Show one user
  add-event <user-id> <event>   Sign a user up for an event
  delete-user <id>              Delete a user";

/// Sends the user back to `eventdesk login` when the session ends
struct CliNavigator;

impl Navigator for CliNavigator {
    fn to_login(&self) {
        eprintln!("You are logged out. Run `eventdesk login` to sign in.");
    }
}

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut config = Config::load()?;
    let client = connect(&config, Arc::new(CliNavigator))?;
    info!(api = %config.api_base_url(), "eventdesk starting");

    match args.first().map(String::as_str) {
        Some("login") => login(&client, &mut config, args.get(1).cloned()).await,
        Some("logout") => {
            client.auth().logout();
            Ok(())
        }
        Some("whoami") => {
            match client.auth().current() {
                Some(user) => print_user(&user)?,
                None => println!("Not logged in"),
            }
            Ok(())
        }
        Some("refresh") => {
            client.auth().refresh().await.context("Token refresh failed")?;
            println!("Access token refreshed");
            Ok(())
        }
        Some("users") => {
            let users = UserApi::new(client.clone()).list().await.context("Failed to list users")?;
            for user in &users {
                println!("{}\t{}\t{}", user.id, user.username, user.gmail);
            }
            Ok(())
        }
        Some("user") => {
            let id = required_arg(&args, 1, "user id")?;
            let user = UserApi::new(client.clone()).get(id).await.context("Failed to fetch user")?;
            print_user(&user)
        }
        Some("add-event") => {
            let user_id = required_arg(&args, 1, "user id")?;
            let event_id = required_arg(&args, 2, "event id")?;
            let user = UserApi::new(client.clone())
                .add_event(user_id, event_id)
                .await
                .context("Failed to add event")?;
            print_user(&user)
        }
        Some("delete-user") => {
            let id = required_arg(&args, 1, "user id")?;
            UserApi::new(client.clone()).delete(id).await.context("Failed to delete user")?;
            println!("Deleted user {}", id);
            Ok(())
        }
        _ => {
            eprintln!("{}", USAGE);
            Ok(())
        }
    }
}

async fn login(client: &ApiClient, config: &mut Config, username: Option<String>) -> Result<()> {
    let username = username
        .or_else(|| std::env::var(USERNAME_ENV).ok())
        .or_else(|| config.last_username.clone())
        .ok_or_else(|| anyhow!("Username required: eventdesk login <username>"))?;

    let password = match std::env::var(PASSWORD_ENV) {
        Ok(password) => password,
        Err(_) => rpassword::prompt_password("Password: ")?,
    };

    let form = LoginForm::new(username, password);
    let errors = form.validate();
    if !errors.is_empty() {
        for err in &errors {
            eprintln!("{}", err.message);
        }
        bail!("Login form is invalid");
    }

    match client.auth().login(form.username.trim(), &form.password).await {
        Ok(outcome) => {
            config.last_username = Some(outcome.user.username.clone());
            if let Err(e) = config.save() {
                warn!(error = %e, "Failed to save config");
            }
            println!("Logged in as {} ({})", outcome.user.username, outcome.user.id);
            Ok(())
        }
        Err(e) => {
            error!(error = %e, kind = e.kind(), "Login failed");
            bail!("{}", login::failure_message(&e))
        }
    }
}

fn required_arg<'a>(args: &'a [String], index: usize, name: &str) -> Result<&'a str> {
    args.get(index)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("Missing {}\n\n{}", name, USAGE))
}

fn print_user(user: &User) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(user)?);
    Ok(())
}
