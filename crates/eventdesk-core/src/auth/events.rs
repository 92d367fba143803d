//! Structured lifecycle events and the navigation signal.
//!
//! Every event is logged through `tracing` and broadcast to subscribers, so
//! front ends and tests can react to transitions without scraping log output.

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Buffered events per subscriber before the slowest one starts lagging
const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    LoggedIn { user_id: String },
    /// `forced` is set when a rejected refresh ended the session
    LoggedOut { forced: bool },
    TokenAttached { path: String },
    RefreshStarted,
    /// A request joined a refresh that was already in flight
    RefreshJoined,
    RefreshSucceeded,
    RefreshFailed { status: Option<u16> },
    RequestForbidden { path: String },
    CorruptSessionDiscarded,
}

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AuthEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: AuthEvent) {
        match &event {
            AuthEvent::LoggedIn { user_id } => info!(user_id = %user_id, "Login successful"),
            AuthEvent::LoggedOut { forced: true } => warn!("Could not refresh token, forcing logout"),
            AuthEvent::LoggedOut { forced: false } => info!("Logged out"),
            AuthEvent::TokenAttached { path } => debug!(path = %path, "Authorization header added"),
            AuthEvent::RefreshStarted => info!("Access token expired, attempting to refresh"),
            AuthEvent::RefreshJoined => debug!("Waiting on in-flight token refresh"),
            AuthEvent::RefreshSucceeded => info!("Access token refreshed"),
            AuthEvent::RefreshFailed { status } => warn!(?status, "Access token refresh failed"),
            AuthEvent::RequestForbidden { path } => warn!(path = %path, "Access forbidden (403)"),
            AuthEvent::CorruptSessionDiscarded => warn!("Discarded corrupt stored session"),
        }
        // No subscribers is fine
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Signal used when the user has to be sent back to the login surface.
pub trait Navigator: Send + Sync {
    fn to_login(&self);
}

/// Navigator for headless callers that poll `is_authenticated` instead
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn to_login(&self) {}
}
