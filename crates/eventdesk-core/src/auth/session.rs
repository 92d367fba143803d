use std::sync::Mutex;

use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::watch;

use super::lock;
use crate::models::User;

/// Stream of "current user or none"; starts with the latest value.
pub type UserStream = BoxStream<'static, Option<User>>;

/// The session triple mirrored by the credential store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub user: Option<User>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl Session {
    pub fn is_empty(&self) -> bool {
        self.user.is_none() && self.access_token.is_none() && self.refresh_token.is_none()
    }

    /// A user is present exactly when an access token is
    pub fn is_consistent(&self) -> bool {
        self.user.is_some() == self.access_token.is_some()
    }
}

/// Read-only view of the session for collaborators.
pub trait SessionView: Send + Sync {
    fn current(&self) -> Option<User>;

    fn subscribe(&self) -> watch::Receiver<Option<User>>;

    fn is_authenticated(&self) -> bool {
        self.current().is_some()
    }

    /// Replays the latest value, then yields every change. Each call is an
    /// independent subscription.
    fn observe(&self) -> UserStream {
        user_stream(self.subscribe())
    }
}

fn user_stream(rx: watch::Receiver<Option<User>>) -> UserStream {
    stream::unfold((rx, true), |(mut rx, first)| async move {
        if !first && rx.changed().await.is_err() {
            // State dropped
            return None;
        }
        let user = rx.borrow_and_update().clone();
        Some((user, (rx, false)))
    })
    .boxed()
}

/// In-memory session. Writers go through `AuthClient`, which persists each
/// change before it lands here.
pub struct SessionState {
    session: Mutex<Session>,
    user_tx: watch::Sender<Option<User>>,
}

impl SessionState {
    pub fn new(initial: Session) -> Self {
        let (user_tx, _) = watch::channel(initial.user.clone());
        Self {
            session: Mutex::new(initial),
            user_tx,
        }
    }

    pub fn snapshot(&self) -> Session {
        lock(&self.session).clone()
    }

    pub fn access_token(&self) -> Option<String> {
        lock(&self.session).access_token.clone()
    }

    /// Replace the user record and notify subscribers
    pub(crate) fn set(&self, user: Option<User>) {
        let mut session = lock(&self.session);
        session.user = user.clone();
        self.user_tx.send_replace(user);
    }

    pub(crate) fn replace(&self, next: Session) {
        let mut session = lock(&self.session);
        let user = next.user.clone();
        *session = next;
        self.user_tx.send_replace(user);
    }

    pub(crate) fn set_access_token(&self, token: String) {
        lock(&self.session).access_token = Some(token);
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(Session::default())
    }
}

impl SessionView for SessionState {
    fn current(&self) -> Option<User> {
        self.user_tx.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<User>> {
        self.user_tx.subscribe()
    }
}
