//! Login, refresh and logout against the remote API.
//!
//! `AuthClient` is the only writer of session state. Every change is written
//! to the credential store first and published in memory second, under one
//! lock, so no reader ever sees a field that is not yet durable.

use std::sync::{Arc, Mutex};

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

use super::{
    lock, AuthError, AuthEvent, CredentialStore, EventBus, Navigator, Session, SessionState,
    SessionView,
};
use crate::api::{ApiError, ApiRequest, Endpoints, Transport};
use crate::models::User;

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(default)]
    message: Option<String>,
    #[serde(alias = "User")]
    user: User,
    token: String,
    #[serde(rename = "refreshToken")]
    refresh_token: String,
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    #[serde(rename = "refreshToken")]
    refresh_token: &'a str,
    #[serde(rename = "userId")]
    user_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    token: String,
}

/// What a successful login hands back to the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
    pub message: Option<String>,
}

/// Clone is cheap - all state lives behind one Arc.
#[derive(Clone)]
pub struct AuthClient {
    inner: Arc<Inner>,
}

struct Inner {
    transport: Arc<dyn Transport>,
    endpoints: Endpoints,
    store: CredentialStore,
    state: SessionState,
    events: EventBus,
    navigator: Arc<dyn Navigator>,
    write_lock: Mutex<()>,
}

impl AuthClient {
    /// Create a client, rehydrating the session from `store`
    pub fn new(
        transport: Arc<dyn Transport>,
        endpoints: Endpoints,
        store: CredentialStore,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let events = EventBus::new();
        let loaded = store.load_reporting();
        if loaded.discarded_corrupt {
            events.emit(AuthEvent::CorruptSessionDiscarded);
        }

        let initial = if loaded.session.is_consistent() && !loaded.discarded_corrupt {
            loaded.session
        } else {
            debug!("Stored session unusable, starting logged out");
            if let Err(e) = store.clear() {
                warn!(error = %e, "Failed to clear unusable stored session");
            }
            Session::default()
        };

        Self {
            inner: Arc::new(Inner {
                transport,
                endpoints,
                store,
                state: SessionState::new(initial),
                events,
                navigator,
                write_lock: Mutex::new(()),
            }),
        }
    }

    /// Authenticate and start a session.
    /// The login request is sent straight to the transport and never stamped.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome, AuthError> {
        let request = ApiRequest::post(&self.inner.endpoints.login)
            .json(&LoginRequest { username, password })?;
        let response = self.inner.transport.send(request).await?;

        if !response.is_success() {
            if response.status.is_client_error() {
                let status = response.status.as_u16();
                warn!(status, "Login rejected");
                return Err(AuthError::InvalidCredentials {
                    status,
                    message: ApiError::server_message(&response.body),
                });
            }
            return Err(ApiError::from_status(response.status, &response.body).into());
        }

        let parsed: LoginResponse = response.json()?;
        let session = Session {
            user: Some(parsed.user.clone()),
            access_token: Some(parsed.token.clone()),
            refresh_token: Some(parsed.refresh_token.clone()),
        };
        self.commit(session)?;
        self.inner.events.emit(AuthEvent::LoggedIn {
            user_id: parsed.user.id.clone(),
        });

        Ok(LoginOutcome {
            user: parsed.user,
            access_token: parsed.token,
            refresh_token: parsed.refresh_token,
            message: parsed.message,
        })
    }

    /// Exchange the refresh token for a new access token.
    ///
    /// Only the access token changes. Failures are returned as-is; ending the
    /// session on a rejected refresh is up to the caller.
    pub async fn refresh(&self) -> Result<String, AuthError> {
        let session = self.inner.state.snapshot();
        let (refresh_token, user) = match (session.refresh_token, session.user) {
            (Some(token), Some(user)) => (token, user),
            _ => return Err(AuthError::MissingCredentials),
        };

        self.inner.events.emit(AuthEvent::RefreshStarted);
        let request = ApiRequest::post(&self.inner.endpoints.refresh).json(&RefreshRequest {
            refresh_token: &refresh_token,
            user_id: &user.id,
        })?;

        let response = match self.inner.transport.send(request).await {
            Ok(response) => response,
            Err(e) => return Err(self.refresh_unavailable(e)),
        };

        if response.status == StatusCode::UNAUTHORIZED {
            self.inner.events.emit(AuthEvent::RefreshFailed { status: Some(401) });
            return Err(AuthError::RefreshFailed(ApiError::server_message(&response.body)));
        }

        let token = match response
            .error_for_status()
            .and_then(|r| r.json::<RefreshResponse>())
        {
            Ok(parsed) => parsed.token,
            Err(e) => return Err(self.refresh_unavailable(e)),
        };

        {
            let _guard = lock(&self.inner.write_lock);
            // A logout or a new login replaces the refresh token
            let current = self.inner.state.snapshot();
            let still_current = current.refresh_token.as_deref() == Some(refresh_token.as_str())
                && current.user.map(|u| u.id == user.id).unwrap_or(false);
            if !still_current {
                warn!("Session ended while refreshing, discarding new token");
                return Err(AuthError::MissingCredentials);
            }
            self.inner.store.save_access_token(&token)?;
            self.inner.state.set_access_token(token.clone());
        }

        self.inner.events.emit(AuthEvent::RefreshSucceeded);
        Ok(token)
    }

    /// End the session. Always succeeds; storage errors are only logged.
    pub fn logout(&self) {
        self.end_session(false);
    }

    /// Logout triggered by a rejected refresh
    pub(crate) fn force_logout(&self) {
        self.end_session(true);
    }

    /// Swap in a fresh copy of the current user's record.
    /// Returns `false` without writing anything when `user` is someone else.
    pub fn replace_user(&self, user: User) -> Result<bool, AuthError> {
        let _guard = lock(&self.inner.write_lock);
        match self.inner.state.current() {
            Some(ref current) if current.id == user.id => {}
            _ => return Ok(false),
        }
        self.inner.store.save_user(&user)?;
        self.inner.state.set(Some(user));
        Ok(true)
    }

    pub fn access_token(&self) -> Option<String> {
        self.inner.state.access_token()
    }

    pub fn session(&self) -> Session {
        self.inner.state.snapshot()
    }

    pub fn events(&self) -> broadcast::Receiver<AuthEvent> {
        self.inner.events.subscribe()
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.inner.endpoints
    }

    pub(crate) fn transport(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.inner.transport)
    }

    pub(crate) fn emit(&self, event: AuthEvent) {
        self.inner.events.emit(event);
    }

    fn commit(&self, session: Session) -> Result<(), AuthError> {
        let _guard = lock(&self.inner.write_lock);
        if let Err(e) = self.inner.store.save(&session) {
            // Put the previous session back so store and memory still agree
            let previous = self.inner.state.snapshot();
            if let Err(restore_err) = self.inner.store.save(&previous) {
                warn!(error = %restore_err, "Failed to restore stored session");
            }
            return Err(e.into());
        }
        self.inner.state.replace(session);
        Ok(())
    }

    fn end_session(&self, forced: bool) {
        {
            let _guard = lock(&self.inner.write_lock);
            if let Err(e) = self.inner.store.clear() {
                warn!(error = %e, "Failed to clear stored credentials");
            }
            self.inner.state.replace(Session::default());
        }
        self.inner.events.emit(AuthEvent::LoggedOut { forced });
        self.inner.navigator.to_login();
    }

    fn refresh_unavailable(&self, err: ApiError) -> AuthError {
        self.inner.events.emit(AuthEvent::RefreshFailed { status: err.status() });
        AuthError::RefreshUnavailable(Arc::new(err))
    }
}

impl SessionView for AuthClient {
    fn current(&self) -> Option<User> {
        self.inner.state.current()
    }

    fn subscribe(&self) -> watch::Receiver<Option<User>> {
        self.inner.state.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use serde_json::json;

    use super::*;
    use crate::auth::KeyValueStore;
    use crate::testing::{harness, json_response, logged_in_harness, sample_user, StubTransport};

    fn login_body() -> serde_json::Value {
        json!({
            "message": "Login successful",
            "user": {"_id": "u1", "username": "alice", "gmail": "alice@example.com", "eventos": []},
            "token": "A1",
            "refreshToken": "R1"
        })
    }

    #[tokio::test]
    async fn test_login_persists_and_publishes() {
        let transport = StubTransport::new(|_| async { json_response(200, login_body()) });
        let h = harness(transport.clone(), &[]);
        let mut events = h.auth.events();

        let outcome = h.auth.login("alice", "secret").await.expect("login succeeds");
        assert_eq!(outcome.access_token, "A1");
        assert_eq!(outcome.refresh_token, "R1");
        assert_eq!(outcome.message.as_deref(), Some("Login successful"));

        assert_eq!(h.auth.current().map(|u| u.id), Some("u1".to_string()));
        assert_eq!(h.backend.get("token").ok().flatten().as_deref(), Some("A1"));
        assert_eq!(h.backend.get("refreshToken").ok().flatten().as_deref(), Some("R1"));
        assert_eq!(
            events.recv().await.ok(),
            Some(AuthEvent::LoggedIn { user_id: "u1".to_string() })
        );

        let sent = transport.requests();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].bearer_token().is_none());
        assert_eq!(
            sent[0].body,
            Some(json!({"username": "alice", "password": "secret"}))
        );
    }

    #[tokio::test]
    async fn test_login_accepts_capitalised_user_key() {
        let transport = StubTransport::new(|_| async {
            json_response(
                200,
                json!({"User": {"_id": "u9", "username": "zed"}, "token": "A1", "refreshToken": "R1"}),
            )
        });
        let h = harness(transport, &[]);
        let outcome = h.auth.login("zed", "secret").await.expect("login succeeds");
        assert_eq!(outcome.user.id, "u9");
        assert_eq!(outcome.message, None);
    }

    #[tokio::test]
    async fn test_login_rejected_leaves_state_alone() {
        let transport =
            StubTransport::new(|_| async { json_response(401, json!({"message": "Invalid password"})) });
        let h = logged_in_harness(transport);

        let err = h.auth.login("alice", "wrong").await.expect_err("login fails");
        match err {
            AuthError::InvalidCredentials { status, ref message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "Invalid password");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(h.auth.current().map(|u| u.id), Some("u1".to_string()));
        assert_eq!(h.auth.access_token().as_deref(), Some("A1"));
    }

    #[tokio::test]
    async fn test_login_server_error_is_not_invalid_credentials() {
        let transport = StubTransport::new(|_| async { json_response(503, json!({})) });
        let h = harness(transport, &[]);
        let err = h.auth.login("alice", "secret").await.expect_err("login fails");
        assert_eq!(err.kind(), "api");
        assert!(!h.auth.is_authenticated());
    }

    #[tokio::test]
    async fn test_refresh_without_credentials_skips_network() {
        let transport = StubTransport::new(|_| async { json_response(200, json!({"token": "A2"})) });
        let h = harness(transport.clone(), &[]);

        let err = h.auth.refresh().await.expect_err("refresh fails");
        assert!(matches!(err, AuthError::MissingCredentials));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_updates_only_access_token() {
        let transport = StubTransport::new(|_| async { json_response(200, json!({"token": "A2"})) });
        let h = logged_in_harness(transport.clone());
        let before = h.auth.current();

        let token = h.auth.refresh().await.expect("refresh succeeds");
        assert_eq!(token, "A2");
        assert_eq!(h.backend.get("token").ok().flatten().as_deref(), Some("A2"));
        assert_eq!(h.backend.get("refreshToken").ok().flatten().as_deref(), Some("R1"));
        assert_eq!(h.auth.access_token().as_deref(), Some("A2"));
        assert_eq!(h.auth.current(), before);

        let sent = transport.requests();
        assert_eq!(sent[0].url, "http://stub.local/api/user/refresh");
        assert_eq!(sent[0].body, Some(json!({"refreshToken": "R1", "userId": "u1"})));
    }

    #[tokio::test]
    async fn test_refresh_rejection_does_not_clear_session() {
        let transport =
            StubTransport::new(|_| async { json_response(401, json!({"message": "Refresh token revoked"})) });
        let h = logged_in_harness(transport);

        let err = h.auth.refresh().await.expect_err("refresh fails");
        assert!(matches!(err, AuthError::RefreshFailed(ref m) if m == "Refresh token revoked"));
        assert!(h.auth.is_authenticated());
        assert_eq!(h.navigator.visits(), 0);
    }

    #[tokio::test]
    async fn test_refresh_other_failure_is_unavailable() {
        let transport = StubTransport::new(|_| async { json_response(503, json!({})) });
        let h = logged_in_harness(transport);
        let mut events = h.auth.events();

        let err = h.auth.refresh().await.expect_err("refresh fails");
        assert_eq!(err.kind(), "refresh_unavailable");
        assert_eq!(err.status(), Some(503));
        assert!(h.auth.is_authenticated());
        assert_eq!(events.recv().await.ok(), Some(AuthEvent::RefreshStarted));
        assert_eq!(
            events.recv().await.ok(),
            Some(AuthEvent::RefreshFailed { status: Some(503) })
        );
    }

    #[tokio::test]
    async fn test_refresh_response_without_token() {
        let transport = StubTransport::new(|_| async { json_response(200, json!({"message": "ok"})) });
        let h = logged_in_harness(transport);
        let err = h.auth.refresh().await.expect_err("refresh fails");
        assert_eq!(err.kind(), "refresh_unavailable");
        assert_eq!(h.auth.access_token().as_deref(), Some("A1"));
    }

    #[tokio::test]
    async fn test_refresh_token_discarded_after_logout() {
        let gate = Arc::new(tokio::sync::Notify::new());
        let transport = {
            let gate = gate.clone();
            StubTransport::new(move |_| {
                let gate = gate.clone();
                async move {
                    gate.notified().await;
                    json_response(200, json!({"token": "A2"}))
                }
            })
        };
        let h = logged_in_harness(transport);

        let auth = h.auth.clone();
        let refresh = tokio::spawn(async move { auth.refresh().await });
        tokio::task::yield_now().await;

        h.auth.logout();
        gate.notify_one();

        let result = refresh.await.expect("task completes");
        assert!(matches!(result, Err(AuthError::MissingCredentials)));
        assert_eq!(h.auth.access_token(), None);
        assert!(h.backend.is_empty());
    }

    #[tokio::test]
    async fn test_refresh_discarded_after_relogin_as_same_user() {
        let gate = Arc::new(tokio::sync::Notify::new());
        let transport = {
            let gate = gate.clone();
            StubTransport::new(move |request: ApiRequest| {
                let gate = gate.clone();
                async move {
                    if request.url.ends_with("/user/login") {
                        return json_response(
                            200,
                            json!({"user": {"_id": "u1", "username": "alice"}, "token": "A5", "refreshToken": "R5"}),
                        );
                    }
                    gate.notified().await;
                    json_response(200, json!({"token": "A2"}))
                }
            })
        };
        let h = logged_in_harness(transport);

        let auth = h.auth.clone();
        let refresh = tokio::spawn(async move { auth.refresh().await });
        tokio::task::yield_now().await;

        h.auth.logout();
        h.auth.login("alice", "secret").await.expect("login succeeds");
        gate.notify_one();

        let result = refresh.await.expect("task completes");
        assert!(matches!(result, Err(AuthError::MissingCredentials)));
        assert_eq!(h.auth.access_token().as_deref(), Some("A5"));
        assert_eq!(h.auth.session().refresh_token.as_deref(), Some("R5"));
        assert_eq!(h.backend.get("token").ok().flatten().as_deref(), Some("A5"));
    }

    #[tokio::test]
    async fn test_logout_clears_everything() {
        let transport = StubTransport::new(|_| async { json_response(200, json!({})) });
        let h = logged_in_harness(transport.clone());
        let mut stream = h.auth.observe();
        assert!(stream.next().await.flatten().is_some());

        h.auth.logout();
        assert_eq!(stream.next().await, Some(None));
        assert!(h.backend.is_empty());
        assert_eq!(h.auth.session(), Session::default());
        assert_eq!(h.navigator.visits(), 1);
        assert!(transport.requests().is_empty());

        // Idempotent
        h.auth.logout();
        assert_eq!(h.navigator.visits(), 2);
    }

    #[tokio::test]
    async fn test_rehydrates_consistent_session() {
        let transport = StubTransport::new(|_| async { json_response(200, json!({})) });
        let h = logged_in_harness(transport);
        assert!(h.auth.is_authenticated());
        assert_eq!(h.auth.access_token().as_deref(), Some("A1"));
    }

    #[tokio::test]
    async fn test_incomplete_stored_session_starts_empty() {
        let transport = StubTransport::new(|_| async { json_response(200, json!({})) });
        let h = harness(transport, &[("token", "A1"), ("refreshToken", "R1")]);
        assert!(!h.auth.is_authenticated());
        assert_eq!(h.auth.access_token(), None);
        assert!(h.backend.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_stored_user_starts_empty() {
        let transport = StubTransport::new(|_| async { json_response(200, json!({})) });
        let h = harness(
            transport,
            &[("currentUser", "{oops"), ("token", "A1"), ("refreshToken", "R1")],
        );
        assert!(!h.auth.is_authenticated());
        assert_eq!(h.auth.access_token(), None);
        assert!(h.backend.is_empty());
    }

    #[tokio::test]
    async fn test_replace_user_only_touches_current_user() {
        let transport = StubTransport::new(|_| async { json_response(200, json!({})) });
        let h = logged_in_harness(transport);

        let mut updated = sample_user("u1");
        updated.event_ids.push("e2".to_string());
        assert!(h.auth.replace_user(updated.clone()).expect("replace"));
        assert_eq!(h.auth.current(), Some(updated));

        assert!(!h.auth.replace_user(sample_user("u2")).expect("replace other"));
        assert_eq!(h.auth.current().map(|u| u.id), Some("u1".to_string()));
    }
}
