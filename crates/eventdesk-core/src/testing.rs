//! Test doubles shared by the unit tests.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use reqwest::StatusCode;

use crate::api::{ApiError, ApiRequest, ApiResponse, Endpoints, Transport};
use crate::auth::{lock, AuthClient, CredentialStore, KeyValueStore, MemoryStore, Navigator};
use crate::models::User;

pub const BASE_URL: &str = "http://stub.local/api";

pub fn sample_user(id: &str) -> User {
    User {
        id: id.to_string(),
        username: "alice".to_string(),
        gmail: "alice@example.com".to_string(),
        birthday: chrono::NaiveDate::from_ymd_opt(1994, 3, 12),
        event_ids: vec!["e1".to_string()],
    }
}

pub fn json_response(status: u16, body: serde_json::Value) -> ApiResponse {
    let status = StatusCode::from_u16(status).expect("valid status code");
    ApiResponse::new(status, body.to_string())
}

type Handler = Box<dyn Fn(ApiRequest) -> BoxFuture<'static, ApiResponse> + Send + Sync>;

/// Transport answering from a closure and recording every request it sees.
pub struct StubTransport {
    handler: Handler,
    requests: Mutex<Vec<ApiRequest>>,
}

impl StubTransport {
    pub fn new<F, Fut>(handler: F) -> Arc<Self>
    where
        F: Fn(ApiRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ApiResponse> + Send + 'static,
    {
        Arc::new(Self {
            handler: Box::new(move |request| handler(request).boxed()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        lock(&self.requests).clone()
    }

    /// Number of requests whose URL ends with `suffix`
    pub fn count(&self, suffix: &str) -> usize {
        lock(&self.requests)
            .iter()
            .filter(|r| r.url.ends_with(suffix))
            .count()
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        lock(&self.requests).push(request.clone());
        Ok((self.handler)(request).await)
    }
}

#[derive(Default)]
pub struct RecordingNavigator {
    visits: AtomicUsize,
}

impl RecordingNavigator {
    pub fn visits(&self) -> usize {
        self.visits.load(Ordering::SeqCst)
    }
}

impl Navigator for RecordingNavigator {
    fn to_login(&self) {
        self.visits.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct Harness {
    pub auth: AuthClient,
    pub backend: Arc<MemoryStore>,
    pub navigator: Arc<RecordingNavigator>,
}

/// Auth client over `transport` whose store already holds `seed`
pub fn harness(transport: Arc<StubTransport>, seed: &[(&str, &str)]) -> Harness {
    let backend = Arc::new(MemoryStore::new());
    for (key, value) in seed {
        backend.set(key, value).expect("seed memory store");
    }
    let navigator = Arc::new(RecordingNavigator::default());
    let auth = AuthClient::new(
        transport,
        Endpoints::from_base(BASE_URL),
        CredentialStore::new(backend.clone()),
        navigator.clone(),
    );
    Harness {
        auth,
        backend,
        navigator,
    }
}

/// Store entries for a logged-in `u1` holding `A1`/`R1`
pub fn logged_in_seed() -> Vec<(&'static str, String)> {
    let user = serde_json::to_string(&sample_user("u1")).expect("encode user");
    vec![
        ("currentUser", user),
        ("token", "A1".to_string()),
        ("refreshToken", "R1".to_string()),
    ]
}

pub fn logged_in_harness(transport: Arc<StubTransport>) -> Harness {
    let seed = logged_in_seed();
    let pairs: Vec<(&str, &str)> = seed.iter().map(|(k, v)| (*k, v.as_str())).collect();
    harness(transport, &pairs)
}
