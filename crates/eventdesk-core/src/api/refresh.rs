//! Recovery from expired access tokens.
//!
//! A request that comes back 401 goes through these states:
//!
//! ```text
//! Dispatched -> Unauthorized -> Refreshing -> Retried -> Done
//! Dispatched -> Unauthorized -> Refreshing -> RefreshFailed (-> LoggedOut on 401)
//! Dispatched -> Done
//! ```
//!
//! At most one refresh call is on the wire at a time. The first request to
//! need one starts it and parks a shared handle in `in_flight`; any request
//! that fails with 401 meanwhile awaits that same handle and retries with its
//! token. The refresh clears the slot itself before its outcome is delivered,
//! so a later 401 always starts a fresh refresh.

use std::sync::{Arc, Mutex, Weak};

use futures::future::{BoxFuture, FutureExt, Shared};
use reqwest::StatusCode;
use tracing::{debug, warn};

use super::{ApiError, ApiRequest, ApiResponse, Transport};
use crate::auth::{lock, AuthClient, AuthError, AuthEvent};

type PendingRefresh = Shared<BoxFuture<'static, Result<String, AuthError>>>;

#[derive(Clone)]
pub struct RefreshCoordinator {
    auth: AuthClient,
    in_flight: Arc<Mutex<Option<PendingRefresh>>>,
}

impl RefreshCoordinator {
    pub fn new(auth: AuthClient) -> Self {
        Self {
            auth,
            in_flight: Arc::new(Mutex::new(None)),
        }
    }

    /// Send an already-stamped request, recovering once from a 401.
    ///
    /// The retry's outcome is final. A failed refresh is reported instead of
    /// the original 401.
    pub async fn dispatch(
        &self,
        transport: &dyn Transport,
        request: ApiRequest,
    ) -> Result<ApiResponse, AuthError> {
        let response = transport.send(request.clone()).await?;
        if response.status != StatusCode::UNAUTHORIZED {
            return self.settle(&request, response);
        }

        debug!(path = request.path(), "Request unauthorized, recovering access token");
        let token = match self.rotated_token(request.bearer_token()) {
            Some(token) => token,
            None => self.shared_refresh().await?,
        };

        let retried = request.with_bearer(&token)?;
        debug!(path = retried.path(), "Retrying request with refreshed token");
        let response = transport.send(retried).await?;
        self.settle(&request, response)
    }

    pub fn is_refreshing(&self) -> bool {
        lock(&self.in_flight).is_some()
    }

    /// The current token, if it is not the one the failed request carried.
    /// That means a refresh finished after the request was stamped.
    fn rotated_token(&self, failed: Option<&str>) -> Option<String> {
        let current = self.auth.access_token()?;
        if failed == Some(current.as_str()) {
            None
        } else {
            debug!("Access token already rotated, skipping refresh");
            Some(current)
        }
    }

    async fn shared_refresh(&self) -> Result<String, AuthError> {
        let pending = {
            let mut slot = lock(&self.in_flight);
            match slot.as_ref() {
                Some(pending) => {
                    self.auth.emit(AuthEvent::RefreshJoined);
                    pending.clone()
                }
                None => {
                    let pending = self.start_refresh();
                    *slot = Some(pending.clone());
                    pending
                }
            }
        };
        pending.await
    }

    fn start_refresh(&self) -> PendingRefresh {
        let auth = self.auth.clone();
        let in_flight: Weak<Mutex<Option<PendingRefresh>>> = Arc::downgrade(&self.in_flight);

        async move {
            let outcome = auth.refresh().await;
            if let Err(AuthError::RefreshFailed(ref reason)) = outcome {
                warn!(reason = %reason, "Refresh token rejected, ending session");
                auth.force_logout();
            }
            if let Some(slot) = in_flight.upgrade() {
                lock(&slot).take();
            }
            outcome
        }
        .boxed()
        .shared()
    }

    fn settle(&self, request: &ApiRequest, response: ApiResponse) -> Result<ApiResponse, AuthError> {
        let status = response.status;
        if !status.is_client_error() && !status.is_server_error() {
            return Ok(response);
        }

        match status {
            StatusCode::UNAUTHORIZED => Err(AuthError::TokenExpired(ApiError::server_message(&response.body))),
            StatusCode::FORBIDDEN => {
                self.auth.emit(AuthEvent::RequestForbidden {
                    path: request.path().to_string(),
                });
                Err(AuthError::Forbidden(ApiError::server_message(&response.body)))
            }
            _ => Err(ApiError::from_status(status, &response.body).into()),
        }
    }
}
