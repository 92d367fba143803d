//! API client for the eventdesk REST API.
//!
//! Every request goes through the authentication pipeline: stamped with the
//! current access token, then dispatched by the refresh coordinator.

use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};

use super::{ApiRequest, ApiResponse, RefreshCoordinator, RequestAuthenticator, Transport};
use crate::auth::{AuthClient, AuthError};

/// Clone is cheap - the transport and auth state are shared.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    auth: AuthClient,
    authenticator: RequestAuthenticator,
    coordinator: RefreshCoordinator,
}

impl ApiClient {
    /// Install the pipeline in front of the auth client's transport
    pub fn new(auth: AuthClient) -> Self {
        Self {
            transport: auth.transport(),
            authenticator: RequestAuthenticator::new(auth.clone()),
            coordinator: RefreshCoordinator::new(auth.clone()),
            auth,
        }
    }

    pub fn auth(&self) -> &AuthClient {
        &self.auth
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    /// Send a request through the pipeline.
    /// Login requests bypass both stages and are never refreshed.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, AuthError> {
        if self.auth.endpoints().is_login(&request.url) {
            let response = self.transport.send(request).await?;
            return Ok(response.error_for_status()?);
        }

        let stamped = self.authenticator.stamp(request)?;
        self.coordinator.dispatch(self.transport.as_ref(), stamped).await
    }

    pub async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T, AuthError> {
        let response = self.send(ApiRequest::get(url)).await?;
        Ok(response.json()?)
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(&self, url: &str, body: &B) -> Result<T, AuthError> {
        let response = self.send(ApiRequest::post(url).json(body)?).await?;
        Ok(response.json()?)
    }

    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(&self, url: &str, body: &B) -> Result<T, AuthError> {
        let response = self.send(ApiRequest::put(url).json(body)?).await?;
        Ok(response.json()?)
    }

    pub async fn delete(&self, url: &str) -> Result<(), AuthError> {
        self.send(ApiRequest::delete(url)).await?;
        Ok(())
    }
}
