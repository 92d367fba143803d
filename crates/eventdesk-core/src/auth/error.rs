use std::sync::Arc;

use thiserror::Error;

use super::StoreError;
use crate::api::ApiError;

/// Failures of the authentication flow, as reported to callers.
///
/// `Clone` so that every caller waiting on a shared refresh receives the same
/// outcome; sources that are not `Clone` are held behind `Arc`.
#[derive(Error, Debug, Clone)]
pub enum AuthError {
    /// Login rejected by the remote endpoint
    #[error("Login rejected ({status}): {message}")]
    InvalidCredentials { status: u16, message: String },

    #[error("No refresh token or current user found")]
    MissingCredentials,

    /// A request still got 401 after its single retry
    #[error("Access token expired: {0}")]
    TokenExpired(String),

    /// The refresh endpoint rejected the refresh token; the session has been ended
    #[error("Session expired, please log in again: {0}")]
    RefreshFailed(String),

    /// Refresh failed for any reason other than 401; the session is kept
    #[error("Could not refresh access token: {0}")]
    RefreshUnavailable(#[source] Arc<ApiError>),

    #[error("Access forbidden: {0}")]
    Forbidden(String),

    #[error(transparent)]
    Api(Arc<ApiError>),

    #[error("Credential storage error: {0}")]
    Storage(#[source] Arc<StoreError>),
}

impl AuthError {
    /// Stable identifier for the failure kind
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials { .. } => "invalid_credentials",
            AuthError::MissingCredentials => "missing_credentials",
            AuthError::TokenExpired(_) => "token_expired",
            AuthError::RefreshFailed(_) => "refresh_failed",
            AuthError::RefreshUnavailable(_) => "refresh_unavailable",
            AuthError::Forbidden(_) => "forbidden",
            AuthError::Api(_) => "api",
            AuthError::Storage(_) => "storage",
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            AuthError::InvalidCredentials { status, .. } => Some(*status),
            AuthError::TokenExpired(_) | AuthError::RefreshFailed(_) => Some(401),
            AuthError::Forbidden(_) => Some(403),
            AuthError::RefreshUnavailable(e) | AuthError::Api(e) => e.status(),
            AuthError::MissingCredentials | AuthError::Storage(_) => None,
        }
    }

    /// Whether the caller has to log in again to continue
    pub fn requires_login(&self) -> bool {
        matches!(self, AuthError::RefreshFailed(_) | AuthError::MissingCredentials)
    }
}

impl From<ApiError> for AuthError {
    fn from(err: ApiError) -> Self {
        AuthError::Api(Arc::new(err))
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        AuthError::Storage(Arc::new(err))
    }
}
