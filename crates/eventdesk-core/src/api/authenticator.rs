use super::{ApiError, ApiRequest};
use crate::auth::{AuthClient, AuthEvent};

/// Attaches the current access token to outgoing requests.
/// Never looks at responses.
#[derive(Clone)]
pub struct RequestAuthenticator {
    auth: AuthClient,
}

impl RequestAuthenticator {
    pub fn new(auth: AuthClient) -> Self {
        Self { auth }
    }

    /// Login requests and requests made while logged out pass through
    /// untouched; everything else gets exactly one bearer header.
    pub fn stamp(&self, request: ApiRequest) -> Result<ApiRequest, ApiError> {
        if self.auth.endpoints().is_login(&request.url) {
            return Ok(request);
        }

        match self.auth.access_token() {
            Some(token) => {
                let stamped = request.with_bearer(&token)?;
                self.auth.emit(AuthEvent::TokenAttached {
                    path: stamped.path().to_string(),
                });
                Ok(stamped)
            }
            None => Ok(request),
        }
    }
}
