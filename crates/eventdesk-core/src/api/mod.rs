//! REST API client module.
//!
//! Outgoing requests pass through two stages before reaching the transport:
//!
//! - `RequestAuthenticator` stamps the current access token on every request
//!   except the login request
//! - `RefreshCoordinator` turns a 401 into one shared token refresh and a
//!   single retry, forcing logout when the refresh token is rejected
//!
//! `ApiClient` wires both stages in front of a `Transport`; `UserApi` is the
//! user resource built on top of it.

pub mod authenticator;
pub mod client;
pub mod endpoints;
pub mod error;
pub mod refresh;
pub mod transport;
pub mod users;

pub use authenticator::RequestAuthenticator;
pub use client::ApiClient;
pub use endpoints::{Endpoints, DEFAULT_API_BASE_URL};
pub use error::ApiError;
pub use refresh::RefreshCoordinator;
pub use transport::{ApiRequest, ApiResponse, ReqwestTransport, Transport, DEFAULT_TIMEOUT_SECS};
pub use users::UserApi;
