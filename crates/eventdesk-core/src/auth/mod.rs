//! Authentication module: session lifecycle and credential persistence.
//!
//! This module provides:
//! - `CredentialStore`: durable mirror of the session over a `KeyValueStore`
//!   (file, OS keychain, or memory)
//! - `SessionState`: in-memory, observable "current user or none"
//! - `AuthClient`: login, refresh and logout against the remote API
//! - `AuthEvent`/`EventBus`: structured events for every lifecycle transition

pub mod client;
pub mod credentials;
pub mod error;
pub mod events;
pub mod session;
pub mod storage;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use client::{AuthClient, LoginOutcome};
pub use credentials::CredentialStore;
pub use error::AuthError;
pub use events::{AuthEvent, EventBus, Navigator, NoopNavigator};
pub use session::{Session, SessionState, SessionView, UserStream};
pub use storage::{FileStore, KeyValueStore, KeyringStore, MemoryStore, StoreError};

/// Lock a mutex, recovering the data if a previous holder panicked.
/// None of the guarded sections leave their data half-updated.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
