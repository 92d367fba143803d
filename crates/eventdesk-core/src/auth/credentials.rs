use std::sync::Arc;

use tracing::{debug, warn};

use super::{KeyValueStore, Session, StoreError};
use crate::models::User;

const USER_KEY: &str = "currentUser";
const ACCESS_TOKEN_KEY: &str = "token";
const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// Durable mirror of the session: user record, access token and refresh
/// token, each under its own key.
#[derive(Clone)]
pub struct CredentialStore {
    backend: Arc<dyn KeyValueStore>,
}

/// Result of reading the store, including whether a corrupt user record was
/// thrown away along the way.
pub(crate) struct Loaded {
    pub session: Session,
    pub discarded_corrupt: bool,
}

impl CredentialStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    /// Persist every field; absent fields are removed, never written empty
    pub fn save(&self, session: &Session) -> Result<(), StoreError> {
        match session.user {
            Some(ref user) => self.save_user(user)?,
            None => self.backend.remove(USER_KEY)?,
        }
        self.put(ACCESS_TOKEN_KEY, session.access_token.as_deref())?;
        self.put(REFRESH_TOKEN_KEY, session.refresh_token.as_deref())?;
        Ok(())
    }

    pub fn save_user(&self, user: &User) -> Result<(), StoreError> {
        let encoded = serde_json::to_string(user)?;
        self.backend.set(USER_KEY, &encoded)
    }

    pub fn save_access_token(&self, token: &str) -> Result<(), StoreError> {
        self.backend.set(ACCESS_TOKEN_KEY, token)
    }

    /// Never fails: unreadable entries count as absent, and an unparsable
    /// user record empties the whole session.
    pub fn load(&self) -> Session {
        self.load_reporting().session
    }

    pub(crate) fn load_reporting(&self) -> Loaded {
        let user = match self.read(USER_KEY) {
            None => None,
            Some(raw) => match serde_json::from_str::<User>(&raw) {
                Ok(user) => Some(user),
                Err(e) => {
                    warn!(error = %e, "Stored user record is corrupt, discarding it");
                    if let Err(e) = self.backend.remove(USER_KEY) {
                        warn!(error = %e, "Failed to remove corrupt user record");
                    }
                    return Loaded {
                        session: Session::default(),
                        discarded_corrupt: true,
                    };
                }
            },
        };

        let session = Session {
            user,
            access_token: self.read(ACCESS_TOKEN_KEY),
            refresh_token: self.read(REFRESH_TOKEN_KEY),
        };
        debug!(
            has_user = session.user.is_some(),
            has_token = session.access_token.is_some(),
            "Stored session loaded"
        );
        Loaded {
            session,
            discarded_corrupt: false,
        }
    }

    /// Remove all entries. Every key is attempted even if one fails.
    pub fn clear(&self) -> Result<(), StoreError> {
        [USER_KEY, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY]
            .map(|key| self.backend.remove(key))
            .into_iter()
            .collect()
    }

    fn put(&self, key: &str, value: Option<&str>) -> Result<(), StoreError> {
        match value {
            Some(value) => self.backend.set(key, value),
            None => self.backend.remove(key),
        }
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.backend.get(key) {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "Failed to read credential entry");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{FileStore, MemoryStore};
    use crate::testing::sample_user;

    fn full_session() -> Session {
        Session {
            user: Some(sample_user("u1")),
            access_token: Some("A1".to_string()),
            refresh_token: Some("R1".to_string()),
        }
    }

    #[test]
    fn test_save_load_round_trip() {
        let store = CredentialStore::new(Arc::new(MemoryStore::new()));
        store.save(&full_session()).expect("save");
        assert_eq!(store.load(), full_session());
    }

    #[test]
    fn test_round_trip_through_file_backend() {
        let dir = tempfile::tempdir().expect("temp dir");
        CredentialStore::new(Arc::new(FileStore::new(dir.path())))
            .save(&full_session())
            .expect("save");

        let reopened = CredentialStore::new(Arc::new(FileStore::new(dir.path())));
        assert_eq!(reopened.load(), full_session());
    }

    #[test]
    fn test_absent_fields_are_removed() {
        let backend = Arc::new(MemoryStore::new());
        let store = CredentialStore::new(backend.clone());
        store.save(&full_session()).expect("save");

        let partial = Session {
            refresh_token: None,
            ..full_session()
        };
        store.save(&partial).expect("save partial");

        assert_eq!(backend.get(REFRESH_TOKEN_KEY).ok().flatten(), None);
        assert_eq!(backend.len(), 2);
        assert_eq!(store.load(), partial);
    }

    #[test]
    fn test_clear_is_idempotent() {
        let backend = Arc::new(MemoryStore::new());
        let store = CredentialStore::new(backend.clone());
        store.save(&full_session()).expect("save");

        store.clear().expect("clear");
        assert!(backend.is_empty());
        assert!(store.load().is_empty());

        store.clear().expect("second clear");
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_corrupt_user_is_purged() {
        let backend = Arc::new(MemoryStore::new());
        backend.set(USER_KEY, "undefined").expect("seed corrupt user");
        backend.set(ACCESS_TOKEN_KEY, "A1").expect("seed token");

        let store = CredentialStore::new(backend.clone());
        let loaded = store.load_reporting();
        assert!(loaded.discarded_corrupt);
        assert!(loaded.session.is_empty());
        assert_eq!(backend.get(USER_KEY).ok().flatten(), None);

        let again = store.load_reporting();
        assert!(!again.discarded_corrupt);
        assert_eq!(again.session.user, None);
    }

    #[test]
    fn test_partial_updates() {
        let store = CredentialStore::new(Arc::new(MemoryStore::new()));
        store.save(&full_session()).expect("save");

        store.save_access_token("A2").expect("save token");
        let mut renamed = sample_user("u1");
        renamed.username = "alice2".to_string();
        store.save_user(&renamed).expect("save user");

        let loaded = store.load();
        assert_eq!(loaded.access_token.as_deref(), Some("A2"));
        assert_eq!(loaded.refresh_token.as_deref(), Some("R1"));
        assert_eq!(loaded.user.map(|u| u.username), Some("alice2".to_string()));
    }
}
