//! User resource: CRUD plus event sign-up.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ApiClient, ApiError, ApiRequest, ApiResponse};
use crate::auth::AuthError;
use crate::models::User;

/// Update responses wrap the record; other endpoints return it bare.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum UserEnvelope {
    Wrapped { user: User },
    Bare(User),
}

impl UserEnvelope {
    fn into_user(self) -> User {
        match self {
            UserEnvelope::Wrapped { user } | UserEnvelope::Bare(user) => user,
        }
    }
}

#[derive(Debug, Serialize)]
struct AddEventRequest<'a> {
    #[serde(rename = "eventId")]
    event_id: &'a str,
}

#[derive(Clone)]
pub struct UserApi {
    client: ApiClient,
}

impl UserApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn list(&self) -> Result<Vec<User>, AuthError> {
        self.client.get(&self.client.auth().endpoints().users).await
    }

    pub async fn get(&self, user_id: &str) -> Result<User, AuthError> {
        let url = self.client.auth().endpoints().user(user_id);
        let response = self.client.send(ApiRequest::get(url)).await?;
        decode_user(&response)
    }

    pub async fn create(&self, user: &User) -> Result<User, AuthError> {
        let url = &self.client.auth().endpoints().users;
        let response = self.client.send(ApiRequest::post(url).json(user)?).await?;
        decode_user(&response)
    }

    /// Update a user. When it is the logged-in user, the stored record is
    /// replaced with the server's copy.
    pub async fn update(&self, user: &User) -> Result<User, AuthError> {
        if user.id.is_empty() {
            return Err(ApiError::InvalidRequest("Missing user _id for update".to_string()).into());
        }
        let url = self.client.auth().endpoints().user(&user.id);
        let response = self.client.send(ApiRequest::put(url).json(user)?).await?;
        let updated = decode_user(&response)?;
        self.sync_current(&updated)?;
        Ok(updated)
    }

    pub async fn delete(&self, user_id: &str) -> Result<(), AuthError> {
        debug!(user_id, "Deleting user");
        self.client.delete(&self.client.auth().endpoints().user(user_id)).await
    }

    pub async fn add_event(&self, user_id: &str, event_id: &str) -> Result<User, AuthError> {
        let url = self.client.auth().endpoints().user_events(user_id);
        let request = ApiRequest::put(url).json(&AddEventRequest { event_id })?;
        let response = self.client.send(request).await?;
        let updated = decode_user(&response)?;
        self.sync_current(&updated)?;
        Ok(updated)
    }

    fn sync_current(&self, user: &User) -> Result<(), AuthError> {
        if self.client.auth().replace_user(user.clone())? {
            debug!(user_id = %user.id, "Stored current user updated");
        }
        Ok(())
    }
}

fn decode_user(response: &ApiResponse) -> Result<User, AuthError> {
    Ok(response.json::<UserEnvelope>()?.into_user())
}
