//! Login form: field validation and user-facing failure messages.

use eventdesk_core::{ApiError, AuthError};

const MIN_USERNAME_LEN: usize = 3;
const MIN_PASSWORD_LEN: usize = 4;

/// Shown when the server gives no reason of its own
pub const GENERIC_LOGIN_FAILURE: &str = "Login failed. Please check your credentials.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginField {
    Username,
    Password,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: LoginField,
    pub message: String,
}

pub struct LoginForm {
    pub username: String,
    pub password: String,
}

impl LoginForm {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Every failing field, in form order
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        if let Some(message) = check_field("Username", self.username.trim(), MIN_USERNAME_LEN) {
            errors.push(FieldError {
                field: LoginField::Username,
                message,
            });
        }
        if let Some(message) = check_field("Password", &self.password, MIN_PASSWORD_LEN) {
            errors.push(FieldError {
                field: LoginField::Password,
                message,
            });
        }
        errors
    }
}

fn check_field(label: &str, value: &str, min_len: usize) -> Option<String> {
    let len = value.chars().count();
    if len == 0 {
        Some(format!("{} is required", label))
    } else if len < min_len {
        Some(format!("{} must be at least {} characters", label, min_len))
    } else {
        None
    }
}

/// Message to show next to the form after a failed login
pub fn failure_message(err: &AuthError) -> String {
    match err {
        AuthError::InvalidCredentials { message, .. } if !message.trim().is_empty() => message.clone(),
        AuthError::InvalidCredentials { .. } => GENERIC_LOGIN_FAILURE.to_string(),
        AuthError::Api(api) => match api.as_ref() {
            ApiError::NetworkError(e) if e.is_timeout() => "Connection timed out. Please try again.".to_string(),
            ApiError::NetworkError(_) => "Unable to connect to server. Check your connection.".to_string(),
            ApiError::ServerError { .. } => "Server error. Please try again later.".to_string(),
            _ => GENERIC_LOGIN_FAILURE.to_string(),
        },
        _ => GENERIC_LOGIN_FAILURE.to_string(),
    }
}
