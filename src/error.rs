//! Error types shared by the HTTP wrapper and the auth service.
//!
//! ERROR HANDLING
//! ==============
//! `RequestError` stays close to the wire: a status with its JSON body, or a
//! transport failure where no response arrived. The auth service folds every
//! `RequestError` into an `AuthError`, the single shape forms display. Callers
//! branch on `is_api_error` / `is_network_error` instead of parsing messages.

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;

use serde_json::Value;

use crate::storage::StorageError;

pub const NETWORK_ERROR_MESSAGE: &str = "Network error. Please check your connection.";
pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid credentials";
pub const PERMISSION_DENIED_MESSAGE: &str = "You do not have permission to perform this action";
pub const NOT_FOUND_MESSAGE: &str = "The requested resource was not found";
pub const SERVER_ERROR_MESSAGE: &str = "Server error. Please try again later.";
pub const PROCESSING_FAILED_MESSAGE: &str = "Failed to process request";

// =============================================================================
// REQUEST ERROR
// =============================================================================

/// Failure of a single request through [`crate::net::client::ApiClient`].
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    /// The server answered with a non-success status.
    #[error("request failed with status {status}")]
    Status { status: u16, body: Value },

    /// No response was received (connect failure, timeout, reset).
    #[error("request transport failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// A success response carried a body that is not JSON.
    #[error("invalid response body: {0}")]
    Decode(String),

    /// A refreshed token could not be written back to storage.
    #[error("token storage failed: {0}")]
    Storage(#[from] StorageError),
}

impl RequestError {
    /// HTTP status of the failure, if a response was received.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }
}

// =============================================================================
// AUTH ERROR
// =============================================================================

/// Normalized error produced by every auth operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The API responded with a non-2xx status.
    #[error("{message}")]
    Api { status: u16, message: String },

    /// No response was received at all.
    #[error("{message}")]
    Network { message: String },

    /// Local failure: malformed response, missing token, storage failure.
    #[error("{message}")]
    Client { message: String },
}

impl AuthError {
    #[must_use]
    pub fn network() -> Self {
        Self::Network { message: NETWORK_ERROR_MESSAGE.to_owned() }
    }

    pub fn client(message: impl Into<String>) -> Self {
        Self::Client { message: message.into() }
    }

    /// Build an API error from a status and the response body, preferring the
    /// server's own `message`, then its `error` field, then a fixed message.
    #[must_use]
    pub fn from_response(status: u16, body: &Value) -> Self {
        let message = server_message(body).unwrap_or_else(|| fallback_message(status).to_owned());
        Self::Api { status, message }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Api { message, .. } | Self::Network { message } | Self::Client { message } => message,
        }
    }

    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_api_error(&self) -> bool {
        matches!(self, Self::Api { .. })
    }

    #[must_use]
    pub fn is_network_error(&self) -> bool {
        matches!(self, Self::Network { .. })
    }
}

impl From<RequestError> for AuthError {
    fn from(err: RequestError) -> Self {
        match err {
            RequestError::Status { status, body } => Self::from_response(status, &body),
            RequestError::Transport(e) if e.is_builder() => Self::client(e.to_string()),
            RequestError::Transport(_) => Self::network(),
            RequestError::Decode(msg) => Self::client(format!("unexpected response from server: {msg}")),
            RequestError::Storage(e) => Self::client(format!("failed to store credentials: {e}")),
        }
    }
}

impl From<StorageError> for AuthError {
    fn from(err: StorageError) -> Self {
        Self::client(format!("failed to store credentials: {err}"))
    }
}

fn server_message(body: &Value) -> Option<String> {
    ["message", "error"].iter().find_map(|key| {
        body.get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
    })
}

pub(crate) fn fallback_message(status: u16) -> &'static str {
    match status {
        401 => INVALID_CREDENTIALS_MESSAGE,
        403 => PERMISSION_DENIED_MESSAGE,
        404 => NOT_FOUND_MESSAGE,
        s if s >= 500 => SERVER_ERROR_MESSAGE,
        _ => PROCESSING_FAILED_MESSAGE,
    }
}
