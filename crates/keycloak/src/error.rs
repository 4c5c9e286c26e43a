//! Error types for the Keycloak adapter.

use thiserror::Error;

/// Result type for Keycloak operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to the Keycloak admin API.
#[derive(Error, Debug)]
pub enum Error {
    /// The token endpoint rejected the admin credentials.
    #[error("authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    /// No group with this name exists in the realm.
    #[error("group not found: {name}")]
    GroupNotFound { name: String },

    /// A group with this name already exists in the realm.
    #[error("group already exists: {name}")]
    GroupExists { name: String },

    /// The admin API answered with an unexpected status.
    #[error("Keycloak API returned {status}: {body}")]
    Api { status: u16, body: String },

    /// The API answered with a body we could not use.
    #[error("invalid response: {reason}")]
    InvalidResponse { reason: String },

    /// Configuration error.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    /// HTTP error from reqwest.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Create an authentication failed error.
    pub fn authentication_failed(reason: impl Into<String>) -> Self {
        Self::AuthenticationFailed {
            reason: reason.into(),
        }
    }

    /// Create a group not found error.
    pub fn group_not_found(name: impl Into<String>) -> Self {
        Self::GroupNotFound { name: name.into() }
    }

    /// Create a group exists error.
    pub fn group_exists(name: impl Into<String>) -> Self {
        Self::GroupExists { name: name.into() }
    }

    /// Create an API error from a status code and response body.
    pub fn api(status: u16, body: impl Into<String>) -> Self {
        Self::Api {
            status,
            body: body.into(),
        }
    }

    /// Create an invalid response error.
    pub fn invalid_response(reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            reason: reason.into(),
        }
    }

    /// Create a config error.
    pub fn config_error(reason: impl Into<String>) -> Self {
        Self::ConfigError {
            reason: reason.into(),
        }
    }

    /// Check if this error is retryable.
    ///
    /// Server errors and transport failures are; everything the server
    /// answered deliberately is not.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Api { status, .. } => *status >= 500,
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_errors_are_retryable() {
        assert!(Error::api(503, "unavailable").is_retryable());
        assert!(Error::api(500, "").is_retryable());
    }

    #[test]
    fn test_client_errors_are_not_retryable() {
        assert!(!Error::api(400, "bad request").is_retryable());
        assert!(!Error::api(403, "forbidden").is_retryable());
        assert!(!Error::group_exists("team-a-admins").is_retryable());
        assert!(!Error::group_not_found("team-a-admins").is_retryable());
        assert!(!Error::authentication_failed("invalid_grant").is_retryable());
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            Error::api(409, "conflict").to_string(),
            "Keycloak API returned 409: conflict"
        );
        assert_eq!(
            Error::group_not_found("team-a-viewers").to_string(),
            "group not found: team-a-viewers"
        );
    }
}
