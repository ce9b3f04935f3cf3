//! Error types for directory client calls.

use thiserror::Error;

/// Result type alias using `ClientError`.
pub type ClientResult<T> = Result<T, ClientError>;

/// HTTP status code the directory service uses for absent objects.
pub const STATUS_NOT_FOUND: u16 = 404;

/// Errors returned by a [`DirectoryClient`](crate::DirectoryClient).
#[derive(Debug, Error)]
pub enum ClientError {
    /// The directory service answered with a non-success status.
    #[error("Graph API error ({status}): {code} - {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The identity does not have the shape this object type expects.
    #[error("invalid identity: {0}")]
    InvalidIdentity(#[from] azdir_types::Error),

    /// No access token has been configured.
    #[error("authentication error: {0}")]
    Auth(String),

    /// The response was well-formed but missing something we rely on.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Operation not offered by this object type.
    #[error("{operation} is not supported for {object_type}")]
    Unsupported {
        object_type: String,
        operation: &'static str,
    },

    /// The caller's deadline expired while the call was in flight.
    #[error("operation timed out")]
    Timeout,
}

impl ClientError {
    /// Builds an API error with the given status.
    pub fn api(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Builds the 404 error the directory returns for absent objects.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::api(STATUS_NOT_FOUND, "Request_ResourceNotFound", message)
    }

    /// HTTP status carried by this error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Returns true if the remote object does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(STATUS_NOT_FOUND)
    }
}
