//! Drive API error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriveError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {operation}")]
    Timeout { operation: String },

    /// Non-2xx API answer, classified by status.
    #[error("Drive API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Response body did not match the documented shape.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl DriveError {
    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            DriveError::Network(_) | DriveError::Timeout { .. } => true,
            DriveError::Api { status, .. } => *status == 429 || (500..600).contains(status),
            DriveError::Protocol(_) => false,
        }
    }

    /// Whether the access token was rejected and a refresh should be tried.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, DriveError::Api { status: 401, .. })
    }
}

pub type Result<T> = std::result::Result<T, DriveError>;
