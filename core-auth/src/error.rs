//! Authentication Error Taxonomy
//!
//! Every failure is classified where it occurs, from the typed response the
//! provider returned. Callers branch on variants, never on message text.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// Required configuration is missing or malformed. Raised before any
    /// network traffic.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The user declined consent at the provider.
    #[error("Authorization denied by user")]
    AuthorizationDenied,

    /// The echoed state parameter did not match the one we issued.
    #[error("State mismatch in authorization response")]
    StateMismatch,

    /// Transport-level failure: DNS, connection refused, TLS.
    #[error("Network error: {0}")]
    Network(String),

    /// An operation exceeded its deadline.
    #[error("Operation timed out: {operation}")]
    Timeout { operation: String },

    /// The provider answered with a non-success status.
    #[error("Provider error {status}: {code}")]
    Provider { status: u16, code: String },

    /// The access token was rejected mid-operation. Internal signal for the
    /// retry-once path; callers normally never see it.
    #[error("Access token expired")]
    TokenExpired,

    /// The refresh token is no longer accepted. Stored material has been
    /// purged; the user must sign in again interactively.
    #[error("Re-authorization required")]
    ReauthRequired,

    /// The secret backend failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Malformed response body from the provider.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl AuthError {
    /// Whether the operation may succeed if retried without user action.
    pub fn is_retryable(&self) -> bool {
        match self {
            AuthError::Network(_) | AuthError::Timeout { .. } => true,
            AuthError::Provider { status, .. } => *status == 429 || (500..600).contains(status),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(AuthError::Network("reset".to_string()).is_retryable());
        assert!(AuthError::Timeout {
            operation: "refresh".to_string()
        }
        .is_retryable());
        assert!(AuthError::Provider {
            status: 503,
            code: "backend_error".to_string()
        }
        .is_retryable());
        assert!(AuthError::Provider {
            status: 429,
            code: "rate_limit".to_string()
        }
        .is_retryable());

        assert!(!AuthError::Provider {
            status: 400,
            code: "invalid_request".to_string()
        }
        .is_retryable());
        assert!(!AuthError::ReauthRequired.is_retryable());
        assert!(!AuthError::AuthorizationDenied.is_retryable());
        assert!(!AuthError::Configuration("x".to_string()).is_retryable());
    }
}
