//! Upload Error Classification
//!
//! Every stage failure is folded into [`UploadError`] and classified as
//! retryable or fatal at the point it occurs. Nothing escapes the pipeline
//! unclassified: callers receive a completed task or a fallback record
//! carrying a [`FailureKind`].

use core_auth::AuthError;
use provider_drive::DriveError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::task::{InvalidStateTransition, UploadState};

/// Coarse failure category carried on fallback records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Input rejected before any network call.
    Validation,
    Configuration,
    /// The user declined consent.
    AuthorizationDenied,
    /// The stored grant is dead; interactive sign-in required.
    ReauthRequired,
    Network,
    Timeout,
    /// Provider answered with an error status.
    Provider,
    Storage,
    Cancelled,
}

#[derive(Debug, Error)]
pub enum UploadError {
    /// Size or type check failed. No network traffic happened.
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The local source no longer resolves.
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Remote(#[from] DriveError),

    #[error("Upload cancelled")]
    Cancelled,

    #[error("Retry is only valid on a retryable failed task, found state {state}")]
    NotRetryable { state: UploadState },

    #[error(transparent)]
    InvalidTransition(#[from] InvalidStateTransition),
}

impl UploadError {
    pub fn kind(&self) -> FailureKind {
        match self {
            UploadError::Validation(_) | UploadError::SourceUnavailable(_) => {
                FailureKind::Validation
            }
            UploadError::Configuration(_) => FailureKind::Configuration,
            UploadError::Cancelled => FailureKind::Cancelled,
            UploadError::NotRetryable { .. } | UploadError::InvalidTransition(_) => {
                FailureKind::Configuration
            }
            UploadError::Auth(e) => match e {
                AuthError::AuthorizationDenied => FailureKind::AuthorizationDenied,
                AuthError::ReauthRequired => FailureKind::ReauthRequired,
                AuthError::Timeout { .. } => FailureKind::Timeout,
                AuthError::Network(_) => FailureKind::Network,
                AuthError::Provider { .. } => FailureKind::Provider,
                AuthError::Storage(_) => FailureKind::Storage,
                AuthError::Configuration(_) => FailureKind::Configuration,
                _ => FailureKind::Provider,
            },
            UploadError::Remote(e) => match e {
                DriveError::Timeout { .. } => FailureKind::Timeout,
                DriveError::Network(_) => FailureKind::Network,
                _ => FailureKind::Provider,
            },
        }
    }

    /// Retryable failures may re-enter `Transmitting`; fatal ones require
    /// the caller to restart the flow.
    pub fn is_retryable(&self) -> bool {
        match self {
            UploadError::Auth(e) => e.is_retryable(),
            UploadError::Remote(e) => e.is_retryable(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, UploadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_is_fatal() {
        let err = UploadError::Validation("too large".to_string());
        assert!(!err.is_retryable());
        assert_eq!(err.kind(), FailureKind::Validation);
    }

    #[test]
    fn test_timeout_is_retryable() {
        let err = UploadError::Remote(DriveError::Timeout {
            operation: "file create".to_string(),
        });
        assert!(err.is_retryable());
        assert_eq!(err.kind(), FailureKind::Timeout);
    }

    #[test]
    fn test_reauth_is_fatal() {
        let err = UploadError::Auth(AuthError::ReauthRequired);
        assert!(!err.is_retryable());
        assert_eq!(err.kind(), FailureKind::ReauthRequired);
    }

    #[test]
    fn test_server_error_is_retryable_provider() {
        let err = UploadError::Remote(DriveError::Api {
            status: 503,
            message: "backend".to_string(),
        });
        assert!(err.is_retryable());
        assert_eq!(err.kind(), FailureKind::Provider);
    }

    #[test]
    fn test_cancelled_is_fatal() {
        let err = UploadError::Cancelled;
        assert!(!err.is_retryable());
        assert_eq!(err.kind(), FailureKind::Cancelled);
    }
}
