//! Upload Task Model
//!
//! One task tracks one local file through the pipeline stages. Transitions
//! move strictly forward; the single backward edge is the retry from
//! [`UploadState::FailedRetryable`] into [`UploadState::Transmitting`], which
//! reuses the encoded payload cached on the task.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use core_auth::AccountId;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::error::FailureKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pipeline stage of an upload task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadState {
    Pending,
    Validating,
    Encoding,
    Transmitting,
    Publishing,
    Completed,
    /// Failed on a transient error; `retry` may re-enter `Transmitting`.
    FailedRetryable,
    /// Failed on an unrecoverable error; the flow must be restarted.
    FailedFatal,
}

impl UploadState {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadState::Pending => "pending",
            UploadState::Validating => "validating",
            UploadState::Encoding => "encoding",
            UploadState::Transmitting => "transmitting",
            UploadState::Publishing => "publishing",
            UploadState::Completed => "completed",
            UploadState::FailedRetryable => "failed_retryable",
            UploadState::FailedFatal => "failed_fatal",
        }
    }

    /// Terminal states accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, UploadState::Completed | UploadState::FailedFatal)
    }

    pub fn is_failed(&self) -> bool {
        matches!(
            self,
            UploadState::FailedRetryable | UploadState::FailedFatal
        )
    }

    /// Whether `self -> to` is a legal transition.
    pub fn can_transition(&self, to: UploadState) -> bool {
        use UploadState::*;
        match (*self, to) {
            (Pending, Validating) => true,
            (Validating, Encoding) => true,
            (Encoding, Transmitting) => true,
            (Transmitting, Publishing) => true,
            (Publishing, Completed) => true,
            // The retry edge.
            (FailedRetryable, Transmitting) => true,
            // Any active stage may fail either way.
            (Validating | Encoding | Transmitting | Publishing, FailedRetryable) => true,
            (Validating | Encoding | Transmitting | Publishing, FailedFatal) => true,
            // Cancellation before the first stage runs.
            (Pending, FailedFatal) => true,
            _ => false,
        }
    }
}

impl fmt::Display for UploadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq)]
#[error("Invalid upload state transition: {from} -> {to}")]
pub struct InvalidStateTransition {
    pub from: UploadState,
    pub to: UploadState,
}

/// Reference to the created remote object. Set if and only if the task
/// completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRef {
    pub id: String,
    pub view_url: Option<String>,
    pub download_url: Option<String>,
}

/// Transport-ready payload produced by the encoding stage and cached so a
/// retry never re-reads or re-encodes the source.
#[derive(Clone)]
pub struct EncodedPayload {
    pub bytes: Bytes,
    pub mime_type: String,
}

impl fmt::Debug for EncodedPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedPayload")
            .field("bytes", &self.bytes.len())
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct UploadTask {
    pub id: TaskId,
    /// Opaque local-file handle, resolved through the media source.
    pub source_ref: String,
    pub owner_id: AccountId,
    pub destination_name: String,
    pub state: UploadState,
    pub attempt_count: u32,
    pub last_error: Option<String>,
    pub remote_ref: Option<RemoteRef>,
    pub created_at: DateTime<Utc>,
    /// Cached encoding output. Present from `Encoding` onward.
    pub(crate) encoded: Option<EncodedPayload>,
    /// A remote object created before a publish failure. A retry skips
    /// creation and repeats only the permission grant.
    pub(crate) pending_remote: Option<RemoteRef>,
}

impl UploadTask {
    pub fn new(
        source_ref: impl Into<String>,
        destination_name: impl Into<String>,
        owner_id: AccountId,
    ) -> Self {
        Self {
            id: TaskId::new(),
            source_ref: source_ref.into(),
            owner_id,
            destination_name: destination_name.into(),
            state: UploadState::Pending,
            attempt_count: 0,
            last_error: None,
            remote_ref: None,
            created_at: Utc::now(),
            encoded: None,
            pending_remote: None,
        }
    }

    /// Move to `to`, rejecting transitions the state machine does not allow.
    pub(crate) fn transition(&mut self, to: UploadState) -> Result<(), InvalidStateTransition> {
        if !self.state.can_transition(to) {
            return Err(InvalidStateTransition {
                from: self.state,
                to,
            });
        }
        self.state = to;
        Ok(())
    }
}

/// Degraded outcome handed to the caller when a task fails: the source data
/// is still local and intact, and this record says whether `retry` can pick
/// the task back up.
#[derive(Debug, Clone)]
pub struct LocalFallbackRecord {
    pub task_id: TaskId,
    pub source_ref: String,
    pub kind: FailureKind,
    pub message: String,
    pub retryable: bool,
    /// A remote object that was created before the failure. It is not
    /// deleted automatically; the caller decides what to do with it.
    pub orphaned_remote_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions() {
        use UploadState::*;
        let forward = [Pending, Validating, Encoding, Transmitting, Publishing, Completed];
        for pair in forward.windows(2) {
            assert!(pair[0].can_transition(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_no_skipping_stages() {
        use UploadState::*;
        assert!(!Pending.can_transition(Transmitting));
        assert!(!Validating.can_transition(Publishing));
        assert!(!Encoding.can_transition(Completed));
    }

    #[test]
    fn test_retry_edge() {
        use UploadState::*;
        assert!(FailedRetryable.can_transition(Transmitting));
        assert!(!FailedRetryable.can_transition(Validating));
        assert!(!FailedRetryable.can_transition(Encoding));
        assert!(!FailedFatal.can_transition(Transmitting));
    }

    #[test]
    fn test_terminal_states() {
        use UploadState::*;
        assert!(Completed.is_terminal());
        assert!(FailedFatal.is_terminal());
        assert!(!FailedRetryable.is_terminal());
        assert!(!Transmitting.is_terminal());

        assert!(!Completed.can_transition(Transmitting));
        assert!(!FailedFatal.can_transition(FailedRetryable));
    }

    #[test]
    fn test_task_transition_validates() {
        let mut task = UploadTask::new("file:///a.jpg", "a.jpg", AccountId::new());
        task.transition(UploadState::Validating).unwrap();
        let err = task.transition(UploadState::Completed).unwrap_err();
        assert_eq!(
            err,
            InvalidStateTransition {
                from: UploadState::Validating,
                to: UploadState::Completed
            }
        );
        // The failed transition left the state untouched.
        assert_eq!(task.state, UploadState::Validating);
    }

    #[test]
    fn test_new_task_defaults() {
        let task = UploadTask::new("file:///a.jpg", "a.jpg", AccountId::new());
        assert_eq!(task.state, UploadState::Pending);
        assert_eq!(task.attempt_count, 0);
        assert!(task.remote_ref.is_none());
        assert!(task.encoded.is_none());
    }
}
