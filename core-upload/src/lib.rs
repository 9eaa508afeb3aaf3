//! Resilient Media Upload
//!
//! The upload pipeline: validation and encoding of local media, credential
//! acquisition through the token guard, multipart transmission to the remote
//! store, and the public-read publishing step, with classified failures and
//! local-fallback records for everything that does not complete.

pub mod error;
pub mod pipeline;
pub mod task;

pub use error::{FailureKind, Result, UploadError};
pub use pipeline::{UploadPipeline, UploadReport};
pub use task::{
    InvalidStateTransition, LocalFallbackRecord, RemoteRef, TaskId, UploadState, UploadTask,
};
