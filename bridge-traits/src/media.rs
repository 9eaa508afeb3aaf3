//! Local Media Resolver
//!
//! The upload pipeline receives an opaque `source_ref` (a local file handle
//! chosen by the user) and resolves it through this trait. Keeping the
//! resolver behind a trait lets the pipeline validate and read attachments
//! without knowing anything about pickers, sandboxes, or content URIs.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Size and type information for a local media source.
#[derive(Debug, Clone)]
pub struct MediaInfo {
    /// Size in bytes.
    pub size: u64,
    /// MIME type, if the platform can determine one.
    pub mime_type: Option<String>,
    /// Display file name, if known.
    pub file_name: Option<String>,
}

/// Resolves opaque source references to bytes and metadata.
///
/// # Errors
///
/// Both operations fail with [`BridgeError::SourceUnavailable`] when the
/// reference no longer resolves (file moved, permission revoked), which the
/// pipeline classifies as a fatal validation failure.
///
/// [`BridgeError::SourceUnavailable`]: crate::error::BridgeError::SourceUnavailable
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Inspect a source without reading its content.
    async fn probe(&self, source_ref: &str) -> Result<MediaInfo>;

    /// Read the full content of a source.
    async fn read(&self, source_ref: &str) -> Result<Bytes>;
}
