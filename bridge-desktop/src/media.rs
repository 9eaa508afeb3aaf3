//! Filesystem Media Resolver
//!
//! Desktop implementation of [`MediaSource`]: a `source_ref` is an absolute
//! filesystem path produced by the host's file picker.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    media::{MediaInfo, MediaSource},
};
use bytes::Bytes;
use std::path::Path;
use tracing::debug;

/// Resolves source references as local filesystem paths.
pub struct FsMediaSource;

impl FsMediaSource {
    pub fn new() -> Self {
        Self
    }

    fn mime_from_extension(path: &Path) -> Option<String> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        let mime = match ext.as_str() {
            "jpg" | "jpeg" => "image/jpeg",
            "png" => "image/png",
            "gif" => "image/gif",
            "webp" => "image/webp",
            "heic" => "image/heic",
            "pdf" => "application/pdf",
            _ => return None,
        };
        Some(mime.to_string())
    }

    fn map_io_error(source_ref: &str, e: std::io::Error) -> BridgeError {
        match e.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                BridgeError::SourceUnavailable(source_ref.to_string())
            }
            _ => BridgeError::Io(e),
        }
    }
}

impl Default for FsMediaSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaSource for FsMediaSource {
    async fn probe(&self, source_ref: &str) -> Result<MediaInfo> {
        let path = Path::new(source_ref);
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| Self::map_io_error(source_ref, e))?;

        if metadata.is_dir() {
            return Err(BridgeError::SourceUnavailable(source_ref.to_string()));
        }

        debug!(source_ref = source_ref, size = metadata.len(), "Probed media source");

        Ok(MediaInfo {
            size: metadata.len(),
            mime_type: Self::mime_from_extension(path),
            file_name: path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.to_string()),
        })
    }

    async fn read(&self, source_ref: &str) -> Result<Bytes> {
        let data = tokio::fs::read(source_ref)
            .await
            .map_err(|e| Self::map_io_error(source_ref, e))?;
        Ok(Bytes::from(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_probe_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proof.jpg");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(b"fake-jpeg-bytes").unwrap();

        let source = FsMediaSource::new();
        let source_ref = path.to_str().unwrap();

        let info = source.probe(source_ref).await.unwrap();
        assert_eq!(info.size, 15);
        assert_eq!(info.mime_type.as_deref(), Some("image/jpeg"));
        assert_eq!(info.file_name.as_deref(), Some("proof.jpg"));

        let bytes = source.read(source_ref).await.unwrap();
        assert_eq!(&bytes[..], b"fake-jpeg-bytes");
    }

    #[tokio::test]
    async fn test_missing_file_is_source_unavailable() {
        let source = FsMediaSource::new();
        let err = source.probe("/nonexistent/path/img.png").await.unwrap_err();
        assert!(matches!(err, BridgeError::SourceUnavailable(_)));

        let err = source.read("/nonexistent/path/img.png").await.unwrap_err();
        assert!(matches!(err, BridgeError::SourceUnavailable(_)));
    }

    #[test]
    fn test_mime_detection() {
        assert_eq!(
            FsMediaSource::mime_from_extension(Path::new("a.PNG")).as_deref(),
            Some("image/png")
        );
        assert_eq!(FsMediaSource::mime_from_extension(Path::new("a.bin")), None);
        assert_eq!(FsMediaSource::mime_from_extension(Path::new("noext")), None);
    }
}
