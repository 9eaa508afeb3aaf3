//! Drive API Client
//!
//! Thin client over the injected [`HttpClient`] for the two calls the upload
//! pipeline needs: multipart file creation and the public-read permission
//! grant. Tokens are passed per call; this layer holds no credential state
//! and performs no retries of its own.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bridge_traits::error::BridgeError;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bytes::Bytes;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::error::{DriveError, Result};
use crate::types::{CreatedFile, FileMetadata, PermissionGrant};

const UPLOAD_ENDPOINT: &str = "https://www.googleapis.com/upload/drive/v3/files";
const FILES_ENDPOINT: &str = "https://www.googleapis.com/drive/v3/files";
const MULTIPART_BOUNDARY: &str = "club_core_upload_boundary";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct DriveClient {
    http: Arc<dyn HttpClient>,
    upload_endpoint: String,
    files_endpoint: String,
    timeout: Duration,
}

impl DriveClient {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self {
            http,
            upload_endpoint: UPLOAD_ENDPOINT.to_string(),
            files_endpoint: FILES_ENDPOINT.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the API endpoints, for tests and self-hosted proxies.
    pub fn with_endpoints(
        mut self,
        upload_endpoint: impl Into<String>,
        files_endpoint: impl Into<String>,
    ) -> Self {
        self.upload_endpoint = upload_endpoint.into();
        self.files_endpoint = files_endpoint.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Create a file with a multipart/related request: a JSON metadata part
    /// naming the file and its parent folder, then the content as a base64
    /// part.
    #[instrument(skip(self, access_token, data), fields(name = name, bytes = data.len()))]
    pub async fn create_file(
        &self,
        access_token: &str,
        name: &str,
        folder_id: &str,
        mime_type: &str,
        data: &[u8],
    ) -> Result<CreatedFile> {
        let metadata = FileMetadata {
            name,
            parents: vec![folder_id],
        };
        let metadata_json = serde_json::to_string(&metadata)
            .map_err(|e| DriveError::Protocol(format!("Metadata serialization failed: {}", e)))?;

        let body = format!(
            "--{boundary}\r\n\
             Content-Type: application/json; charset=UTF-8\r\n\r\n\
             {metadata}\r\n\
             --{boundary}\r\n\
             Content-Type: {mime}\r\n\
             Content-Transfer-Encoding: base64\r\n\r\n\
             {payload}\r\n\
             --{boundary}--",
            boundary = MULTIPART_BOUNDARY,
            metadata = metadata_json,
            mime = mime_type,
            payload = STANDARD.encode(data),
        );

        let url = format!(
            "{}?uploadType=multipart&fields=id,name,webViewLink,webContentLink",
            self.upload_endpoint
        );
        let request = HttpRequest::new(HttpMethod::Post, url)
            .bearer_token(access_token)
            .header(
                "Content-Type",
                format!("multipart/related; boundary={}", MULTIPART_BOUNDARY),
            )
            .body(Bytes::from(body))
            .timeout(self.timeout);

        let response = self
            .http
            .execute(request)
            .await
            .map_err(|e| map_transport_error("file create", e))?;

        if !response.is_success() {
            return Err(api_error(&response));
        }

        let created: CreatedFile = response
            .json()
            .map_err(|e| DriveError::Protocol(e.to_string()))?;
        debug!(file_id = %created.id, "Remote file created");
        Ok(created)
    }

    /// Grant public read access on a created file.
    #[instrument(skip(self, access_token))]
    pub async fn grant_public_read(&self, access_token: &str, file_id: &str) -> Result<()> {
        let url = format!("{}/{}/permissions", self.files_endpoint, file_id);
        let request = HttpRequest::new(HttpMethod::Post, url)
            .bearer_token(access_token)
            .json(&PermissionGrant::public_read())
            .map_err(|e| DriveError::Protocol(e.to_string()))?
            .timeout(self.timeout);

        let response = self
            .http
            .execute(request)
            .await
            .map_err(|e| map_transport_error("permission grant", e))?;

        if !response.is_success() {
            return Err(api_error(&response));
        }
        debug!(file_id = file_id, "Public read granted");
        Ok(())
    }
}

fn map_transport_error(operation: &str, e: BridgeError) -> DriveError {
    match e {
        BridgeError::Timeout(_) => DriveError::Timeout {
            operation: operation.to_string(),
        },
        other => DriveError::Network(other.to_string()),
    }
}

fn api_error(response: &HttpResponse) -> DriveError {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: ErrorDetail,
    }
    #[derive(Deserialize)]
    struct ErrorDetail {
        message: String,
    }

    let message = response
        .json::<ErrorBody>()
        .map(|b| b.error.message)
        .unwrap_or_else(|_| "unknown".to_string());

    DriveError::Api {
        status: response.status,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mockall::mock;
    use std::collections::HashMap;

    mock! {
        Http {}

        #[async_trait]
        impl HttpClient for Http {
            async fn execute(
                &self,
                request: HttpRequest,
            ) -> bridge_traits::error::Result<HttpResponse>;
        }
    }

    fn json_response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from(body.to_string()),
        }
    }

    #[tokio::test]
    async fn test_create_file_builds_multipart_body() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .withf(|request| {
                let body = String::from_utf8(request.body.clone().unwrap().to_vec()).unwrap();
                let content_type = request.headers.get("Content-Type").unwrap();

                request.method == HttpMethod::Post
                    && request.url.contains("uploadType=multipart")
                    && content_type.starts_with("multipart/related; boundary=")
                    && request.headers.get("Authorization").unwrap() == "Bearer at-1"
                    && body.contains(r#""name":"proof.jpg""#)
                    && body.contains(r#""parents":["folder-1"]"#)
                    && body.contains("Content-Transfer-Encoding: base64")
                    && body.contains(&STANDARD.encode(b"image-bytes"))
                    && body.ends_with(&format!("--{}--", MULTIPART_BOUNDARY))
            })
            .times(1)
            .returning(|_| {
                Ok(json_response(
                    200,
                    r#"{"id":"abc123","name":"proof.jpg","webViewLink":"https://v/abc123"}"#,
                ))
            });

        let client = DriveClient::new(Arc::new(http));
        let created = client
            .create_file("at-1", "proof.jpg", "folder-1", "image/jpeg", b"image-bytes")
            .await
            .unwrap();

        assert_eq!(created.id, "abc123");
        assert_eq!(created.web_view_link.as_deref(), Some("https://v/abc123"));
    }

    #[tokio::test]
    async fn test_create_file_server_error_is_retryable() {
        let mut http = MockHttp::new();
        http.expect_execute().times(1).returning(|_| {
            Ok(json_response(
                503,
                r#"{"error":{"message":"Backend Error"}}"#,
            ))
        });

        let client = DriveClient::new(Arc::new(http));
        let err = client
            .create_file("at-1", "n", "f", "image/png", b"x")
            .await
            .unwrap_err();

        assert!(err.is_retryable());
        assert!(matches!(err, DriveError::Api { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_create_file_401_is_auth_expired() {
        let mut http = MockHttp::new();
        http.expect_execute().times(1).returning(|_| {
            Ok(json_response(
                401,
                r#"{"error":{"message":"Invalid Credentials"}}"#,
            ))
        });

        let client = DriveClient::new(Arc::new(http));
        let err = client
            .create_file("stale", "n", "f", "image/png", b"x")
            .await
            .unwrap_err();

        assert!(err.is_auth_expired());
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_grant_public_read_posts_permission() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .withf(|request| {
                let body = String::from_utf8(request.body.clone().unwrap().to_vec()).unwrap();
                request.url.ends_with("/files/abc123/permissions")
                    && body.contains(r#""role":"reader""#)
                    && body.contains(r#""type":"anyone""#)
            })
            .times(1)
            .returning(|_| Ok(json_response(200, r#"{"id":"perm-1"}"#)));

        let client = DriveClient::new(Arc::new(http));
        client.grant_public_read("at-1", "abc123").await.unwrap();
    }

    #[tokio::test]
    async fn test_timeout_maps_to_timeout_error() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .times(1)
            .returning(|_| Err(BridgeError::Timeout(Duration::from_secs(30))));

        let client = DriveClient::new(Arc::new(http));
        let err = client
            .create_file("at-1", "n", "f", "image/png", b"x")
            .await
            .unwrap_err();

        assert!(matches!(err, DriveError::Timeout { .. }));
        assert!(err.is_retryable());
    }
}
