//! Core Configuration
//!
//! Explicit configuration handed in by the host at construction time. The
//! core never reads environment variables or files on its own; anything
//! missing here surfaces as a configuration error before any network call.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::RuntimeError;

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_worker_limit() -> usize {
    1
}

fn default_max_auto_retries() -> u32 {
    3
}

/// OAuth application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthSettings {
    pub client_id: String,
    /// Client secret, required by providers that do not accept public
    /// clients even with PKCE.
    #[serde(default)]
    pub client_secret: Option<String>,
    pub auth_endpoint: String,
    pub token_endpoint: String,
    /// Userinfo endpoint for profile lookups. Optional; identity queries
    /// fail with a configuration error when absent.
    #[serde(default)]
    pub userinfo_endpoint: Option<String>,
    /// Revocation endpoint. Optional; sign-out skips remote revocation
    /// when absent.
    #[serde(default)]
    pub revoke_endpoint: Option<String>,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
}

impl OAuthSettings {
    pub fn validate(&self) -> Result<(), RuntimeError> {
        let checks = [
            ("client_id", self.client_id.is_empty()),
            ("auth_endpoint", self.auth_endpoint.is_empty()),
            ("token_endpoint", self.token_endpoint.is_empty()),
            ("redirect_uri", self.redirect_uri.is_empty()),
            ("scopes", self.scopes.is_empty()),
        ];
        for (field, missing) in checks {
            if missing {
                return Err(RuntimeError::MissingConfig(field.to_string()));
            }
        }
        Ok(())
    }
}

/// Upload pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadSettings {
    /// Maximum accepted payload size in bytes.
    pub max_bytes: u64,
    /// MIME types the pipeline accepts. Empty means accept any.
    #[serde(default)]
    pub allowed_mime_types: Vec<String>,
    /// Remote folder the artifacts land in.
    pub folder_id: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_auto_retries")]
    pub max_auto_retries: u32,
    #[serde(default = "default_worker_limit")]
    pub worker_limit: usize,
}

impl UploadSettings {
    pub fn validate(&self) -> Result<(), RuntimeError> {
        if self.max_bytes == 0 {
            return Err(RuntimeError::MissingConfig("upload.max_bytes".to_string()));
        }
        if self.folder_id.is_empty() {
            return Err(RuntimeError::MissingConfig("upload.folder_id".to_string()));
        }
        if self.worker_limit == 0 {
            return Err(RuntimeError::MissingConfig(
                "upload.worker_limit".to_string(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Top-level core configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    pub oauth: OAuthSettings,
    pub upload: UploadSettings,
}

impl CoreConfig {
    /// Validate every section; called once at startup.
    pub fn validate(&self) -> Result<(), RuntimeError> {
        self.oauth.validate()?;
        self.upload.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> CoreConfig {
        CoreConfig {
            oauth: OAuthSettings {
                client_id: "client-id".to_string(),
                client_secret: None,
                auth_endpoint: "https://accounts.example.com/o/oauth2/auth".to_string(),
                token_endpoint: "https://oauth2.example.com/token".to_string(),
                userinfo_endpoint: Some("https://oauth2.example.com/userinfo".to_string()),
                revoke_endpoint: Some("https://oauth2.example.com/revoke".to_string()),
                redirect_uri: "http://127.0.0.1:8085/callback".to_string(),
                scopes: vec!["drive.file".to_string()],
            },
            upload: UploadSettings {
                max_bytes: 10 * 1024 * 1024,
                allowed_mime_types: vec!["image/jpeg".to_string()],
                folder_id: "folder-1".to_string(),
                request_timeout_secs: 30,
                max_auto_retries: 3,
                worker_limit: 1,
            },
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_missing_client_id_rejected() {
        let mut config = valid_config();
        config.oauth.client_id = String::new();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, RuntimeError::MissingConfig(f) if f == "client_id"));
    }

    #[test]
    fn test_zero_max_bytes_rejected() {
        let mut config = valid_config();
        config.upload.max_bytes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_defaults_applied_on_deserialize() {
        let json = r#"{
            "max_bytes": 1048576,
            "folder_id": "f"
        }"#;
        let settings: UploadSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.request_timeout_secs, 30);
        assert_eq!(settings.worker_limit, 1);
        assert_eq!(settings.max_auto_retries, 3);
        assert!(settings.allowed_mime_types.is_empty());
    }
}
