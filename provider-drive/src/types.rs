//! Drive API wire types

use serde::{Deserialize, Serialize};

/// Metadata part of a multipart create request.
#[derive(Debug, Serialize)]
pub(crate) struct FileMetadata<'a> {
    pub name: &'a str,
    pub parents: Vec<&'a str>,
}

/// A successfully created remote file.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreatedFile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub web_view_link: Option<String>,
    #[serde(default)]
    pub web_content_link: Option<String>,
}

/// Public-read permission grant.
#[derive(Debug, Serialize)]
pub(crate) struct PermissionGrant {
    pub role: &'static str,
    #[serde(rename = "type")]
    pub grantee_type: &'static str,
}

impl PermissionGrant {
    pub fn public_read() -> Self {
        Self {
            role: "reader",
            grantee_type: "anyone",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_created_file_parses_camel_case() {
        let json = r#"{
            "id": "abc123",
            "name": "proof.jpg",
            "webViewLink": "https://drive.example.com/view/abc123",
            "webContentLink": "https://drive.example.com/dl/abc123"
        }"#;
        let file: CreatedFile = serde_json::from_str(json).unwrap();
        assert_eq!(file.id, "abc123");
        assert_eq!(
            file.web_view_link.as_deref(),
            Some("https://drive.example.com/view/abc123")
        );
    }

    #[test]
    fn test_permission_grant_shape() {
        let json = serde_json::to_value(PermissionGrant::public_read()).unwrap();
        assert_eq!(json["role"], "reader");
        assert_eq!(json["type"], "anyone");
    }
}
