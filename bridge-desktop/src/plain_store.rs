//! Plain Durable Secret Storage
//!
//! File-backed fallback used when no OS keyring is reachable (headless
//! sessions, stripped-down desktops). Values are base64 encoded inside a
//! single JSON document in the application data directory. This backend
//! reports [`StorageCapability::Plain`] so callers can warn the user that
//! secrets are stored without hardware backing.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bridge_traits::{
    error::{BridgeError, Result},
    storage::{SecretStore, StorageCapability},
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// JSON-file-backed secret store.
pub struct FileSecretStore {
    path: PathBuf,
    // Serializes read-modify-write cycles on the backing file.
    lock: Mutex<()>,
}

impl FileSecretStore {
    /// Create a store backed by `secrets.json` in the app data directory.
    pub fn new() -> Result<Self> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| {
                BridgeError::NotAvailable("No data directory on this platform".to_string())
            })?
            .join("club-core");

        Ok(Self::at_path(data_dir.join("secrets.json")))
    }

    /// Create a store backed by an explicit file path.
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// The backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<HashMap<String, String>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                warn!(path = %self.path.display(), error = %e, "Secret file is corrupted");
                BridgeError::OperationFailed(format!("Corrupted secret file: {}", e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(BridgeError::Io(e)),
        }
    }

    async fn persist(&self, entries: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_vec_pretty(entries)
            .map_err(|e| BridgeError::OperationFailed(format!("Serialization failed: {}", e)))?;

        // Write-then-rename so a crash mid-write never leaves a torn file.
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl SecretStore for FileSecretStore {
    async fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;
        entries.insert(key.to_string(), STANDARD.encode(value));
        self.persist(&entries).await?;
        debug!(key = key, "Stored secret in plain store");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let _guard = self.lock.lock().await;
        let entries = self.load().await?;
        match entries.get(key) {
            Some(encoded) => {
                let decoded = STANDARD.decode(encoded).map_err(|e| {
                    BridgeError::OperationFailed(format!("Failed to decode secret: {}", e))
                })?;
                Ok(Some(decoded))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;
        if entries.remove(key).is_some() {
            self.persist(&entries).await?;
            debug!(key = key, "Deleted secret from plain store");
        }
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        let _guard = self.lock.lock().await;
        let entries = self.load().await?;
        Ok(entries.keys().cloned().collect())
    }

    fn capability(&self) -> StorageCapability {
        StorageCapability::Plain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, FileSecretStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSecretStore::at_path(dir.path().join("secrets.json"));
        (dir, store)
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let (_dir, store) = temp_store();

        store.put("token", b"secret-bytes").await.unwrap();
        let value = store.get("token").await.unwrap();
        assert_eq!(value, Some(b"secret-bytes".to_vec()));
    }

    #[tokio::test]
    async fn test_get_missing_key() {
        let (_dir, store) = temp_store();
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (_dir, store) = temp_store();

        store.put("token", b"v").await.unwrap();
        store.delete("token").await.unwrap();
        store.delete("token").await.unwrap();
        assert_eq!(store.get("token").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_list_keys() {
        let (_dir, store) = temp_store();

        store.put("a", b"1").await.unwrap();
        store.put("b", b"2").await.unwrap();

        let mut keys = store.list_keys().await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_overwrite_replaces_value() {
        let (_dir, store) = temp_store();

        store.put("k", b"old").await.unwrap();
        store.put("k", b"new").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(b"new".to_vec()));
    }

    #[test]
    fn test_capability_is_plain() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSecretStore::at_path(dir.path().join("secrets.json"));
        assert_eq!(store.capability(), StorageCapability::Plain);
    }
}
