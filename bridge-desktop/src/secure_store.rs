//! Secure Credential Storage using the OS Keychain

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::{SecretStore, StorageCapability},
};
use keyring::Entry;
use tracing::{debug, error};

/// Keyring-based secure storage implementation
///
/// Uses platform-specific secure storage:
/// - macOS: Keychain
/// - Windows: Credential Manager (DPAPI)
/// - Linux: Secret Service (libsecret)
pub struct KeyringSecretStore {
    service_name: String,
}

impl KeyringSecretStore {
    /// Create a new secure store with the default service name
    pub fn new() -> Self {
        Self {
            service_name: "club-core".to_string(),
        }
    }

    /// Create a new secure store with a custom service name
    pub fn with_service_name(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }

    fn entry(&self, key: &str) -> std::result::Result<Entry, keyring::Error> {
        Entry::new(&self.service_name, key)
    }

    fn map_keyring_error(e: keyring::Error) -> BridgeError {
        BridgeError::OperationFailed(format!("Keyring error: {}", e))
    }
}

impl Default for KeyringSecretStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SecretStore for KeyringSecretStore {
    async fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        // Keyring only supports strings, so binary data is base64 encoded
        let encoded = base64_codec::encode(value);

        let entry = self.entry(key).map_err(Self::map_keyring_error)?;
        entry
            .set_password(&encoded)
            .map_err(Self::map_keyring_error)?;

        debug!(key = key, "Stored secret in keyring");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let entry = self.entry(key).map_err(Self::map_keyring_error)?;

        match entry.get_password() {
            Ok(encoded) => {
                let decoded = base64_codec::decode(&encoded).map_err(|e| {
                    error!(key = key, error = %e, "Failed to decode secret");
                    BridgeError::OperationFailed(format!("Failed to decode secret: {}", e))
                })?;

                debug!(key = key, "Retrieved secret from keyring");
                Ok(Some(decoded))
            }
            Err(keyring::Error::NoEntry) => {
                debug!(key = key, "Secret not found in keyring");
                Ok(None)
            }
            Err(e) => Err(Self::map_keyring_error(e)),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let entry = self.entry(key).map_err(Self::map_keyring_error)?;

        match entry.delete_credential() {
            Ok(_) => {
                debug!(key = key, "Deleted secret from keyring");
                Ok(())
            }
            Err(keyring::Error::NoEntry) => {
                // Already deleted, consider it success
                debug!(key = key, "Secret not found (already deleted)");
                Ok(())
            }
            Err(e) => Err(Self::map_keyring_error(e)),
        }
    }

    async fn contains(&self, key: &str) -> Result<bool> {
        let entry = self.entry(key).map_err(Self::map_keyring_error)?;

        match entry.get_password() {
            Ok(_) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(e) => Err(Self::map_keyring_error(e)),
        }
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        // The OS keyring cannot enumerate its entries; the credential layer
        // keeps its own index of known keys.
        Ok(Vec::new())
    }

    fn capability(&self) -> StorageCapability {
        StorageCapability::Secure
    }
}

mod base64_codec {
    use base64::{engine::general_purpose::STANDARD, Engine as _};

    pub fn encode(data: &[u8]) -> String {
        STANDARD.encode(data)
    }

    pub fn decode(data: &str) -> std::result::Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secure_store_creation() {
        let store = KeyringSecretStore::new();
        assert_eq!(store.service_name, "club-core");
        assert_eq!(store.capability(), StorageCapability::Secure);
    }

    #[test]
    fn test_custom_service_name() {
        let store = KeyringSecretStore::with_service_name("test-service");
        assert_eq!(store.service_name, "test-service");
    }

    #[tokio::test]
    async fn test_set_and_get_secret() {
        // This test is skipped gracefully when no keyring is reachable
        // (headless systems, CI).
        let store = KeyringSecretStore::with_service_name("test-club-core");
        let key = "test-key-unique-123";
        let value = b"test-secret-value";

        let _ = store.delete(key).await;

        match store.put(key, value).await {
            Ok(_) => {
                match store.get(key).await {
                    Ok(Some(retrieved)) => {
                        assert_eq!(retrieved, value.to_vec());
                    }
                    other => {
                        println!("Keyring round-trip incomplete: {:?}", other.is_ok());
                    }
                }
                let _ = store.delete(key).await;
            }
            Err(e) => {
                println!("Keyring not available ({}), skipping test", e);
            }
        }
    }
}
