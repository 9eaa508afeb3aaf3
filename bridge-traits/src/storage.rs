//! Secret Storage Abstraction
//!
//! Durable key/value persistence for credentials and other secrets. Two
//! families of backend exist:
//!
//! - **Secure**: OS-provided stores (Keychain, Credential Manager, Secret
//!   Service), hardware-backed where the platform supports it.
//! - **Plain**: a durable file in the application data directory, used on
//!   platforms or sessions where no secure store is reachable.
//!
//! The backend is selected once at startup by a capability probe (see
//! `bridge-desktop`); callers query [`SecretStore::capability`] so they can
//! warn the user when secrets are persisted without hardware backing, but
//! they never branch on the backend at individual call sites.

use async_trait::async_trait;

use crate::error::Result;

/// Which class of backend a [`SecretStore`] is running on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageCapability {
    /// OS keychain / keystore, hardware-backed where available.
    Secure,
    /// Durable but unprotected storage (encrypted-at-rest not guaranteed).
    Plain,
}

impl StorageCapability {
    pub fn is_secure(&self) -> bool {
        matches!(self, StorageCapability::Secure)
    }
}

/// Durable secret persistence.
///
/// # Security Requirements
///
/// Implementations MUST:
/// - Never log or expose secret values
/// - Overwrite previous values atomically on `put`
/// - Treat `delete` of a missing key as success (idempotent)
///
/// A failed `put` means the secret is NOT persisted; implementations must not
/// leave a torn or partial value behind.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::SecretStore;
///
/// async fn store_token(store: &dyn SecretStore, token: &str) -> Result<()> {
///     store.put("access_token", token.as_bytes()).await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Store a secret value, replacing any previous value for `key`.
    async fn put(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Retrieve a secret value. Returns `Ok(None)` if the key doesn't exist.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Delete a secret. Succeeds if the key does not exist.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check if a secret exists without retrieving it.
    async fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }

    /// List all keys this backend can enumerate.
    ///
    /// OS keychains generally cannot enumerate their entries; such backends
    /// return an empty list and higher layers keep their own index.
    async fn list_keys(&self) -> Result<Vec<String>>;

    /// Which backend class is active.
    fn capability(&self) -> StorageCapability;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_query() {
        assert!(StorageCapability::Secure.is_secure());
        assert!(!StorageCapability::Plain.is_secure());
    }
}
