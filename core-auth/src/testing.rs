//! Test Support
//!
//! In-memory secret backend used by this crate's tests and, behind the
//! `testing` feature, by downstream crates that need a working credential
//! layer without touching a real keyring.

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::storage::{SecretStore, StorageCapability};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

/// HashMap-backed [`SecretStore`].
pub struct MemorySecretStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
    capability: StorageCapability,
    fail_puts: AtomicBool,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capability: StorageCapability::Secure,
            fail_puts: AtomicBool::new(false),
        }
    }

    pub fn plain() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capability: StorageCapability::Plain,
            fail_puts: AtomicBool::new(false),
        }
    }

    /// Make every subsequent `put` fail, for exercising persist-failure paths.
    pub fn set_fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

impl Default for MemorySecretStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(BridgeError::OperationFailed("simulated write failure".to_string()));
        }
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.lock().await.keys().cloned().collect())
    }

    fn capability(&self) -> StorageCapability {
        self.capability
    }
}
