//! Credential Persistence
//!
//! Typed layer over the platform [`SecretStore`]: serializes credentials and
//! cached identities to JSON and owns the key scheme. Because OS keyrings
//! cannot enumerate their entries, the store maintains its own index of
//! known keys under a reserved entry; `list_accounts` and `clear_all` read
//! that index instead of asking the backend.

use bridge_traits::storage::{SecretStore, StorageCapability};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{AuthError, Result};
use crate::types::{AccountId, Credential, Identity};

const CREDENTIAL_PREFIX: &str = "credential:";
const IDENTITY_PREFIX: &str = "identity:";
const INDEX_KEY: &str = "credential-index";

pub struct CredentialStore {
    store: Arc<dyn SecretStore>,
}

impl CredentialStore {
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self { store }
    }

    /// Which class of backend the secrets land in. Hosts surface a warning
    /// to the user when this is [`StorageCapability::Plain`].
    pub fn capability(&self) -> StorageCapability {
        self.store.capability()
    }

    pub async fn put_credential(
        &self,
        account_id: &AccountId,
        credential: &Credential,
    ) -> Result<()> {
        let key = credential_key(account_id);
        self.put_object(&key, credential).await?;
        self.index_add(&key).await?;
        debug!(account_id = %account_id, "Credential persisted");
        Ok(())
    }

    /// Load the stored credential. A corrupted entry is deleted and treated
    /// as absent so one bad write cannot wedge the account forever.
    pub async fn get_credential(&self, account_id: &AccountId) -> Result<Option<Credential>> {
        self.get_object(&credential_key(account_id)).await
    }

    pub async fn delete_credential(&self, account_id: &AccountId) -> Result<()> {
        let key = credential_key(account_id);
        self.store
            .delete(&key)
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))?;
        self.index_remove(&key).await?;
        debug!(account_id = %account_id, "Credential removed");
        Ok(())
    }

    pub async fn put_identity(&self, account_id: &AccountId, identity: &Identity) -> Result<()> {
        let key = identity_key(account_id);
        self.put_object(&key, identity).await?;
        self.index_add(&key).await
    }

    pub async fn get_identity(&self, account_id: &AccountId) -> Result<Option<Identity>> {
        self.get_object(&identity_key(account_id)).await
    }

    pub async fn delete_identity(&self, account_id: &AccountId) -> Result<()> {
        let key = identity_key(account_id);
        self.store
            .delete(&key)
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))?;
        self.index_remove(&key).await
    }

    /// Accounts with a stored credential, recovered from the key index.
    pub async fn list_accounts(&self) -> Result<Vec<AccountId>> {
        let index = self.load_index().await?;
        Ok(index
            .iter()
            .filter_map(|key| key.strip_prefix(CREDENTIAL_PREFIX))
            .filter_map(|id| id.parse().ok().map(AccountId))
            .collect())
    }

    /// Remove every entry this store ever wrote, index included.
    pub async fn clear_all(&self) -> Result<()> {
        let index = self.load_index().await?;
        for key in &index {
            self.store
                .delete(key)
                .await
                .map_err(|e| AuthError::Storage(e.to_string()))?;
        }
        self.store
            .delete(INDEX_KEY)
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))?;
        debug!(entries = index.len(), "Cleared all stored secrets");
        Ok(())
    }

    async fn put_object<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_vec(value)
            .map_err(|e| AuthError::Storage(format!("Serialization failed: {}", e)))?;
        self.store
            .put(key, &json)
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))
    }

    async fn get_object<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let bytes = match self.store.get(key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return Ok(None),
            Err(e) => return Err(AuthError::Storage(e.to_string())),
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(key = key, error = %e, "Stored entry is corrupted, deleting");
                let _ = self.store.delete(key).await;
                self.index_remove(key).await?;
                Ok(None)
            }
        }
    }

    async fn load_index(&self) -> Result<BTreeSet<String>> {
        match self.store.get(INDEX_KEY).await {
            Ok(Some(bytes)) => serde_json::from_slice(&bytes).or_else(|e| {
                warn!(error = %e, "Key index corrupted, resetting");
                Ok(BTreeSet::new())
            }),
            Ok(None) => Ok(BTreeSet::new()),
            Err(e) => Err(AuthError::Storage(e.to_string())),
        }
    }

    async fn save_index(&self, index: &BTreeSet<String>) -> Result<()> {
        let json = serde_json::to_vec(index)
            .map_err(|e| AuthError::Storage(format!("Index serialization failed: {}", e)))?;
        self.store
            .put(INDEX_KEY, &json)
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))
    }

    async fn index_add(&self, key: &str) -> Result<()> {
        let mut index = self.load_index().await?;
        if index.insert(key.to_string()) {
            self.save_index(&index).await?;
        }
        Ok(())
    }

    async fn index_remove(&self, key: &str) -> Result<()> {
        let mut index = self.load_index().await?;
        if index.remove(key) {
            self.save_index(&index).await?;
        }
        Ok(())
    }
}

fn credential_key(account_id: &AccountId) -> String {
    format!("{}{}", CREDENTIAL_PREFIX, account_id)
}

fn identity_key(account_id: &AccountId) -> String {
    format!("{}{}", IDENTITY_PREFIX, account_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemorySecretStore;
    use chrono::{Duration, Utc};

    fn credential() -> Credential {
        Credential {
            access_token: "at".to_string(),
            refresh_token: Some("rt".to_string()),
            expires_at: Utc::now() + Duration::seconds(3600),
            token_type: "Bearer".to_string(),
        }
    }

    fn store() -> (Arc<MemorySecretStore>, CredentialStore) {
        let backend = Arc::new(MemorySecretStore::new());
        let store = CredentialStore::new(backend.clone());
        (backend, store)
    }

    #[tokio::test]
    async fn test_credential_roundtrip() {
        let (_, store) = store();
        let account = AccountId::new();

        store.put_credential(&account, &credential()).await.unwrap();
        let loaded = store.get_credential(&account).await.unwrap().unwrap();
        assert_eq!(loaded.access_token, "at");
        assert_eq!(loaded.refresh_token.as_deref(), Some("rt"));
        assert_eq!(loaded.token_type, "Bearer");
    }

    #[tokio::test]
    async fn test_missing_credential_is_none() {
        let (_, store) = store();
        assert!(store
            .get_credential(&AccountId::new())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_corrupted_entry_deleted_and_absent() {
        let (backend, store) = store();
        let account = AccountId::new();

        store.put_credential(&account, &credential()).await.unwrap();
        backend
            .put(&format!("credential:{}", account), b"not-json")
            .await
            .unwrap();

        assert!(store.get_credential(&account).await.unwrap().is_none());
        // The corrupted entry is gone from the backend too.
        assert!(backend
            .get(&format!("credential:{}", account))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_list_accounts_uses_index() {
        let (_, store) = store();
        let a = AccountId::new();
        let b = AccountId::new();

        store.put_credential(&a, &credential()).await.unwrap();
        store.put_credential(&b, &credential()).await.unwrap();

        let accounts = store.list_accounts().await.unwrap();
        assert_eq!(accounts.len(), 2);
        assert!(accounts.contains(&a));
        assert!(accounts.contains(&b));
    }

    #[tokio::test]
    async fn test_delete_removes_from_index() {
        let (_, store) = store();
        let account = AccountId::new();

        store.put_credential(&account, &credential()).await.unwrap();
        store.delete_credential(&account).await.unwrap();

        assert!(store.list_accounts().await.unwrap().is_empty());
        assert!(store.get_credential(&account).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clear_all_empties_backend() {
        let (backend, store) = store();
        let account = AccountId::new();

        store.put_credential(&account, &credential()).await.unwrap();
        store
            .put_identity(
                &account,
                &Identity {
                    id: "u".to_string(),
                    email: None,
                    display_name: None,
                },
            )
            .await
            .unwrap();

        store.clear_all().await.unwrap();
        assert!(backend.is_empty().await);
    }

    #[tokio::test]
    async fn test_identity_roundtrip() {
        let (_, store) = store();
        let account = AccountId::new();
        let identity = Identity {
            id: "user-1".to_string(),
            email: Some("m@club.example".to_string()),
            display_name: None,
        };

        store.put_identity(&account, &identity).await.unwrap();
        assert_eq!(store.get_identity(&account).await.unwrap(), Some(identity));
    }
}
