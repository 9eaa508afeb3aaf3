//! Secret Backend Selection
//!
//! Probes the OS keyring once at startup and hands back either the secure
//! backend or the plain file fallback. Callers hold the resulting
//! `Arc<dyn SecretStore>` for the life of the process; no call site ever
//! branches on the platform again.

use bridge_traits::error::Result;
use bridge_traits::storage::SecretStore;
use std::sync::Arc;
use tracing::{info, warn};

use crate::plain_store::FileSecretStore;
#[cfg(feature = "secure-store")]
use crate::secure_store::KeyringSecretStore;

const PROBE_KEY: &str = "capability-probe";

/// Select the best available secret backend.
///
/// Attempts a full write/read/delete round-trip against the OS keyring; if
/// any leg fails the plain file store is returned instead and a warning is
/// logged so the host can surface it to the user.
pub async fn select_secret_store(service_name: &str) -> Result<Arc<dyn SecretStore>> {
    #[cfg(feature = "secure-store")]
    {
        let keyring = KeyringSecretStore::with_service_name(service_name);
        if keyring_round_trip(&keyring).await {
            info!("Secure secret backend selected (OS keyring)");
            return Ok(Arc::new(keyring));
        }
        warn!("OS keyring unreachable, falling back to plain file storage");
    }

    #[cfg(not(feature = "secure-store"))]
    let _ = service_name;

    let plain = FileSecretStore::new()?;
    info!(path = %plain.path().display(), "Plain secret backend selected");
    Ok(Arc::new(plain))
}

#[cfg(feature = "secure-store")]
async fn keyring_round_trip(store: &KeyringSecretStore) -> bool {
    use bridge_traits::storage::SecretStore as _;

    let probe_value = b"probe";
    if store.put(PROBE_KEY, probe_value).await.is_err() {
        return false;
    }
    let read_ok = matches!(store.get(PROBE_KEY).await, Ok(Some(v)) if v == probe_value);
    // Best-effort cleanup; a leftover probe entry is harmless.
    let _ = store.delete(PROBE_KEY).await;
    read_ok
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_selection_always_yields_a_backend() {
        // Whichever backend wins, the probe must produce a usable store.
        let store = select_secret_store("test-club-core-probe").await.unwrap();
        let _ = store.capability();
    }
}
