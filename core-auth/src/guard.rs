//! Token Guard
//!
//! Owns the single valid credential per account. Callers ask for a usable
//! access token and never see refresh mechanics: a fresh stored credential
//! is returned with no network traffic, a stale one is renewed through the
//! single-flight refresh lock, and an account with no usable grant is walked
//! through the interactive authorization flow.

use bridge_traits::auth::{AuthorizationHandoff, AuthorizationOutcome};
use bridge_traits::error::BridgeError;
use core_runtime::{AuthEvent, CoreEvent, EventBus};
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, instrument, warn};

use crate::credential_store::CredentialStore;
use crate::error::{AuthError, Result};
use crate::oauth::OAuthClient;
use crate::types::{AccountId, AuthState, Credential, Identity};

/// Renew this many seconds before actual expiry.
pub const DEFAULT_SKEW_BUFFER_SECS: i64 = 300;

type FlightMap = HashMap<AccountId, broadcast::Sender<Result<Credential>>>;

fn lock_flights(flights: &StdMutex<FlightMap>) -> std::sync::MutexGuard<'_, FlightMap> {
    flights.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One in-flight credential resolution. The creator resolves and settles;
/// everyone who finds the entry subscribes and receives that one outcome.
/// Dropping an unsettled flight removes the entry so subscribers contend
/// for a fresh one instead of waiting forever.
struct Flight<'a> {
    flights: &'a StdMutex<FlightMap>,
    account_id: AccountId,
    tx: Option<broadcast::Sender<Result<Credential>>>,
}

impl Flight<'_> {
    /// Remove the entry and broadcast the outcome under the same lock, so a
    /// caller either subscribed in time or starts a flight of its own.
    fn settle(mut self, outcome: &Result<Credential>) {
        let mut flights = lock_flights(self.flights);
        flights.remove(&self.account_id);
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(outcome.clone());
        }
    }
}

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        if self.tx.take().is_some() {
            lock_flights(self.flights).remove(&self.account_id);
        }
    }
}

pub struct TokenGuard {
    oauth: Arc<OAuthClient>,
    store: Arc<CredentialStore>,
    handoff: Arc<dyn AuthorizationHandoff>,
    events: EventBus,
    /// Per-account refresh locks. Entries are created on demand and removed
    /// once the last waiter settles.
    refresh_locks: Mutex<HashMap<AccountId, Arc<Mutex<()>>>>,
    /// In-flight resolutions for `get_valid_credential`. Concurrent callers
    /// for the same account receive the one resolver's outcome, errors
    /// included, instead of re-resolving after it.
    in_flight: StdMutex<FlightMap>,
    skew_buffer_secs: i64,
}

impl TokenGuard {
    pub fn new(
        oauth: Arc<OAuthClient>,
        store: Arc<CredentialStore>,
        handoff: Arc<dyn AuthorizationHandoff>,
        events: EventBus,
    ) -> Self {
        Self {
            oauth,
            store,
            handoff,
            events,
            refresh_locks: Mutex::new(HashMap::new()),
            in_flight: StdMutex::new(HashMap::new()),
            skew_buffer_secs: DEFAULT_SKEW_BUFFER_SECS,
        }
    }

    pub fn with_skew_buffer(mut self, skew_buffer_secs: i64) -> Self {
        self.skew_buffer_secs = skew_buffer_secs;
        self
    }

    /// Return a credential guaranteed usable for at least the skew buffer.
    ///
    /// Fresh stored credentials are returned with zero network calls.
    /// Concurrent callers for the same account share one resolution: the
    /// first caller performs it, and every caller waiting behind it receives
    /// that same outcome, success or failure. A waiter never triggers its
    /// own network call and never enters the interactive flow.
    #[instrument(skip(self), fields(account_id = %account_id))]
    pub async fn get_valid_credential(&self, account_id: &AccountId) -> Result<Credential> {
        let flight = loop {
            let mut rx = {
                let mut flights = lock_flights(&self.in_flight);
                match flights.get(account_id) {
                    Some(tx) => tx.subscribe(),
                    None => {
                        let (tx, _) = broadcast::channel(1);
                        flights.insert(*account_id, tx.clone());
                        break Flight {
                            flights: &self.in_flight,
                            account_id: *account_id,
                            tx: Some(tx),
                        };
                    }
                }
            };
            match rx.recv().await {
                Ok(shared) => return shared,
                // The resolving caller was dropped before settling; contend
                // for a fresh flight.
                Err(_) => continue,
            }
        };

        let lock = self.lock_for(account_id).await;
        let result = {
            let _guard = lock.lock().await;
            self.resolve_credential(account_id).await
        };
        self.release_lock(account_id, lock).await;
        flight.settle(&result);
        result
    }

    /// Run the interactive authorization flow for an account, replacing any
    /// stored material.
    #[instrument(skip(self), fields(account_id = %account_id))]
    pub async fn sign_in(&self, account_id: &AccountId) -> Result<Credential> {
        let lock = self.lock_for(account_id).await;
        let result = {
            let _guard = lock.lock().await;
            self.interactive_sign_in(account_id).await
        };
        self.release_lock(account_id, lock).await;
        result
    }

    /// Fetch the account's provider profile, refreshing the access token
    /// once if the provider rejects it mid-call.
    pub async fn identity(&self, account_id: &AccountId) -> Result<Identity> {
        if let Some(cached) = self.store.get_identity(account_id).await? {
            return Ok(cached);
        }

        let credential = self.get_valid_credential(account_id).await?;
        let identity = match self.oauth.fetch_identity(&credential.access_token).await {
            Ok(identity) => identity,
            Err(AuthError::TokenExpired) => {
                debug!("Access token rejected, refreshing and retrying once");
                let renewed = self.force_refresh(account_id).await?;
                self.oauth.fetch_identity(&renewed.access_token).await?
            }
            Err(e) => return Err(e),
        };

        if let Err(e) = self.store.put_identity(account_id, &identity).await {
            warn!(error = %e, "Failed to cache identity");
        }
        Ok(identity)
    }

    /// Coarse state for the host's account UI.
    pub async fn auth_state(&self, account_id: &AccountId) -> Result<AuthState> {
        match self.store.get_credential(account_id).await? {
            None => Ok(AuthState::SignedOut),
            Some(c) if c.refresh_token.is_none() && c.is_expired() => {
                Ok(AuthState::ReauthRequired)
            }
            Some(_) => Ok(AuthState::SignedIn),
        }
    }

    /// Revoke the grant at the provider (best effort) and remove all stored
    /// material for the account.
    #[instrument(skip(self), fields(account_id = %account_id))]
    pub async fn sign_out(&self, account_id: &AccountId) -> Result<()> {
        if let Some(credential) = self.store.get_credential(account_id).await? {
            self.oauth.revoke(&credential.access_token).await?;
        }

        self.store.delete_credential(account_id).await?;
        self.store.delete_identity(account_id).await?;
        self.events.emit(CoreEvent::Auth(AuthEvent::SignedOut {
            account_id: account_id.to_string(),
        }));
        info!("Account signed out");
        Ok(())
    }

    async fn resolve_credential(&self, account_id: &AccountId) -> Result<Credential> {
        match self.store.get_credential(account_id).await? {
            Some(credential) if !credential.is_expired_with_buffer(self.skew_buffer_secs) => {
                debug!("Stored credential still fresh");
                Ok(credential)
            }
            Some(credential) => match credential.refresh_token {
                Some(ref refresh_token) => {
                    self.refresh_and_persist(account_id, refresh_token).await
                }
                None => {
                    debug!("Credential expired with no refresh token");
                    self.interactive_sign_in(account_id).await
                }
            },
            None => self.interactive_sign_in(account_id).await,
        }
    }

    /// Refresh regardless of the stored expiry. Callers use this when the
    /// provider rejects a token the clock still considers valid, then retry
    /// the failed call once with the renewed credential.
    pub async fn force_refresh(&self, account_id: &AccountId) -> Result<Credential> {
        let lock = self.lock_for(account_id).await;
        let result = {
            let _guard = lock.lock().await;
            match self.store.get_credential(account_id).await? {
                Some(Credential {
                    refresh_token: Some(ref refresh_token),
                    ..
                }) => self.refresh_and_persist(account_id, refresh_token).await,
                _ => Err(AuthError::ReauthRequired),
            }
        };
        self.release_lock(account_id, lock).await;
        result
    }

    async fn refresh_and_persist(
        &self,
        account_id: &AccountId,
        refresh_token: &str,
    ) -> Result<Credential> {
        self.events.emit(CoreEvent::Auth(AuthEvent::TokenRefreshing {
            account_id: account_id.to_string(),
        }));

        match self.oauth.refresh(refresh_token).await {
            Ok(credential) => {
                // A failed write means the renewal is lost on restart, but
                // the in-hand token is still valid for this session.
                if let Err(e) = self.store.put_credential(account_id, &credential).await {
                    warn!(error = %e, "Failed to persist refreshed credential");
                }
                self.events.emit(CoreEvent::Auth(AuthEvent::TokenRefreshed {
                    account_id: account_id.to_string(),
                }));
                Ok(credential)
            }
            Err(AuthError::ReauthRequired) => {
                warn!("Refresh grant revoked, purging stored credential");
                // A purge failure must not mask the reauth signal.
                if let Err(e) = self.store.delete_credential(account_id).await {
                    warn!(error = %e, "Failed to purge stored credential");
                }
                if let Err(e) = self.store.delete_identity(account_id).await {
                    warn!(error = %e, "Failed to purge cached identity");
                }
                self.events.emit(CoreEvent::Auth(AuthEvent::ReauthRequired {
                    account_id: account_id.to_string(),
                }));
                Err(AuthError::ReauthRequired)
            }
            Err(e) => {
                self.events.emit(CoreEvent::Auth(AuthEvent::AuthFailed {
                    account_id: account_id.to_string(),
                    message: e.to_string(),
                }));
                Err(e)
            }
        }
    }

    async fn interactive_sign_in(&self, account_id: &AccountId) -> Result<Credential> {
        self.events.emit(CoreEvent::Auth(AuthEvent::SigningIn {
            account_id: account_id.to_string(),
        }));

        let request = self.oauth.build_authorization_request()?;
        let outcome = self
            .handoff
            .authorize(&request.url)
            .await
            .map_err(map_handoff_error)?;

        let (code, state) = match outcome {
            AuthorizationOutcome::Granted { code, state } => (code, state),
            AuthorizationOutcome::Denied => {
                self.events.emit(CoreEvent::Auth(AuthEvent::AuthFailed {
                    account_id: account_id.to_string(),
                    message: "authorization denied".to_string(),
                }));
                return Err(AuthError::AuthorizationDenied);
            }
        };

        let credential = self.oauth.exchange_code(&code, &state, &request.pkce).await?;

        if let Err(e) = self.store.put_credential(account_id, &credential).await {
            warn!(error = %e, "Failed to persist new credential");
        }
        self.events.emit(CoreEvent::Auth(AuthEvent::SignedIn {
            account_id: account_id.to_string(),
        }));
        info!("Interactive sign-in completed");
        Ok(credential)
    }

    async fn lock_for(&self, account_id: &AccountId) -> Arc<Mutex<()>> {
        let mut locks = self.refresh_locks.lock().await;
        locks
            .entry(*account_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn release_lock(&self, account_id: &AccountId, lock: Arc<Mutex<()>>) {
        drop(lock);
        let mut locks = self.refresh_locks.lock().await;
        // Drop the table entry once no other caller holds a handle to it.
        if let Some(entry) = locks.get(account_id) {
            if Arc::strong_count(entry) == 1 {
                locks.remove(account_id);
            }
        }
    }
}

fn map_handoff_error(e: BridgeError) -> AuthError {
    match e {
        BridgeError::Timeout(_) => AuthError::Timeout {
            operation: "authorization".to_string(),
        },
        other => AuthError::Network(other.to_string()),
    }
}
