//! Core Event System
//!
//! Broadcast bus the core publishes lifecycle events on. Hosts subscribe to
//! drive UI state; slow subscribers lag rather than block publishers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Events emitted by the authentication layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthEvent {
    /// An interactive sign-in has started; the browser is being opened.
    SigningIn { account_id: String },
    /// Sign-in finished and a credential is persisted.
    SignedIn { account_id: String },
    /// The account's stored material was removed.
    SignedOut { account_id: String },
    /// A background token refresh started.
    TokenRefreshing { account_id: String },
    /// A background token refresh completed.
    TokenRefreshed { account_id: String },
    /// The stored grant is no longer usable; the user must sign in again.
    ReauthRequired { account_id: String },
    /// An authentication operation failed.
    AuthFailed { account_id: String, message: String },
}

/// Events emitted by the upload pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UploadEvent {
    /// A task was accepted and queued.
    Queued { task_id: String },
    /// A task moved to a new stage.
    StateChanged {
        task_id: String,
        from: String,
        to: String,
    },
    /// A task finished and the artifact is publicly reachable.
    Completed { task_id: String, view_url: String },
    /// A task failed; `retryable` says whether `retry` can resume it.
    Failed {
        task_id: String,
        message: String,
        retryable: bool,
    },
    /// A task was cancelled before completion.
    Cancelled { task_id: String },
}

/// Top-level event envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum CoreEvent {
    Auth(AuthEvent),
    Upload(UploadEvent),
}

impl CoreEvent {
    /// Short human-readable description for logs and diagnostics.
    pub fn description(&self) -> String {
        match self {
            CoreEvent::Auth(e) => match e {
                AuthEvent::SigningIn { account_id } => {
                    format!("Signing in account {}", account_id)
                }
                AuthEvent::SignedIn { account_id } => format!("Account {} signed in", account_id),
                AuthEvent::SignedOut { account_id } => {
                    format!("Account {} signed out", account_id)
                }
                AuthEvent::TokenRefreshing { account_id } => {
                    format!("Refreshing token for account {}", account_id)
                }
                AuthEvent::TokenRefreshed { account_id } => {
                    format!("Token refreshed for account {}", account_id)
                }
                AuthEvent::ReauthRequired { account_id } => {
                    format!("Account {} requires re-authorization", account_id)
                }
                AuthEvent::AuthFailed {
                    account_id,
                    message,
                } => format!("Auth failed for account {}: {}", account_id, message),
            },
            CoreEvent::Upload(e) => match e {
                UploadEvent::Queued { task_id } => format!("Upload {} queued", task_id),
                UploadEvent::StateChanged { task_id, from, to } => {
                    format!("Upload {} moved {} -> {}", task_id, from, to)
                }
                UploadEvent::Completed { task_id, .. } => {
                    format!("Upload {} completed", task_id)
                }
                UploadEvent::Failed {
                    task_id, message, ..
                } => format!("Upload {} failed: {}", task_id, message),
                UploadEvent::Cancelled { task_id } => format!("Upload {} cancelled", task_id),
            },
        }
    }

    /// Whether the event reports a failure.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            CoreEvent::Auth(AuthEvent::AuthFailed { .. })
                | CoreEvent::Auth(AuthEvent::ReauthRequired { .. })
                | CoreEvent::Upload(UploadEvent::Failed { .. })
        )
    }
}

/// Timestamped event as delivered to subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub timestamp: DateTime<Utc>,
    pub event: CoreEvent,
}

/// Broadcast channel for core events.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event. Events published with no subscribers are dropped.
    pub fn emit(&self, event: CoreEvent) {
        debug!(event = %event.description(), "Emitting core event");
        let envelope = EventEnvelope {
            timestamp: Utc::now(),
            event,
        };
        let _ = self.sender.send(envelope);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
