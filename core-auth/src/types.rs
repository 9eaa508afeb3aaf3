//! Authentication Types

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Stable identifier for a signed-in account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(pub Uuid);

impl AccountId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AccountId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// OAuth credential material for one account.
///
/// The refresh token is optional because providers only issue one on the
/// initial consent grant; subsequent exchanges may omit it.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub token_type: String,
}

impl Credential {
    /// Whether the access token has expired outright.
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Whether the token expires within the next `buffer_secs` seconds.
    /// Used to renew before expiry instead of racing it.
    pub fn is_expired_with_buffer(&self, buffer_secs: i64) -> bool {
        Utc::now() + Duration::seconds(buffer_secs) >= self.expires_at
    }

    /// Seconds until expiry, negative if already expired.
    pub fn expires_in_secs(&self) -> i64 {
        (self.expires_at - Utc::now()).num_seconds()
    }
}

// Token material never appears in logs, even at debug level.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_at", &self.expires_at)
            .field("token_type", &self.token_type)
            .finish()
    }
}

/// Profile information fetched from the provider's userinfo endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Identity {
    /// Provider-side subject identifier.
    pub id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

/// Coarse authentication state for one account, as shown to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    /// No stored material for this account.
    SignedOut,
    /// A credential exists and is usable or refreshable.
    SignedIn,
    /// Stored material exists but the grant was revoked; interactive
    /// sign-in is required.
    ReauthRequired,
}
