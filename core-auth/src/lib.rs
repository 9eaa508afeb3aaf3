//! Credential Lifecycle Core
//!
//! OAuth 2.0 authorization-code flow with PKCE, durable credential storage
//! over the platform secret backend, and the single-flight token guard that
//! hands out valid access tokens to the rest of the core.

pub mod credential_store;
pub mod error;
pub mod guard;
pub mod oauth;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod types;

pub use credential_store::CredentialStore;
pub use error::{AuthError, Result};
pub use guard::{TokenGuard, DEFAULT_SKEW_BUFFER_SECS};
pub use oauth::{AuthorizationRequest, OAuthClient, PkceVerifier};
pub use types::{AccountId, AuthState, Credential, Identity};
