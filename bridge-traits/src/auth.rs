//! Authorization Hand-off
//!
//! Bridges the browser-delegated part of the OAuth flow: the core builds an
//! authorization URL, the host presents it to the user, and the resulting
//! authorization code must come back to the SAME call that initiated the
//! request. The hand-off is synchronous by contract — implementations resolve
//! the redirect themselves (e.g. a loopback listener on the redirect URI) and
//! never park the code in shared storage for later polling.

use async_trait::async_trait;

use crate::error::Result;

/// Result of presenting an authorization URL to the user.
#[derive(Debug, Clone)]
pub enum AuthorizationOutcome {
    /// The user approved access; the provider redirected with a code.
    Granted {
        /// Authorization code to exchange at the token endpoint.
        code: String,
        /// Echoed state parameter for CSRF validation.
        state: String,
    },
    /// The user declined consent at the provider.
    Denied,
}

/// Drives the user-facing leg of an authorization-code flow.
#[async_trait]
pub trait AuthorizationHandoff: Send + Sync {
    /// Present `authorization_url` to the user and wait for the redirect.
    ///
    /// Returns [`AuthorizationOutcome::Denied`] when the provider reports the
    /// user declined; transport and listener failures surface as errors.
    async fn authorize(&self, authorization_url: &str) -> Result<AuthorizationOutcome>;
}

/// Opens a URL in the user's browser.
///
/// Split from [`AuthorizationHandoff`] so tests can drive the redirect
/// without spawning a browser.
pub trait UrlLauncher: Send + Sync {
    fn launch(&self, url: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_variants() {
        let granted = AuthorizationOutcome::Granted {
            code: "abc".to_string(),
            state: "xyz".to_string(),
        };
        assert!(matches!(granted, AuthorizationOutcome::Granted { .. }));
        assert!(matches!(AuthorizationOutcome::Denied, AuthorizationOutcome::Denied));
    }
}
