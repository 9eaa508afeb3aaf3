//! OAuth 2.0 Protocol Client
//!
//! Implements the authorization-code flow with PKCE (S256) plus token
//! refresh, revocation, and userinfo lookup. This layer is purely protocol:
//! it builds URLs and token-endpoint requests and classifies responses. It
//! never touches storage or locks; [`crate::guard::TokenGuard`] owns those.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use bridge_traits::error::BridgeError;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest};
use chrono::{Duration, Utc};
use core_runtime::OAuthSettings;
use rand::{distributions::Alphanumeric, Rng};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tracing::{debug, instrument, warn};

use crate::error::{AuthError, Result};
use crate::types::{Credential, Identity};

const PKCE_VERIFIER_LEN: usize = 64;
const STATE_LEN: usize = 32;
const DEFAULT_TOKEN_TIMEOUT: StdDuration = StdDuration::from_secs(30);

/// Refresh attempts against 5xx responses before giving up.
const MAX_REFRESH_ATTEMPTS: u32 = 3;

/// Per-flow PKCE material. Lives only for the duration of one
/// authorization attempt and is never persisted.
#[derive(Clone)]
pub struct PkceVerifier {
    verifier: String,
    state: String,
}

impl PkceVerifier {
    pub fn generate() -> Self {
        Self {
            verifier: random_string(PKCE_VERIFIER_LEN),
            state: random_string(STATE_LEN),
        }
    }

    /// S256 code challenge: base64url(sha256(verifier)), no padding.
    pub fn challenge(&self) -> String {
        let digest = Sha256::digest(self.verifier.as_bytes());
        URL_SAFE_NO_PAD.encode(digest)
    }

    pub fn state(&self) -> &str {
        &self.state
    }
}

impl std::fmt::Debug for PkceVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkceVerifier")
            .field("verifier", &"[REDACTED]")
            .field("state", &self.state)
            .finish()
    }
}

fn random_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// A prepared authorization request: the URL to present to the user plus
/// the PKCE material needed to finish the exchange.
pub struct AuthorizationRequest {
    pub url: String,
    pub pkce: PkceVerifier,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    expires_in: i64,
    #[serde(default)]
    token_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    error: Option<String>,
}

/// Protocol client for one OAuth application.
pub struct OAuthClient {
    settings: OAuthSettings,
    http: Arc<dyn HttpClient>,
    token_timeout: StdDuration,
}

impl OAuthClient {
    /// Create a client, validating the settings up front so misconfiguration
    /// surfaces before any flow starts.
    pub fn new(settings: OAuthSettings, http: Arc<dyn HttpClient>) -> Result<Self> {
        settings
            .validate()
            .map_err(|e| AuthError::Configuration(e.to_string()))?;
        Ok(Self {
            settings,
            http,
            token_timeout: DEFAULT_TOKEN_TIMEOUT,
        })
    }

    pub fn with_token_timeout(mut self, timeout: StdDuration) -> Self {
        self.token_timeout = timeout;
        self
    }

    /// Build the authorization URL the user is sent to.
    ///
    /// Requests offline access with forced consent so the provider issues a
    /// refresh token on every grant.
    pub fn build_authorization_request(&self) -> Result<AuthorizationRequest> {
        let pkce = PkceVerifier::generate();

        let mut url = url::Url::parse(&self.settings.auth_endpoint)
            .map_err(|e| AuthError::Configuration(format!("Bad auth endpoint: {}", e)))?;

        url.query_pairs_mut()
            .append_pair("client_id", &self.settings.client_id)
            .append_pair("redirect_uri", &self.settings.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", &self.settings.scopes.join(" "))
            .append_pair("state", pkce.state())
            .append_pair("code_challenge", &pkce.challenge())
            .append_pair("code_challenge_method", "S256")
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent");

        Ok(AuthorizationRequest {
            url: url.to_string(),
            pkce,
        })
    }

    /// Exchange an authorization code for tokens.
    ///
    /// `returned_state` is the state echoed back on the redirect; a mismatch
    /// aborts the flow before the code is sent anywhere.
    #[instrument(skip_all)]
    pub async fn exchange_code(
        &self,
        code: &str,
        returned_state: &str,
        pkce: &PkceVerifier,
    ) -> Result<Credential> {
        if returned_state != pkce.state() {
            warn!("Authorization redirect carried an unexpected state value");
            return Err(AuthError::StateMismatch);
        }

        let mut params = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", &self.settings.redirect_uri),
            ("client_id", &self.settings.client_id),
            ("code_verifier", &pkce.verifier),
        ];
        if let Some(secret) = &self.settings.client_secret {
            params.push(("client_secret", secret));
        }

        let response = self.post_token_form(&params, "code exchange").await?;
        debug!("Authorization code exchanged");
        Ok(response)
    }

    /// Redeem a refresh token for a new access token.
    ///
    /// Transient provider failures (5xx) are retried with backoff; 4xx
    /// responses are classified and returned immediately. An `invalid_grant`
    /// answer means the grant was revoked and maps to
    /// [`AuthError::ReauthRequired`].
    ///
    /// The returned credential keeps the previous refresh token when the
    /// provider omits one from the response.
    #[instrument(skip_all)]
    pub async fn refresh(&self, refresh_token: &str) -> Result<Credential> {
        let mut params = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", &self.settings.client_id),
        ];
        if let Some(secret) = &self.settings.client_secret {
            params.push(("client_secret", secret));
        }

        let mut last_error = None;
        for attempt in 0..MAX_REFRESH_ATTEMPTS {
            if attempt > 0 {
                let delay = StdDuration::from_millis(200 * 2u64.pow(attempt - 1));
                tokio::time::sleep(delay).await;
            }

            match self.post_token_form(&params, "token refresh").await {
                Ok(mut credential) => {
                    // Providers rotate refresh tokens sparingly; keep the old
                    // one when the response omits it.
                    if credential.refresh_token.is_none() {
                        credential.refresh_token = Some(refresh_token.to_string());
                    }
                    debug!("Access token refreshed");
                    return Ok(credential);
                }
                Err(e) if e.is_retryable() => {
                    warn!(attempt = attempt + 1, error = %e, "Transient refresh failure");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| AuthError::Network("refresh exhausted".to_string())))
    }

    /// Best-effort token revocation at the provider. Missing revocation
    /// endpoint or provider failure is not an error for the caller.
    pub async fn revoke(&self, token: &str) -> Result<()> {
        let endpoint = match &self.settings.revoke_endpoint {
            Some(endpoint) => endpoint,
            None => return Ok(()),
        };

        let body = serde_urlencoded::to_string([("token", token)])
            .map_err(|e| AuthError::Protocol(format!("Failed to encode revocation: {}", e)))?;
        let request = HttpRequest::new(HttpMethod::Post, endpoint)
            .form(body)
            .timeout(self.token_timeout);

        match self.http.execute(request).await {
            Ok(response) if response.is_success() => Ok(()),
            Ok(response) => {
                warn!(status = response.status, "Token revocation rejected");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Token revocation unreachable");
                Ok(())
            }
        }
    }

    /// Fetch the signed-in user's profile. A 401 maps to
    /// [`AuthError::TokenExpired`] so the caller can refresh and retry once.
    #[instrument(skip_all)]
    pub async fn fetch_identity(&self, access_token: &str) -> Result<Identity> {
        let endpoint = self.settings.userinfo_endpoint.as_ref().ok_or_else(|| {
            AuthError::Configuration("No userinfo endpoint configured".to_string())
        })?;

        let request = HttpRequest::new(HttpMethod::Get, endpoint)
            .bearer_token(access_token)
            .timeout(self.token_timeout);

        let response = self
            .http
            .execute(request)
            .await
            .map_err(|e| map_transport_error("identity fetch", e))?;

        if response.status == 401 {
            return Err(AuthError::TokenExpired);
        }
        if !response.is_success() {
            return Err(provider_error(&response));
        }

        #[derive(Deserialize)]
        struct UserInfo {
            #[serde(alias = "sub")]
            id: String,
            #[serde(default)]
            email: Option<String>,
            #[serde(default, alias = "name")]
            display_name: Option<String>,
        }

        let info: UserInfo = response
            .json()
            .map_err(|e| AuthError::Protocol(e.to_string()))?;
        Ok(Identity {
            id: info.id,
            email: info.email,
            display_name: info.display_name,
        })
    }

    async fn post_token_form(&self, params: &[(&str, &str)], operation: &str) -> Result<Credential> {
        let body = serde_urlencoded::to_string(params)
            .map_err(|e| AuthError::Protocol(format!("Failed to encode form: {}", e)))?;

        let request = HttpRequest::new(HttpMethod::Post, &self.settings.token_endpoint)
            .form(body)
            .timeout(self.token_timeout);

        let response = self
            .http
            .execute(request)
            .await
            .map_err(|e| map_transport_error(operation, e))?;

        if !response.is_success() {
            let code = response
                .json::<ErrorResponse>()
                .ok()
                .and_then(|e| e.error)
                .unwrap_or_else(|| "unknown".to_string());

            // A rejected refresh grant means the user revoked access; the
            // only way forward is a fresh interactive sign-in.
            if response.is_client_error()
                && (code == "invalid_grant" || code == "invalid_token")
                && operation == "token refresh"
            {
                return Err(AuthError::ReauthRequired);
            }
            return Err(AuthError::Provider {
                status: response.status,
                code,
            });
        }

        let token: TokenResponse = response
            .json()
            .map_err(|e| AuthError::Protocol(e.to_string()))?;

        Ok(Credential {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at: Utc::now() + Duration::seconds(token.expires_in),
            token_type: token.token_type.unwrap_or_else(|| "Bearer".to_string()),
        })
    }
}

fn map_transport_error(operation: &str, e: BridgeError) -> AuthError {
    match e {
        BridgeError::Timeout(_) => AuthError::Timeout {
            operation: operation.to_string(),
        },
        other => AuthError::Network(other.to_string()),
    }
}

fn provider_error(response: &bridge_traits::http::HttpResponse) -> AuthError {
    let code = response
        .json::<ErrorResponse>()
        .ok()
        .and_then(|e| e.error)
        .unwrap_or_else(|| "unknown".to_string());
    AuthError::Provider {
        status: response.status,
        code,
    }
}
