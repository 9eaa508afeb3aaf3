//! Loopback Authorization Hand-off
//!
//! Resolves the browser-delegated leg of the authorization-code flow
//! synchronously: a one-shot TCP listener is bound to the loopback redirect
//! URI *before* the browser opens, so the redirect carrying the authorization
//! code lands back in the very call that initiated the request. There is no
//! shared-storage bridge and no polling.

use async_trait::async_trait;
use bridge_traits::{
    auth::{AuthorizationHandoff, AuthorizationOutcome, UrlLauncher},
    error::{BridgeError, Result},
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};
use url::Url;

const RESPONSE_PAGE: &str = "<html><body><h2>Authorization complete.</h2>\
<p>You can close this window and return to the application.</p></body></html>";

/// Default time to wait for the user to finish in the browser.
const DEFAULT_WAIT: Duration = Duration::from_secs(300);

/// One-shot loopback redirect listener.
pub struct LoopbackHandoff {
    redirect_uri: String,
    launcher: Arc<dyn UrlLauncher>,
    wait_timeout: Duration,
}

impl LoopbackHandoff {
    /// Create a hand-off listening on the given loopback redirect URI
    /// (e.g. `http://127.0.0.1:8085/callback`).
    pub fn new(redirect_uri: impl Into<String>, launcher: Arc<dyn UrlLauncher>) -> Self {
        Self {
            redirect_uri: redirect_uri.into(),
            launcher,
            wait_timeout: DEFAULT_WAIT,
        }
    }

    pub fn with_wait_timeout(mut self, wait_timeout: Duration) -> Self {
        self.wait_timeout = wait_timeout;
        self
    }

    fn bind_address(&self) -> Result<(String, String)> {
        let url = Url::parse(&self.redirect_uri)
            .map_err(|e| BridgeError::OperationFailed(format!("Invalid redirect URI: {}", e)))?;

        let host = url
            .host_str()
            .ok_or_else(|| {
                BridgeError::OperationFailed("Redirect URI has no host".to_string())
            })?
            .to_string();
        let port = url.port().ok_or_else(|| {
            BridgeError::OperationFailed("Redirect URI must carry an explicit port".to_string())
        })?;

        if host != "127.0.0.1" && host != "localhost" && host != "[::1]" {
            return Err(BridgeError::OperationFailed(
                "Redirect URI must point at loopback".to_string(),
            ));
        }

        Ok((format!("{}:{}", host, port), url.path().to_string()))
    }

    /// Parse the query parameters out of an HTTP request line
    /// (`GET /callback?code=...&state=... HTTP/1.1`).
    fn parse_request_line(line: &str) -> Option<HashMap<String, String>> {
        let mut parts = line.split_whitespace();
        let method = parts.next()?;
        let target = parts.next()?;
        if method != "GET" {
            return None;
        }

        // A relative target is enough; the base host is irrelevant here.
        let parsed = Url::parse(&format!("http://localhost{}", target)).ok()?;
        Some(
            parsed
                .query_pairs()
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect(),
        )
    }

    fn outcome_from_params(params: HashMap<String, String>) -> Result<AuthorizationOutcome> {
        if let Some(error) = params.get("error") {
            return if error == "access_denied" {
                Ok(AuthorizationOutcome::Denied)
            } else {
                Err(BridgeError::OperationFailed(format!(
                    "Authorization redirect carried error: {}",
                    error
                )))
            };
        }

        match (params.get("code"), params.get("state")) {
            (Some(code), Some(state)) => Ok(AuthorizationOutcome::Granted {
                code: code.clone(),
                state: state.clone(),
            }),
            _ => Err(BridgeError::OperationFailed(
                "Authorization redirect missing code or state".to_string(),
            )),
        }
    }

    async fn wait_for_redirect(&self, listener: TcpListener, path: &str) -> Result<AuthorizationOutcome> {
        loop {
            let (stream, peer) = listener.accept().await.map_err(BridgeError::Io)?;
            debug!(peer = %peer, "Accepted redirect connection");

            let mut reader = BufReader::new(stream);
            let mut request_line = String::new();
            reader.read_line(&mut request_line).await?;

            let params = match Self::parse_request_line(request_line.trim_end()) {
                Some(p) if request_line.contains(path) => p,
                _ => {
                    // Favicon probes and stray requests get a 404 and we keep
                    // waiting for the real redirect.
                    let mut stream = reader.into_inner();
                    let _ = stream
                        .write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n")
                        .await;
                    continue;
                }
            };

            let mut stream = reader.into_inner();
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                RESPONSE_PAGE.len(),
                RESPONSE_PAGE
            );
            let _ = stream.write_all(response.as_bytes()).await;
            let _ = stream.shutdown().await;

            return Self::outcome_from_params(params);
        }
    }
}

#[async_trait]
impl AuthorizationHandoff for LoopbackHandoff {
    async fn authorize(&self, authorization_url: &str) -> Result<AuthorizationOutcome> {
        let (addr, path) = self.bind_address()?;

        // Bind before launching the browser so the redirect cannot race us.
        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            warn!(addr = %addr, error = %e, "Failed to bind loopback listener");
            BridgeError::Io(e)
        })?;
        info!(addr = %addr, "Loopback redirect listener ready");

        self.launcher.launch(authorization_url)?;

        match tokio::time::timeout(self.wait_timeout, self.wait_for_redirect(listener, &path)).await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(BridgeError::Timeout(self.wait_timeout)),
        }
    }
}

/// Opens URLs with the platform's default browser.
pub struct SystemBrowser;

impl UrlLauncher for SystemBrowser {
    fn launch(&self, url: &str) -> Result<()> {
        #[cfg(target_os = "macos")]
        let result = std::process::Command::new("open").arg(url).spawn();
        #[cfg(target_os = "windows")]
        let result = std::process::Command::new("cmd")
            .args(["/C", "start", "", url])
            .spawn();
        #[cfg(not(any(target_os = "macos", target_os = "windows")))]
        let result = std::process::Command::new("xdg-open").arg(url).spawn();

        result
            .map(|_| ())
            .map_err(|e| BridgeError::OperationFailed(format!("Failed to open browser: {}", e)))
    }
}
