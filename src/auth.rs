//! Access-token handling: bearer extraction, per-token Gmail hubs, and a
//! developer helper that runs the OAuth installed flow

use google_gmail1::{hyper_rustls, hyper_util, yup_oauth2, Gmail};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::client::{GmailClient, ProductionGmailClient};
use crate::error::{GmailError, Result};

/// Gmail API scopes the service needs from the session's token
///
/// - gmail.modify: read, label, trash and send (no permanent deletion)
/// - gmail.labels: label management
/// - gmail.settings.basic: filter creation
pub const REQUIRED_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/gmail.modify",
    "https://www.googleapis.com/auth/gmail.labels",
    "https://www.googleapis.com/auth/gmail.settings.basic",
];

type HttpsConnector = hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>;

/// Type alias for Gmail Hub to simplify type signatures
pub type GmailHub = Gmail<HttpsConnector>;

/// Pooled HTTPS client shared by every request's hub
pub type GmailHttpClient = google_gmail1::common::Client<HttpsConnector>;

/// Extract the token from an `Authorization: Bearer <token>` value
pub fn bearer_token(header_value: &str) -> Option<&str> {
    let (scheme, token) = header_value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Produces a Gmail client for the caller's access token
///
/// The token is a per-request capability and is never stored.
pub trait GmailClientFactory: Send + Sync {
    fn for_token(&self, access_token: &str) -> Arc<dyn GmailClient>;
}

/// Builds `ProductionGmailClient`s over one shared connection pool
pub struct HubClientFactory {
    http: GmailHttpClient,
    request_timeout: Duration,
}

impl HubClientFactory {
    /// Configure HTTP client with TLS
    ///
    /// Uses HTTP/1 for compatibility with google-gmail1.
    pub fn new(request_timeout: Duration) -> Result<Self> {
        let http = hyper_util::client::legacy::Client::builder(hyper_util::rt::TokioExecutor::new())
            .build(
                hyper_rustls::HttpsConnectorBuilder::new()
                    .with_native_roots()
                    .map_err(|e| GmailError::ConfigError(format!("Failed to load TLS roots: {}", e)))?
                    .https_or_http()
                    .enable_http1()
                    .build(),
            );

        Ok(Self {
            http,
            request_timeout,
        })
    }
}

impl GmailClientFactory for HubClientFactory {
    fn for_token(&self, access_token: &str) -> Arc<dyn GmailClient> {
        let hub = Gmail::new(self.http.clone(), access_token.to_string());
        Arc::new(ProductionGmailClient::new(hub, self.request_timeout))
    }
}

/// Obtain an access token through the OAuth2 installed flow
///
/// Local development helper: the session layer normally supplies tokens.
/// Tokens are cached at `token_cache_path` and refreshed from there.
pub async fn obtain_access_token(credentials_path: &Path, token_cache_path: &Path) -> Result<String> {
    let secret = yup_oauth2::read_application_secret(credentials_path)
        .await
        .map_err(|e| GmailError::AuthError(format!("Failed to read credentials: {}", e)))?;

    // HTTPRedirect opens a browser for user authorization
    let auth = yup_oauth2::InstalledFlowAuthenticator::builder(
        secret,
        yup_oauth2::InstalledFlowReturnMethod::HTTPRedirect,
    )
    .persist_tokens_to_disk(token_cache_path)
    .build()
    .await
    .map_err(|e| GmailError::AuthError(format!("Failed to build authenticator: {}", e)))?;

    let token = auth
        .token(REQUIRED_SCOPES)
        .await
        .map_err(|e| GmailError::AuthError(format!("Failed to obtain token: {}", e)))?;

    token
        .token()
        .map(str::to_string)
        .ok_or_else(|| GmailError::AuthError("Token response had no access token".to_string()))
}

/// Secure token file permissions on Unix systems
///
/// Sets file permissions to 0600 (read/write for owner only)
#[cfg(unix)]
pub async fn secure_token_file(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = tokio::fs::metadata(path).await?.permissions();
    perms.set_mode(0o600);
    tokio::fs::set_permissions(path, perms).await?;
    Ok(())
}

/// Windows uses ACLs instead of Unix permissions
#[cfg(windows)]
pub async fn secure_token_file(_path: &Path) -> Result<()> {
    Ok(())
}
