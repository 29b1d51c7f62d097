// src/auth.rs

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::KronosConfig;
use crate::error::KronosError;

/// Tokens are refreshed proactively this many seconds before the expiry
/// decoded from the access token.
pub const REFRESH_BUFFER_SECS: i64 = 10;

/// Fallback lifetime when the access token is opaque and the token endpoint
/// did not send `expires_in`.
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 300;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
}

impl AuthConfig {
    pub fn from_config(config: &KronosConfig) -> Self {
        Self {
            token_url: config.token_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenEndpointResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<u64>,
    pub token_type: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct TokenState {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl TokenState {
    pub fn expiring_within(&self, buffer_secs: i64) -> bool {
        Utc::now() + Duration::seconds(buffer_secs) >= self.expires_at
    }
}

/// Explicitly constructed token provider (no ambient singleton): OAuth2
/// resource-owner-password-credentials against the external identity
/// provider, with refresh-token grant for renewals.
pub struct AuthProvider {
    http: Client,
    config: AuthConfig,
    token: Mutex<Option<TokenState>>,
}

impl AuthProvider {
    pub fn new(http: Client, config: AuthConfig) -> Self {
        Self {
            http,
            config,
            token: Mutex::new(None),
        }
    }

    /// Returns a valid access token, logging in or refreshing as needed.
    pub async fn bearer(&self) -> Result<String, KronosError> {
        let mut guard = self.token.lock().await;
        if let Some(state) = guard.as_ref() {
            if !state.expiring_within(REFRESH_BUFFER_SECS) {
                return Ok(state.access_token.clone());
            }
            debug!("Access token expires within {}s, renewing", REFRESH_BUFFER_SECS);
        }
        let state = self.obtain(guard.take()).await?;
        let access = state.access_token.clone();
        *guard = Some(state);
        Ok(access)
    }

    /// Discards the current token and obtains a fresh one. Used by the
    /// reactive 401 retry path.
    pub async fn force_refresh(&self) -> Result<String, KronosError> {
        let mut guard = self.token.lock().await;
        let state = self.obtain(guard.take()).await?;
        let access = state.access_token.clone();
        *guard = Some(state);
        Ok(access)
    }

    async fn obtain(&self, previous: Option<TokenState>) -> Result<TokenState, KronosError> {
        if let Some(refresh_token) = previous.and_then(|p| p.refresh_token) {
            match self.refresh_grant(&refresh_token).await {
                Ok(state) => return Ok(state),
                Err(e) => {
                    // ROPC credentials are in config, so fall back to a full
                    // login instead of surfacing the refresh failure.
                    warn!("Refresh-token grant failed ({}), retrying with password grant", e);
                }
            }
        }
        self.password_grant().await
    }

    async fn password_grant(&self) -> Result<TokenState, KronosError> {
        let params = [
            ("grant_type", "password"),
            ("username", self.config.username.as_str()),
            ("password", self.config.password.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];
        let response = self.request_token(&params).await?;
        info!("Obtained access token via password grant");
        Ok(response)
    }

    async fn refresh_grant(&self, refresh_token: &str) -> Result<TokenState, KronosError> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];
        let response = self.request_token(&params).await?;
        debug!("Refreshed access token");
        Ok(response)
    }

    async fn request_token(&self, params: &[(&str, &str)]) -> Result<TokenState, KronosError> {
        let response = self
            .http
            .post(&self.config.token_url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(ACCEPT, "application/json")
            .form(params)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let token_response = response.json::<TokenEndpointResponse>().await?;
            Ok(token_state_from(token_response))
        } else {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            Err(KronosError::TokenRefreshFailed {
                status: Some(status),
                message,
            })
        }
    }

    #[cfg(test)]
    pub(crate) async fn seed(
        &self,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: DateTime<Utc>,
    ) {
        let mut guard = self.token.lock().await;
        *guard = Some(TokenState {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.map(|s| s.to_string()),
            expires_at,
        });
    }
}

pub(crate) fn token_state_from(response: TokenEndpointResponse) -> TokenState {
    let expires_at = decode_jwt_exp(&response.access_token).unwrap_or_else(|| {
        let lifetime = response
            .expires_in
            .map(|s| s as i64)
            .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
        Utc::now() + Duration::seconds(lifetime)
    });
    TokenState {
        access_token: response.access_token,
        refresh_token: response.refresh_token,
        expires_at,
    }
}

/// Reads `exp` from the unverified JWT payload. Signature verification is
/// the server's job; the client only needs the expiry for proactive refresh.
pub(crate) fn decode_jwt_exp(token: &str) -> Option<DateTime<Utc>> {
    #[derive(Deserialize)]
    struct Claims {
        exp: i64,
    }

    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.as_bytes()).ok()?;
    let claims: Claims = serde_json::from_slice(&bytes).ok()?;
    DateTime::from_timestamp(claims.exp, 0)
}
