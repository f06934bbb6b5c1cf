//! Bearer tokens for the Sheets API.
//!
//! A fixed token from configuration is used as-is. Otherwise a signed JWT
//! assertion for the service account is exchanged at the token endpoint,
//! and the resulting access token is cached until shortly before it
//! expires.

use crate::config::{ServiceAccount, StoreConfig};
use chrono::Utc;
use damlog::SyncError;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime requested for each signed assertion. Google caps it at one hour.
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// A cached token is replaced once it has less than this left.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Used when the token endpoint omits `expires_in`.
const DEFAULT_EXPIRES_IN: u64 = 3600;

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    DEFAULT_EXPIRES_IN
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

enum Credentials {
    Fixed(String),
    ServiceAccount(ServiceAccount),
}

/// Hands out a valid bearer token for every store request.
pub struct TokenProvider {
    credentials: Credentials,
    client: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenProvider {
    /// A fixed `access_token` wins over service-account credentials.
    pub fn from_config(config: &StoreConfig, client: reqwest::Client) -> Self {
        let credentials = match &config.service_account {
            Some(account) if config.access_token.is_empty() => {
                Credentials::ServiceAccount(account.clone())
            }
            _ => Credentials::Fixed(config.access_token.clone()),
        };
        Self {
            credentials,
            client,
            cached: Mutex::new(None),
        }
    }

    /// Current access token, minting a new one when the cached token is
    /// missing or about to expire.
    pub async fn token(&self) -> Result<String, SyncError> {
        let account = match &self.credentials {
            Credentials::Fixed(token) => return Ok(token.clone()),
            Credentials::ServiceAccount(account) => account,
        };

        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() + REFRESH_MARGIN < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        let minted = self.mint(account).await?;
        let value = minted.access_token.clone();
        *cached = Some(CachedToken {
            value: minted.access_token,
            expires_at: Instant::now() + Duration::from_secs(minted.expires_in),
        });
        Ok(value)
    }

    /// Forget the cached token so the next request mints a fresh one.
    pub async fn invalidate(&self) {
        self.cached.lock().await.take();
    }

    async fn mint(&self, account: &ServiceAccount) -> Result<TokenResponse, SyncError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            iss: &account.client_email,
            scope: SHEETS_SCOPE,
            aud: &account.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };
        let key = EncodingKey::from_rsa_pem(account.private_key.as_bytes())
            .map_err(|e| SyncError::Auth(format!("service account private key: {e}")))?;
        let assertion = jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key)
            .map_err(|e| SyncError::Auth(format!("signing assertion: {e}")))?;

        let resp = self
            .client
            .post(&account.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| SyncError::Transport(format!("token endpoint: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SyncError::Auth(format!(
                "token endpoint returned HTTP {}: {}",
                status.as_u16(),
                body.trim()
            )));
        }
        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| SyncError::Auth(format!("token response: {e}")))?;

        tracing::debug!(
            client_email = %account.client_email,
            expires_in = token.expires_in,
            "access token minted"
        );
        Ok(token)
    }
}
