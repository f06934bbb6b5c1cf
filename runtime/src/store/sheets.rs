//! Google Sheets v4 store client.
//!
//! Column A holds the fetch time, column B the observation timestamp (the
//! dedupe key), C..K the measurements. Values are written `RAW` so the
//! timestamp text reads back exactly as written.

use super::auth::TokenProvider;
use super::Store;
use crate::config::StoreConfig;
use async_trait::async_trait;
use damlog::SyncError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Per-request timeout for store calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest response body quoted in an error.
const MAX_ERROR_BODY: usize = 300;

/// Observation timestamps, below the header row.
const KEY_RANGE: &str = "B2:B";

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Serialize)]
struct AppendBody<'a> {
    values: &'a [Vec<String>],
}

/// Sheets API client bound to one spreadsheet tab.
#[derive(Clone)]
pub struct SheetsStore {
    client: reqwest::Client,
    config: StoreConfig,
    tokens: Arc<TokenProvider>,
}

impl SheetsStore {
    pub fn new(config: StoreConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("damlog/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        let tokens = Arc::new(TokenProvider::from_config(&config, client.clone()));
        Self {
            client,
            config,
            tokens,
        }
    }

    /// Status check that also drops a token the API no longer accepts.
    async fn checked(&self, resp: reqwest::Response) -> Result<reqwest::Response, SyncError> {
        let result = check_status(resp).await;
        if let Err(SyncError::Status { status: 401, .. }) = &result {
            tracing::warn!("Sheets API rejected the access token");
            self.tokens.invalidate().await;
        }
        result
    }

    /// `{base}/v4/spreadsheets/{id}/values/{last}`, with each segment encoded.
    fn values_url(&self, last: &str) -> Result<Url, SyncError> {
        let mut url = Url::parse(&self.config.api_base)
            .map_err(|e| SyncError::Transport(format!("bad Sheets API base: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| SyncError::Transport("Sheets API base cannot take a path".into()))?
            .pop_if_empty()
            .extend([
                "v4",
                "spreadsheets",
                self.config.spreadsheet_id.as_str(),
                "values",
                last,
            ]);
        Ok(url)
    }

    fn key_range(&self) -> String {
        format!("{}!{KEY_RANGE}", self.config.sheet_name)
    }

    fn append_range(&self) -> String {
        format!("{}!A1", self.config.sheet_name)
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, SyncError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let mut body = resp.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let cut = (0..=MAX_ERROR_BODY)
            .rev()
            .find(|&i| body.is_char_boundary(i))
            .unwrap_or(0);
        body.truncate(cut);
    }
    Err(SyncError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl Store for SheetsStore {
    async fn query_existing_timestamps(&self) -> Result<HashSet<String>, SyncError> {
        let url = self.values_url(&self.key_range())?;
        let token = self.tokens.token().await?;
        let resp = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| SyncError::Transport(e.to_string()))?;

        let range: ValueRange = self
            .checked(resp)
            .await?
            .json()
            .await
            .map_err(|e| SyncError::Decode(e.to_string()))?;

        let keys: HashSet<String> = range
            .values
            .into_iter()
            .filter_map(|row| row.into_iter().next())
            .filter_map(|cell| match cell {
                serde_json::Value::String(s) => Some(s),
                serde_json::Value::Null => None,
                other => Some(other.to_string()),
            })
            .filter(|s| !s.is_empty())
            .collect();

        tracing::debug!(count = keys.len(), "existing timestamps read");
        Ok(keys)
    }

    async fn append_rows(&self, rows: &[Vec<String>]) -> Result<(), SyncError> {
        let url = self.values_url(&format!("{}:append", self.append_range()))?;
        let token = self.tokens.token().await?;
        let resp = self
            .client
            .post(url)
            .query(&[
                ("valueInputOption", "RAW"),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .bearer_auth(token)
            .json(&AppendBody { values: rows })
            .send()
            .await
            .map_err(|e| SyncError::Transport(e.to_string()))?;

        self.checked(resp).await?;
        tracing::info!(rows = rows.len(), "rows appended");
        Ok(())
    }
}
