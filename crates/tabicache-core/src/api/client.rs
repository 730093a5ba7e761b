//! API client for the sync source, the app's own pages and the exchange
//! rate endpoint.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{header, Client, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize};
use tracing::{debug, warn};

use super::ApiError;
use crate::sync::SyncTable;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Currency code read out of the exchange rate payload.
const RATE_CURRENCY: &str = "JPY";

#[derive(Debug, Deserialize)]
struct RateResponse {
    rates: HashMap<String, f64>,
}

/// HTTP client shared by sync, cache warming and rate refresh.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    sync_url: Option<Arc<str>>,
    api_key: Option<Arc<str>>,
}

impl ApiClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            sync_url: None,
            api_key: None,
        })
    }

    /// Point this client at a sync source, sharing the connection pool.
    pub fn with_sync_source(&self, sync_url: &str, api_key: &str) -> Self {
        Self {
            client: self.client.clone(),
            sync_url: Some(Arc::from(sync_url.trim_end_matches('/'))),
            api_key: Some(Arc::from(api_key)),
        }
    }

    pub fn has_sync_source(&self) -> bool {
        self.sync_url.is_some() && self.api_key.is_some()
    }

    fn sync_request(&self, url: &str) -> Result<RequestBuilder> {
        let api_key = self.api_key.as_deref().ok_or(ApiError::NotConfigured)?;
        Ok(self
            .client
            .get(url)
            .header("apikey", api_key)
            .bearer_auth(api_key)
            .header(header::ACCEPT, "application/json"))
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(response: reqwest::Response) -> Result<Option<reqwest::Response>> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }

    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }

    async fn get_with_retry<T: DeserializeOwned>(
        &self,
        url: &str,
        build: impl Fn() -> Result<RequestBuilder>,
    ) -> Result<T> {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = build()?
                .send()
                .await
                .with_context(|| format!("Failed to send GET request to {}", url))?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => {
                    return response
                        .json()
                        .await
                        .with_context(|| format!("Failed to parse JSON response from {}", url));
                }
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited.into());
                    }
                    warn!(url = url, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2;
                }
            }
        }
    }

    // ===== Sync Source =====

    /// Fetch every row of a remote table as raw JSON objects.
    pub async fn fetch_table(&self, table: SyncTable) -> Result<Vec<serde_json::Value>> {
        let base = self.sync_url.as_deref().ok_or(ApiError::NotConfigured)?;
        let url = format!("{}/rest/v1/{}?select=*", base, table.remote_name());
        let rows: Vec<serde_json::Value> = self
            .get_with_retry(&url, || self.sync_request(&url))
            .await
            .with_context(|| format!("Failed to fetch table {}", table.remote_name()))?;
        debug!(table = table.remote_name(), rows = rows.len(), "Fetched remote rows");
        Ok(rows)
    }

    // ===== Pages =====

    /// GET a page and drain its body. Success means the response was 2xx.
    pub async fn fetch_page(&self, url: &str) -> Result<()> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch page {}", url))?;
        let response = Self::check_response(response).await?;
        response
            .bytes()
            .await
            .with_context(|| format!("Failed to read page body {}", url))?;
        Ok(())
    }

    // ===== Exchange Rate =====

    /// Fetch the JPY-per-USD rate. Anything other than a finite positive
    /// number is an invalid response.
    pub async fn fetch_jpy_rate(&self, url: &str) -> Result<f64> {
        let response: RateResponse = self
            .get_with_retry(url, || {
                Ok(self.client.get(url).header(header::ACCEPT, "application/json"))
            })
            .await?;

        let rate = response
            .rates
            .get(RATE_CURRENCY)
            .copied()
            .ok_or_else(|| ApiError::InvalidResponse(format!("missing {} rate", RATE_CURRENCY)))?;

        if !rate.is_finite() || rate <= 0.0 {
            return Err(ApiError::InvalidResponse(format!("rate {} is not positive", rate)).into());
        }
        Ok(rate)
    }
}
