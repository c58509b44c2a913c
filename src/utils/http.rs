// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use crate::error::{AppError, Result};
use crate::models::FetcherConfig;

/// Create a configured asynchronous HTTP client.
///
/// Every request made through it is bounded by `timeout_secs`.
pub fn create_async_client(config: &FetcherConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// Fetch a URL and return the body as text.
///
/// Transport failures, timeouts and non-2xx statuses become `AppError::Fetch`.
pub async fn fetch_text(client: &reqwest::Client, url: &str) -> Result<String> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| AppError::fetch(url, e))?;
    let response = response
        .error_for_status()
        .map_err(|e| AppError::fetch(url, e))?;
    response.text().await.map_err(|e| AppError::fetch(url, e))
}

/// Fetch a URL and return the raw body.
pub async fn fetch_bytes(client: &reqwest::Client, url: &str) -> Result<Vec<u8>> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| AppError::fetch(url, e))?
        .error_for_status()
        .map_err(|e| AppError::fetch(url, e))?;
    let bytes = response.bytes().await.map_err(|e| AppError::fetch(url, e))?;
    Ok(bytes.to_vec())
}
