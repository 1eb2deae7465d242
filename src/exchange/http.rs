//! HTTP plumbing shared by the REST adapters

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use super::error::{ExchangeError, ExchangeResult};
use super::rate_limiter::RateLimiterConfig;

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Request timeout duration
    pub timeout: Duration,
    /// Rate limiter configuration
    pub rate_limiter: RateLimiterConfig,
    /// Overrides the adapter's default REST endpoint (used against mock servers)
    pub base_url: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            rate_limiter: RateLimiterConfig::default(),
            base_url: None,
        }
    }
}

impl ClientConfig {
    /// Set request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set rate limit (requests per second)
    pub fn with_rate_limit(mut self, requests_per_second: u32) -> Self {
        self.rate_limiter = self.rate_limiter.with_rate(requests_per_second);
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub(crate) fn build_client(&self) -> ExchangeResult<Client> {
        Ok(Client::builder()
            .timeout(self.timeout)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?)
    }

    pub(crate) fn base_url_or(&self, default: &str) -> String {
        self.base_url
            .as_deref()
            .unwrap_or(default)
            .trim_end_matches('/')
            .to_string()
    }
}

/// Check the status and decode the body, keeping the raw text in errors
pub(crate) async fn parse_response<T: DeserializeOwned>(response: Response) -> ExchangeResult<T> {
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        return Err(ExchangeError::Api {
            status: status.as_u16(),
            message: text,
        });
    }

    debug!("Response ({}): {} bytes", status, text.len());
    Ok(serde_json::from_str(&text)?)
}

/// Append a `key=value` pair to a query string
pub(crate) fn push_param(query: &mut String, key: &str, value: impl std::fmt::Display) {
    if !query.is_empty() {
        query.push('&');
    }
    query.push_str(key);
    query.push('=');
    query.push_str(&value.to_string());
}
