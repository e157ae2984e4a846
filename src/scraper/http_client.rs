use crate::config::ScraperConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use tokio::time::sleep;
use tokio_retry::RetryIf;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{debug, warn};

use super::Fetcher;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("HTTP {0}")]
    Status(StatusCode),
}

impl FetchError {
    /// Transport errors, rate limiting and 5xx are retried; other 4xx are not.
    fn is_retryable(&self) -> bool {
        match self {
            FetchError::Request(_) => true,
            FetchError::Status(s) => *s == StatusCode::TOO_MANY_REQUESTS || s.is_server_error(),
        }
    }
}

pub struct HttpClient {
    inner: reqwest::Client,
    config: ScraperConfig,
}

impl HttpClient {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            // Accept cookies so session-based pages work
            .cookie_store(true)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            inner,
            config: config.clone(),
        })
    }

    fn backoff(&self) -> impl Iterator<Item = Duration> + use<> {
        // 2^n ms scaled so the first retry waits ~request_delay_ms
        ExponentialBackoff::from_millis(2)
            .factor((self.config.request_delay_ms / 2).max(1))
            .max_delay(Duration::from_secs(30))
            .map(jitter)
            .take(self.config.max_retries as usize)
    }

    async fn send_once(&self, url: &str) -> Result<reqwest::Response, FetchError> {
        debug!("GET {}", url);
        let resp = self.inner.get(url).send().await?;
        let status = resp.status();
        if status.is_success() {
            Ok(resp)
        } else {
            if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::SERVICE_UNAVAILABLE {
                warn!("Rate limited ({}) on {}", status, url);
            }
            Err(FetchError::Status(status))
        }
    }

    /// GET with polite delay and retry.
    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        self.polite_delay().await;
        RetryIf::start(self.backoff(), || self.send_once(url), FetchError::is_retryable)
            .await
            .with_context(|| format!("All retries exhausted for {}", url))
    }

    /// Sleep for the configured delay + random jitter.
    async fn polite_delay(&self) {
        let jitter_ms = rand::random_range(0..=self.config.jitter_ms);
        sleep(Duration::from_millis(self.config.request_delay_ms + jitter_ms)).await;
    }
}

#[async_trait]
impl Fetcher for HttpClient {
    async fn get_text(&self, url: &str) -> Result<String> {
        let resp = self.get(url).await?;
        resp.text().await.context("Failed to read response body")
    }

    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self.get(url).await?;
        let bytes = resp.bytes().await.context("Failed to read response body")?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(FetchError::Status(StatusCode::TOO_MANY_REQUESTS).is_retryable());
        assert!(FetchError::Status(StatusCode::BAD_GATEWAY).is_retryable());
        assert!(!FetchError::Status(StatusCode::NOT_FOUND).is_retryable());
    }

    #[test]
    fn test_backoff_is_bounded() {
        let client = HttpClient::new(&ScraperConfig::default()).unwrap();
        let delays: Vec<Duration> = client.backoff().collect();
        assert_eq!(delays.len(), ScraperConfig::default().max_retries as usize);
        assert!(delays.iter().all(|d| *d <= Duration::from_secs(30)));
    }
}
