//! Network fetch primitive used by the download stage.

use async_trait::async_trait;
use std::time::Duration;

use crate::config::FetchConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::types::Stage;

/// Fetches the raw bytes behind a URL.
///
/// Implementations must map every failure (timeout, connection error,
/// non-success status) to a [`PipelineError`]; the download stage counts it
/// against the item and never retries.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str, timeout: Duration) -> PipelineResult<Vec<u8>>;
}

/// [`Fetcher`] backed by a shared `reqwest` client.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build a client using the configured User-Agent.
    pub fn new(config: &FetchConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }

    /// Wrap an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> PipelineResult<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify(url, timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| classify(url, timeout, e))?;
        Ok(bytes.to_vec())
    }
}

fn classify(url: &str, timeout: Duration, e: reqwest::Error) -> PipelineError {
    if e.is_timeout() {
        PipelineError::Timeout {
            item: url.to_string(),
            stage: Stage::Download,
            timeout_ms: timeout.as_millis() as u64,
        }
    } else {
        PipelineError::Fetch {
            url: url.to_string(),
            message: e.to_string(),
        }
    }
}
