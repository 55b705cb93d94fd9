use reqwest::Client;
use serde::Deserialize;

use crate::SdkError;

#[derive(Debug, Clone, Deserialize)]
pub struct SystemStatus {
    pub version: String,
    pub status: String,
    pub live_connections: usize,
    pub waiting_requests: usize,
    pub pending_timeouts: usize,
    pub timeout_secs: u64,
    pub complete_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BucketDepth {
    pub bucket: String,
    pub waiting: usize,
    pub oldest_wait_ms: u64,
}

/// Client for the bearer-protected admin API.
pub struct AdminClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl AdminClient {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    pub async fn status(&self) -> Result<SystemStatus, SdkError> {
        Ok(self.get("status").await?.json().await?)
    }

    pub async fn queues(&self) -> Result<Vec<BucketDepth>, SdkError> {
        Ok(self.get("queues").await?.json().await?)
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response, SdkError> {
        let resp = self
            .client
            .get(format!("{}/admin/{}", self.base_url, path))
            .bearer_auth(&self.api_key)
            .send()
            .await?
            .error_for_status()?;
        Ok(resp)
    }
}
