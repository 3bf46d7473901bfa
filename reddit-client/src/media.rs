use crate::MediaFetcher;
use async_trait::async_trait;
use repostbot_core::CoreError;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

/// Plain HTTP download of post content. No authentication, no retries.
#[derive(Debug, Clone)]
pub struct HttpMediaFetcher {
    client: Client,
}

impl HttpMediaFetcher {
    pub fn new(user_agent: &str) -> Result<Self, CoreError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl MediaFetcher for HttpMediaFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, CoreError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            warn!("Download of {} returned {}", url, status);
            return Err(CoreError::Download {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await?;
        debug!("Downloaded {} bytes from {}", bytes.len(), url);
        Ok(bytes.to_vec())
    }
}
