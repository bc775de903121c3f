//! Page fetching seam shared by the rendered and static crawl paths

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, instrument};

use crate::crawler::error::FetchError;

/// Retrieves the HTML of a page within a time budget
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch `url`, failing with `FetchError::Timeout` once `timeout` elapses
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<String, FetchError>;
}

/// Non-rendering fetcher: returns the static response body without running scripts
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Create a fetcher sending the given user agent
    pub fn new(user_agent: &str) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    #[instrument(skip(self))]
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify(url, timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        if let Some(content_type) = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
        {
            let content_type = content_type.to_ascii_lowercase();
            if !(content_type.contains("html") || content_type.starts_with("text/")) {
                return Err(FetchError::UnsupportedContent {
                    url: url.to_string(),
                    content_type,
                });
            }
        }

        let body = response
            .text()
            .await
            .map_err(|e| classify(url, timeout, e))?;
        debug!("Fetched {} bytes from {}", body.len(), url);
        Ok(body)
    }
}

fn classify(url: &str, timeout: Duration, err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        }
    } else {
        FetchError::Http(err)
    }
}
