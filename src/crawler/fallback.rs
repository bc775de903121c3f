//! Non-rendering fallback reader
//!
//! Used when the rendered crawl produced nothing. Pages are fetched as plain
//! HTTP responses, without executing scripts, and walked with the same bounded
//! traversal as the rendered path.

use tracing::{info, instrument};

use crate::crawler::error::ReadError;
use crate::crawler::fetcher::{HttpFetcher, PageFetcher};
use crate::crawler::traversal::Crawler;
use crate::crawler::{CrawlerConfig, Document, ExtractionMethod};

/// Static fetch-and-extract reader
#[derive(Debug, Clone)]
pub struct FallbackReader<F = HttpFetcher> {
    fetcher: F,
    crawler: Crawler,
}

impl FallbackReader<HttpFetcher> {
    /// Create a reader that fetches over HTTP with the configured user agent
    pub fn new(config: CrawlerConfig) -> Result<Self, ReadError> {
        let fetcher = HttpFetcher::new(&config.user_agent)?;
        Ok(Self::with_fetcher(fetcher, config))
    }
}

impl<F: PageFetcher> FallbackReader<F> {
    /// Create a reader over any fetcher
    pub fn with_fetcher(fetcher: F, config: CrawlerConfig) -> Self {
        Self {
            fetcher,
            crawler: Crawler::new(config),
        }
    }

    /// Read `url` and its nearby same-origin pages
    ///
    /// Fails only when the seed page itself cannot be fetched; a reachable
    /// seed with no substantial text yields an empty list.
    #[instrument(skip(self))]
    pub async fn read(&self, url: &str) -> Result<Vec<Document>, ReadError> {
        let outcome = self
            .crawler
            .traverse(&self.fetcher, url, ExtractionMethod::Fallback)
            .await;

        if outcome.documents.is_empty() {
            if let Some(e) = outcome.seed_error {
                return Err(ReadError::Fetch(e));
            }
        }

        info!("Fallback reader extracted {} document(s)", outcome.documents.len());
        Ok(outcome.documents)
    }
}
