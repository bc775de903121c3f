//! Ordered extraction strategies
//!
//! Strategies are tried in sequence at request time; the first one returning
//! at least one document wins. An error or an empty result from one strategy
//! just moves on to the next.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use crate::crawler::browser::RenderEngine;
use crate::crawler::error::CrawlError;
use crate::crawler::fallback::FallbackReader;
use crate::crawler::fetcher::PageFetcher;
use crate::crawler::traversal::Crawler;
use crate::crawler::{CrawlerConfig, Document, ExtractionMethod};

/// One way of turning a seed URL into documents
#[async_trait]
pub trait ExtractionStrategy: Send + Sync {
    /// Method recorded on the documents this strategy produces
    fn method(&self) -> ExtractionMethod;

    /// Produce documents for `seed_url`
    async fn extract(&self, seed_url: &str) -> Result<Vec<Document>, CrawlError>;
}

/// Rendered crawl: one render session per call, released on every exit path
pub struct RenderedStrategy {
    engine: Arc<dyn RenderEngine>,
    crawler: Crawler,
}

impl RenderedStrategy {
    /// Create a strategy crawling through the given engine
    pub fn new(engine: Arc<dyn RenderEngine>, config: CrawlerConfig) -> Self {
        Self {
            engine,
            crawler: Crawler::new(config),
        }
    }
}

#[async_trait]
impl ExtractionStrategy for RenderedStrategy {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Rendered
    }

    async fn extract(&self, seed_url: &str) -> Result<Vec<Document>, CrawlError> {
        let session = self.engine.open().await?;
        let documents = self
            .crawler
            .crawl(session.as_ref(), seed_url, ExtractionMethod::Rendered)
            .await;
        session.close().await;
        Ok(documents)
    }
}

/// Static fallback read
pub struct FallbackStrategy<F = crate::crawler::fetcher::HttpFetcher> {
    reader: FallbackReader<F>,
}

impl<F: PageFetcher> FallbackStrategy<F> {
    /// Create a strategy around a fallback reader
    pub fn new(reader: FallbackReader<F>) -> Self {
        Self { reader }
    }
}

#[async_trait]
impl<F: PageFetcher> ExtractionStrategy for FallbackStrategy<F> {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Fallback
    }

    async fn extract(&self, seed_url: &str) -> Result<Vec<Document>, CrawlError> {
        Ok(self.reader.read(seed_url).await?)
    }
}

/// Run strategies in order until one yields documents
///
/// Returns `None` when every strategy failed or came back empty.
#[instrument(skip(strategies))]
pub async fn run_strategies(
    strategies: &[Box<dyn ExtractionStrategy>],
    seed_url: &str,
) -> Option<(ExtractionMethod, Vec<Document>)> {
    for strategy in strategies {
        let method = strategy.method();
        match strategy.extract(seed_url).await {
            Ok(documents) if !documents.is_empty() => {
                info!("{} extraction produced {} document(s)", method, documents.len());
                return Some((method, documents));
            }
            Ok(_) => warn!("{} extraction returned no documents for {}", method, seed_url),
            Err(e) => warn!("{} extraction failed for {}: {}", method, seed_url, e),
        }
    }
    None
}
