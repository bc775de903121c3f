//! # Crawler Configuration Module
//!
//! Configuration for page fetching, traversal bounds and content filtering,
//! built through `CrawlerConfig::builder()`.
//!
//! The defaults are tuned for small documentation and marketing sites: a
//! shallow depth-first walk that follows only the first couple of same-origin
//! links per page, a generous per-page render budget, and a short settle delay
//! so late client-side rendering lands in the captured markup.

use std::path::PathBuf;
use std::time::Duration;

/// Pages whose cleaned text is not longer than this are dropped
pub const DEFAULT_MIN_TEXT_LENGTH: usize = 50;

/// Configuration for the crawler
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    /// Maximum depth to crawl (the seed is depth 0)
    pub max_depth: u32,

    /// Maximum number of same-origin links followed from each page
    pub max_links_per_page: usize,

    /// Per-page load budget in milliseconds
    pub page_timeout_ms: u64,

    /// Extra wait after the page reports it is loaded, in milliseconds
    pub settle_delay_ms: u64,

    /// Minimum cleaned text length for a page to become a document
    pub min_text_length: usize,

    /// User agent to use for requests
    pub user_agent: String,

    /// Whether the render engine runs without a window
    pub headless: bool,

    /// Explicit Chrome/Chromium binary; auto-detected when unset
    pub chrome_executable: Option<PathBuf>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_depth: 3,
            max_links_per_page: 2,
            page_timeout_ms: 30_000,
            settle_delay_ms: 2_000,
            min_text_length: DEFAULT_MIN_TEXT_LENGTH,
            user_agent: format!("sitekb-crawler/{}", env!("CARGO_PKG_VERSION")),
            headless: true,
            chrome_executable: None,
        }
    }
}

/// Builder for CrawlerConfig
#[derive(Debug, Default)]
pub struct CrawlerConfigBuilder {
    config: CrawlerConfig,
}

impl CrawlerConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: CrawlerConfig::default(),
        }
    }

    /// Set the maximum depth to crawl
    pub fn max_depth(mut self, max_depth: u32) -> Self {
        self.config.max_depth = max_depth;
        self
    }

    /// Set the number of links followed per page
    pub fn max_links_per_page(mut self, max_links_per_page: usize) -> Self {
        self.config.max_links_per_page = max_links_per_page;
        self
    }

    /// Set the per-page load budget in milliseconds
    pub fn page_timeout_ms(mut self, page_timeout_ms: u64) -> Self {
        self.config.page_timeout_ms = page_timeout_ms;
        self
    }

    /// Set the settle delay in milliseconds
    pub fn settle_delay_ms(mut self, settle_delay_ms: u64) -> Self {
        self.config.settle_delay_ms = settle_delay_ms;
        self
    }

    /// Set the minimum text length for a page to be kept
    pub fn min_text_length(mut self, min_text_length: usize) -> Self {
        self.config.min_text_length = min_text_length;
        self
    }

    /// Set the user agent to use for requests
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Set whether the browser runs headless
    pub fn headless(mut self, headless: bool) -> Self {
        self.config.headless = headless;
        self
    }

    /// Set the Chrome/Chromium executable
    pub fn chrome_executable(mut self, path: Option<PathBuf>) -> Self {
        self.config.chrome_executable = path;
        self
    }

    /// Build the configuration
    pub fn build(self) -> CrawlerConfig {
        self.config
    }
}

impl CrawlerConfig {
    /// Create a new builder
    pub fn builder() -> CrawlerConfigBuilder {
        CrawlerConfigBuilder::new()
    }

    /// Get the per-page budget as a Duration
    pub fn page_timeout(&self) -> Duration {
        Duration::from_millis(self.page_timeout_ms)
    }

    /// Get the settle delay as a Duration
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Traversal budget: recursion stops once this many documents exist
    pub fn document_budget(&self) -> usize {
        self.max_links_per_page.saturating_mul(2)
    }
}
