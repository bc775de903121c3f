//! # Website Crawler Module
//!
//! This module turns a seed URL into a set of clean-text documents ready for
//! the knowledge store. It is the first stage of ingestion.
//!
//! ## Key Components
//!
//! - `PageFetcher`: retrieves the HTML of one page within a time budget
//! - `RenderEngine` / `ChromeEngine`: scoped headless-browser sessions for
//!   JavaScript-rendered sites
//! - `extract`: strips non-content markup, collapses whitespace, filters
//!   low-signal pages and collects same-origin links
//! - `Crawler`: bounded-depth, same-origin, depth-first traversal
//! - `FallbackReader`: static HTTP fetch-and-extract for when rendering fails
//! - `ExtractionStrategy` / `run_strategies`: render first, fall back second
//!
//! ## Failure model
//!
//! A page that cannot be fetched or has too little text is skipped; the crawl
//! continues with its siblings. Only a strategy that produces zero documents
//! hands control to the next one.

mod browser;
mod config;
mod content_extraction;
mod error;
mod fallback;
mod fetcher;
pub(crate) mod strategy;
pub(crate) mod traversal;

// Re-export important types and functions
pub use browser::{ChromeEngine, ChromeSession, RenderEngine, RenderSession};
pub use config::{CrawlerConfig, CrawlerConfigBuilder, DEFAULT_MIN_TEXT_LENGTH};
pub use content_extraction::{ExtractedPage, PageExtraction, extract, same_origin};
pub use error::{CrawlError, FetchError, ReadError};
pub use fallback::FallbackReader;
pub use fetcher::{HttpFetcher, PageFetcher};
pub use strategy::{ExtractionStrategy, FallbackStrategy, RenderedStrategy, run_strategies};
pub use traversal::Crawler;

use std::fmt;

use serde::{Deserialize, Serialize};

/// How a document's text was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMethod {
    /// Fully rendered in a browser
    Rendered,

    /// Static HTTP response, no scripts executed
    Fallback,
}

impl ExtractionMethod {
    /// Stable lowercase name stored in record metadata
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::Rendered => "rendered",
            ExtractionMethod::Fallback => "fallback",
        }
    }
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a document came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    /// Seed URL the crawl started from
    pub source_url: String,

    /// URL of the page the text was extracted from
    pub page_url: String,

    /// Link distance from the seed
    pub crawl_depth: u32,

    /// Extraction path that produced the document
    pub extraction_method: ExtractionMethod,
}

/// A crawled page that passed the minimum-signal filter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Identity derived from the page URL and its position in the crawl
    pub id: String,

    /// Page title, or the page URL when the page has none
    pub title: String,

    /// Cleaned text content
    pub body: String,

    /// Provenance of the document
    pub provenance: Provenance,
}

impl Document {
    /// Build the identity of the document at `position` in a crawl of `page_url`
    pub fn derive_id(page_url: &str, position: usize) -> String {
        format!("{}#{}", page_url, position)
    }
}
