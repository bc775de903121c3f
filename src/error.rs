//! Error types for the sitekb crate

use thiserror::Error;

/// Result type for sitekb operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for sitekb operations
#[derive(Debug, Error)]
pub enum Error {
    /// The caller supplied an empty or malformed URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Neither the rendered crawl nor the fallback reader produced a document
    #[error(
        "No content could be extracted from {url}. The site may require authentication or block automated access."
    )]
    NoContentExtracted {
        /// Seed URL that yielded nothing
        url: String,
    },

    /// The knowledge collection has not been created yet
    #[error("Knowledge store unavailable: {0}")]
    StoreUnavailable(String),

    /// A source URL is not present in the registry
    #[error("Not found: {0}")]
    NotFound(String),

    /// Knowledge store failure (network, query, data)
    #[error("Store error: {0}")]
    Store(String),

    /// Crawling error
    #[error("Crawl error: {0}")]
    Crawl(String),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("{0}")]
    Other(String),
}
