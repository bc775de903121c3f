//! Error types for the crawler module

use crate::error::Error as CrateError;
use thiserror::Error;

/// Failure to retrieve a single page
///
/// Fetch errors are page-local: the crawler logs them and moves on to the
/// next sibling instead of aborting the traversal.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The page did not finish loading in time
    #[error("Timed out after {timeout_ms}ms fetching {url}")]
    Timeout {
        /// URL being fetched
        url: String,
        /// Budget that was exceeded
        timeout_ms: u64,
    },

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status code
    #[error("HTTP status {status} for {url}")]
    Status {
        /// URL being fetched
        url: String,
        /// Status code returned by the server
        status: u16,
    },

    /// Response is not an HTML/text document
    #[error("Unsupported content type '{content_type}' for {url}")]
    UnsupportedContent {
        /// URL being fetched
        url: String,
        /// Content type returned by the server
        content_type: String,
    },

    /// Browser navigation failed
    #[error("Navigation to {url} failed: {message}")]
    Navigation {
        /// URL being fetched
        url: String,
        /// Error reported by the browser
        message: String,
    },

    /// Render engine could not be started or talked to
    #[error("Browser error: {0}")]
    Browser(String),

    /// URL parsing error
    #[error("URL parsing error: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Failure of the non-rendering fallback reader
#[derive(Debug, Error)]
pub enum ReadError {
    /// The seed page itself could not be fetched
    #[error("Fallback fetch failed: {0}")]
    Fetch(#[from] FetchError),
}

/// Failure of a whole extraction strategy
#[derive(Debug, Error)]
pub enum CrawlError {
    /// Render engine unavailable
    #[error("Render engine error: {0}")]
    Browser(#[from] FetchError),

    /// Fallback reader error
    #[error("Reader error: {0}")]
    Read(#[from] ReadError),
}

impl From<FetchError> for CrateError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Http(e) => CrateError::Http(e),
            FetchError::InvalidUrl(e) => CrateError::InvalidUrl(e.to_string()),
            _ => CrateError::Crawl(err.to_string()),
        }
    }
}

impl From<CrawlError> for CrateError {
    fn from(err: CrawlError) -> Self {
        CrateError::Crawl(err.to_string())
    }
}
