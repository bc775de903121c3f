//! # Source Registry
//!
//! The set of seed URLs currently represented in the knowledge store, kept in
//! insertion order. The knowledge-loaded health flag is derived from it.
//!
//! A registry is constructed once and shared by reference (`Arc`) with
//! whatever serves requests; tests get a fresh instance each.

use std::sync::{PoisonError, RwLock};

use tracing::debug;

use crate::error::{Error, Result};

/// Ordered set of ingested source URLs
#[derive(Debug, Default)]
pub struct SourceRegistry {
    urls: RwLock<Vec<String>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a source; returns `false` if it was already present
    pub fn add(&self, url: &str) -> bool {
        let mut urls = self.urls.write().unwrap_or_else(PoisonError::into_inner);
        if urls.iter().any(|u| u == url) {
            return false;
        }
        urls.push(url.to_string());
        debug!("Registered source {}", url);
        true
    }

    /// Forget a source, failing with `NotFound` if it is not registered
    pub fn remove(&self, url: &str) -> Result<()> {
        let mut urls = self.urls.write().unwrap_or_else(PoisonError::into_inner);
        match urls.iter().position(|u| u == url) {
            Some(index) => {
                urls.remove(index);
                debug!("Unregistered source {}", url);
                Ok(())
            }
            None => Err(Error::NotFound(format!("URL not found in sources: {}", url))),
        }
    }

    /// Registered sources in insertion order
    pub fn list(&self) -> Vec<String> {
        self.urls
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.urls
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|u| u == url)
    }

    /// Forget every source
    pub fn clear(&self) {
        self.urls
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Replace the contents, dropping duplicates but keeping first-seen order
    pub fn replace_all<I>(&self, sources: I)
    where
        I: IntoIterator<Item = String>,
    {
        let mut fresh: Vec<String> = Vec::new();
        for url in sources {
            if !fresh.contains(&url) {
                fresh.push(url);
            }
        }
        *self.urls.write().unwrap_or_else(PoisonError::into_inner) = fresh;
    }

    /// Whether any knowledge is loaded
    pub fn is_loaded(&self) -> bool {
        !self
            .urls
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    pub fn len(&self) -> usize {
        self.urls.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        !self.is_loaded()
    }
}
