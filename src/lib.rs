//! # sitekb - Website Knowledge Base
//!
//! This crate crawls websites into a persistent, vector-indexed knowledge
//! store and manages the lifecycle of that content: ingest a site, remove
//! it again, clear everything, and inspect what is stored.
//!
//! ## Features
//!
//! - Bounded-depth, same-origin crawling of JavaScript-rendered sites through
//!   a headless browser, with a static HTTP fallback
//! - Clean-text extraction that drops low-signal pages
//! - Knowledge records on LibSQL, with source-scoped deletion implemented as
//!   paginated scans
//! - A source registry tracking which sites are loaded
//! - Async API with Tokio
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use sitekb::crawler::CrawlerConfig;
//! use sitekb::index::{DEFAULT_COLLECTION, KnowledgeStore, LibSqlStore};
//! use sitekb::registry::SourceRegistry;
//! use sitekb::service::{KnowledgeService, default_strategies};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = LibSqlStore::new_from_path("sitekb.db").await?;
//!     let config = CrawlerConfig::builder().max_depth(2).build();
//!
//!     let service = KnowledgeService::new(
//!         KnowledgeStore::new(store, DEFAULT_COLLECTION),
//!         Arc::new(SourceRegistry::new()),
//!         default_strategies(&config, true)?,
//!     );
//!     service.reconcile_sources().await?;
//!
//!     let report = service.ingest_from_url("https://example.com").await?;
//!     println!("{} documents via {}", report.document_count, report.method);
//!     Ok(())
//! }
//! ```

mod error;

pub mod crawler;
pub mod index;
pub mod registry;
pub mod service;

pub use error::{Error, Result};

/// Re-export of commonly used types
pub mod prelude {
    pub use crate::crawler::{CrawlerConfig, Document, ExtractionMethod};
    pub use crate::error::Error;
    pub use crate::error::Result;
    pub use crate::index::{KnowledgeStore, LibSqlStore, MemoryStore, VectorStore};
    pub use crate::registry::SourceRegistry;
    pub use crate::service::{IngestReport, KnowledgeService, RemoveReport};
}
