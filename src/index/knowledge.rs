//! # Knowledge Store Adapter
//!
//! Maps crawled documents onto store records and implements the
//! source-scoped operations the store itself has no index for.
//!
//! Deletion by source URL and full clears are paginated scans over the whole
//! collection followed by a targeted delete. Every scan:
//!
//! - follows the store's continuation cursor until it comes back empty
//! - fails with `StoreError::CursorStalled` if a cursor is handed out twice
//! - visits each record id at most once, even if pages overlap

use std::collections::HashSet;
use std::ops::ControlFlow;

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use crate::crawler::Document;
use crate::index::error::StoreError;
use crate::index::{KnowledgeRecord, NewRecord, RecordId, ScrollCursor, VectorStore};

/// Page size used for full-collection scans
pub const SCAN_PAGE_SIZE: usize = 100;

/// Collection used when none is configured
pub const DEFAULT_COLLECTION: &str = "website-content";

/// Result of storing a batch of documents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestOutcome {
    /// Records the store accepted
    pub stored: usize,

    /// Records the store rejected
    pub rejected: usize,
}

/// A window of records plus the collection size
#[derive(Debug, Clone, Default, Serialize)]
pub struct RecordPage {
    /// Number of records in the collection
    pub total: usize,

    /// Records in the requested window
    pub records: Vec<KnowledgeRecord>,
}

/// Adapter between documents and a `VectorStore` collection
pub struct KnowledgeStore<S> {
    store: S,
    collection: String,
    page_size: usize,
}

impl<S: VectorStore> KnowledgeStore<S> {
    /// Create an adapter for `collection` on `store`
    pub fn new(store: S, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
            page_size: SCAN_PAGE_SIZE,
        }
    }

    /// Override the scan page size
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Name of the backing collection
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// The underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Store one record per document
    ///
    /// A record the store rejects is logged and counted; the rest of the
    /// batch is still written.
    #[instrument(skip(self, documents), fields(collection = %self.collection, count = documents.len()))]
    pub async fn ingest(&self, documents: &[Document]) -> Result<IngestOutcome, StoreError> {
        self.store.ensure_collection(&self.collection).await?;

        let ingested_at = Utc::now().to_rfc3339();
        let mut outcome = IngestOutcome::default();

        for document in documents {
            let record = NewRecord {
                name: document.title.clone(),
                text_content: document.body.clone(),
                source_url: document.provenance.source_url.clone(),
                metadata: json!({
                    "url": document.provenance.source_url,
                    "page_url": document.provenance.page_url,
                    "title": document.title,
                    "depth": document.provenance.crawl_depth,
                    "scraped_with": document.provenance.extraction_method,
                    "ingested_at": ingested_at,
                }),
            };

            match self.store.upsert(&self.collection, record).await {
                Ok(id) => {
                    debug!("Stored {} as record {}", document.provenance.page_url, id);
                    outcome.stored += 1;
                }
                Err(e) => {
                    warn!(
                        "Store rejected record for {}: {}",
                        document.provenance.page_url, e
                    );
                    outcome.rejected += 1;
                }
            }
        }

        info!(
            "Ingested {} record(s) into {} ({} rejected)",
            outcome.stored, self.collection, outcome.rejected
        );
        Ok(outcome)
    }

    /// Delete every record whose source is `url`, returning how many were deleted
    ///
    /// A missing collection counts as empty.
    #[instrument(skip(self), fields(collection = %self.collection))]
    pub async fn delete_by_source_url(&self, url: &str) -> Result<usize, StoreError> {
        let mut matches = Vec::new();
        let scanned = self
            .scan_existing(|record| {
                if record_matches_source(&record, url) {
                    matches.push(record.id);
                }
                ControlFlow::Continue(())
            })
            .await?;

        if scanned.is_none() {
            debug!("Collection {} does not exist; nothing to delete", self.collection);
            return Ok(0);
        }

        self.delete_ids(&matches).await?;
        info!("Deleted {} record(s) for {}", matches.len(), url);
        Ok(matches.len())
    }

    /// Delete every record in the collection with a single bulk delete
    ///
    /// A missing collection counts as empty.
    #[instrument(skip(self), fields(collection = %self.collection))]
    pub async fn clear_all(&self) -> Result<usize, StoreError> {
        let mut ids = Vec::new();
        let scanned = self
            .scan_existing(|record| {
                ids.push(record.id);
                ControlFlow::Continue(())
            })
            .await?;

        if scanned.is_none() {
            debug!("Collection {} does not exist; nothing to clear", self.collection);
            return Ok(0);
        }

        self.delete_ids(&ids).await?;
        info!("Cleared {} record(s) from {}", ids.len(), self.collection);
        Ok(ids.len())
    }

    /// Read `limit` records after skipping `offset`, in store order
    ///
    /// Fails with `CollectionNotFound` if nothing was ever ingested.
    #[instrument(skip(self), fields(collection = %self.collection))]
    pub async fn list_sample(&self, limit: usize, offset: usize) -> Result<RecordPage, StoreError> {
        let info = self
            .store
            .collection_info(&self.collection)
            .await?
            .ok_or_else(|| StoreError::CollectionNotFound(self.collection.clone()))?;

        let mut records = Vec::with_capacity(limit.min(info.record_count));
        if limit > 0 {
            let mut skipped = 0;
            self.scan(|record| {
                if skipped < offset {
                    skipped += 1;
                    return ControlFlow::Continue(());
                }
                records.push(record);
                if records.len() >= limit {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            })
            .await?;
        }

        Ok(RecordPage {
            total: info.record_count,
            records,
        })
    }

    /// Distinct source URLs in first-seen order
    ///
    /// A missing collection has no sources.
    #[instrument(skip(self), fields(collection = %self.collection))]
    pub async fn source_urls(&self) -> Result<Vec<String>, StoreError> {
        let mut seen = HashSet::new();
        let mut urls = Vec::new();
        self.scan_existing(|record| {
            let url = record_source(&record).to_string();
            if seen.insert(url.clone()) {
                urls.push(url);
            }
            ControlFlow::Continue(())
        })
        .await?;
        Ok(urls)
    }

    async fn delete_ids(&self, ids: &[RecordId]) -> Result<(), StoreError> {
        if ids.is_empty() {
            return Ok(());
        }
        self.store.delete(&self.collection, ids).await
    }

    /// Like `scan`, but a missing collection yields `None` instead of an error
    async fn scan_existing<F>(&self, visit: F) -> Result<Option<usize>, StoreError>
    where
        F: FnMut(KnowledgeRecord) -> ControlFlow<()> + Send,
    {
        match self.scan(visit).await {
            Ok(visited) => Ok(Some(visited)),
            Err(StoreError::CollectionNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Walk the collection page by page, returning how many records were visited
    async fn scan<F>(&self, mut visit: F) -> Result<usize, StoreError>
    where
        F: FnMut(KnowledgeRecord) -> ControlFlow<()> + Send,
    {
        let mut cursor: Option<ScrollCursor> = None;
        let mut seen_cursors: HashSet<ScrollCursor> = HashSet::new();
        let mut seen_ids: HashSet<RecordId> = HashSet::new();
        let mut visited = 0;

        loop {
            let page = self
                .store
                .scroll(&self.collection, self.page_size, cursor.take())
                .await?;
            debug!(
                "Scanned page of {} record(s) from {}",
                page.records.len(),
                self.collection
            );

            for record in page.records {
                if !seen_ids.insert(record.id.clone()) {
                    continue;
                }
                visited += 1;
                if visit(record).is_break() {
                    return Ok(visited);
                }
            }

            match page.next_cursor {
                None => return Ok(visited),
                Some(next) => {
                    if !seen_cursors.insert(next.clone()) {
                        return Err(StoreError::CursorStalled { cursor: next });
                    }
                    cursor = Some(next);
                }
            }
        }
    }
}

/// Source URL of a record, preferring the record field over metadata
fn record_source(record: &KnowledgeRecord) -> &str {
    if !record.source_url.is_empty() {
        return &record.source_url;
    }
    record
        .metadata
        .get("url")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
}

fn record_matches_source(record: &KnowledgeRecord, url: &str) -> bool {
    record.source_url == url
        || record.metadata.get("url").and_then(|v| v.as_str()) == Some(url)
}
