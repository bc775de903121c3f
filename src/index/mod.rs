//! # Knowledge Index Module
//!
//! This module owns everything that touches the persistent, vector-indexed
//! knowledge collection.
//!
//! ## Key Components
//!
//! - `VectorStore`: the store service contract (collections, upsert,
//!   cursor-paginated scroll, delete by id)
//! - `LibSqlStore`: persistent implementation on LibSQL
//! - `MemoryStore`: in-process implementation with identical semantics
//! - `KnowledgeStore`: the adapter that maps documents to records and
//!   implements source-scoped deletion and full clears as paginated scans
//!
//! The store exclusively owns record identity; callers only ever see the ids
//! it hands back.

mod database;
pub mod error;
mod knowledge;
mod memory;
mod schema;

pub use database::LibSqlStore;
pub use error::StoreError;
pub use knowledge::{DEFAULT_COLLECTION, IngestOutcome, KnowledgeStore, RecordPage, SCAN_PAGE_SIZE};
pub use memory::MemoryStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Store-assigned record identifier
pub type RecordId = String;

/// Opaque continuation token pointing at the first record of the next page
pub type ScrollCursor = String;

/// A persisted record as returned by the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeRecord {
    /// Identifier assigned by the store
    pub id: RecordId,

    /// Display name, usually the page title
    pub name: String,

    /// Indexed text
    pub text_content: String,

    /// Seed URL the record was ingested from
    pub source_url: String,

    /// Free-form metadata (page URL, depth, extraction method, ...)
    pub metadata: serde_json::Value,
}

/// A record about to be written; the store assigns its id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRecord {
    /// Display name, usually the page title
    pub name: String,

    /// Indexed text
    pub text_content: String,

    /// Seed URL the record was ingested from
    pub source_url: String,

    /// Free-form metadata
    pub metadata: serde_json::Value,
}

impl NewRecord {
    /// Attach the store-assigned id
    pub fn into_record(self, id: RecordId) -> KnowledgeRecord {
        KnowledgeRecord {
            id,
            name: self.name,
            text_content: self.text_content,
            source_url: self.source_url,
            metadata: self.metadata,
        }
    }
}

/// Summary information about a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionInfo {
    /// Number of records currently stored
    pub record_count: usize,
}

/// One page of a paginated scan
#[derive(Debug, Clone, Default)]
pub struct ScrollPage {
    /// Records on this page, in store order
    pub records: Vec<KnowledgeRecord>,

    /// Cursor for the next page; `None` once the scan is exhausted
    pub next_cursor: Option<ScrollCursor>,
}

/// Persistent record store with cursor-paginated scans
///
/// Scrolling or deleting in a collection that does not exist fails with
/// `StoreError::CollectionNotFound`. Deleting ids that are not present is a
/// no-op.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the collection if it does not exist yet
    async fn ensure_collection(&self, collection: &str) -> Result<(), StoreError>;

    /// Collection summary, or `None` if the collection was never created
    async fn collection_info(&self, collection: &str)
    -> Result<Option<CollectionInfo>, StoreError>;

    /// Store a record and return its new id
    async fn upsert(&self, collection: &str, record: NewRecord) -> Result<RecordId, StoreError>;

    /// Read up to `limit` records starting at `cursor` (the beginning when `None`)
    async fn scroll(
        &self,
        collection: &str,
        limit: usize,
        cursor: Option<ScrollCursor>,
    ) -> Result<ScrollPage, StoreError>;

    /// Delete the given ids
    async fn delete(&self, collection: &str, ids: &[RecordId]) -> Result<(), StoreError>;
}

#[async_trait]
impl<T: VectorStore + ?Sized> VectorStore for std::sync::Arc<T> {
    async fn ensure_collection(&self, collection: &str) -> Result<(), StoreError> {
        (**self).ensure_collection(collection).await
    }

    async fn collection_info(
        &self,
        collection: &str,
    ) -> Result<Option<CollectionInfo>, StoreError> {
        (**self).collection_info(collection).await
    }

    async fn upsert(&self, collection: &str, record: NewRecord) -> Result<RecordId, StoreError> {
        (**self).upsert(collection, record).await
    }

    async fn scroll(
        &self,
        collection: &str,
        limit: usize,
        cursor: Option<ScrollCursor>,
    ) -> Result<ScrollPage, StoreError> {
        (**self).scroll(collection, limit, cursor).await
    }

    async fn delete(&self, collection: &str, ids: &[RecordId]) -> Result<(), StoreError> {
        (**self).delete(collection, ids).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_record_into_record() {
        let record = NewRecord {
            name: "Example".to_string(),
            text_content: "Body".to_string(),
            source_url: "https://example.com".to_string(),
            metadata: json!({"depth": 0}),
        }
        .into_record("7".to_string());

        assert_eq!(record.id, "7");
        assert_eq!(record.name, "Example");
        assert_eq!(record.source_url, "https://example.com");
        assert_eq!(record.metadata["depth"], 0);
    }

    #[test]
    fn test_record_serializes_flat() {
        let record = KnowledgeRecord {
            id: "1".to_string(),
            name: "Page".to_string(),
            text_content: "Text".to_string(),
            source_url: "https://example.com".to_string(),
            metadata: json!({}),
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["text_content"], "Text");
        assert_eq!(value["source_url"], "https://example.com");
    }
}
