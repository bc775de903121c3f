//! In-process record store

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::index::error::StoreError;
use crate::index::{CollectionInfo, KnowledgeRecord, NewRecord, RecordId, ScrollCursor, ScrollPage, VectorStore};

#[derive(Default)]
struct Inner {
    next_id: u64,
    collections: HashMap<String, BTreeMap<u64, KnowledgeRecord>>,
}

/// Record store held entirely in memory
///
/// Ids are issued from a single counter shared by all collections, so they
/// are unique and increasing like the LibSQL rowids.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn parse_id(id: &str) -> Option<u64> {
    id.parse().ok()
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn ensure_collection(&self, collection: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner.collections.entry(collection.to_string()).or_default();
        Ok(())
    }

    async fn collection_info(
        &self,
        collection: &str,
    ) -> Result<Option<CollectionInfo>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.collections.get(collection).map(|records| CollectionInfo {
            record_count: records.len(),
        }))
    }

    async fn upsert(&self, collection: &str, record: NewRecord) -> Result<RecordId, StoreError> {
        let mut inner = self.inner.lock().await;
        if !inner.collections.contains_key(collection) {
            return Err(StoreError::CollectionNotFound(collection.to_string()));
        }

        inner.next_id += 1;
        let id = inner.next_id;
        let record = record.into_record(id.to_string());
        if let Some(records) = inner.collections.get_mut(collection) {
            records.insert(id, record);
        }
        Ok(id.to_string())
    }

    async fn scroll(
        &self,
        collection: &str,
        limit: usize,
        cursor: Option<ScrollCursor>,
    ) -> Result<ScrollPage, StoreError> {
        let inner = self.inner.lock().await;
        let records = inner
            .collections
            .get(collection)
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))?;

        let start = match cursor {
            Some(cursor) => parse_id(&cursor)
                .ok_or_else(|| StoreError::Data(format!("Invalid scroll cursor: {}", cursor)))?,
            None => 0,
        };
        let limit = limit.max(1);

        let mut page: Vec<KnowledgeRecord> = records
            .range(start..)
            .take(limit + 1)
            .map(|(_, record)| record.clone())
            .collect();

        let next_cursor = if page.len() > limit {
            page.pop().map(|r| r.id)
        } else {
            None
        };

        Ok(ScrollPage {
            records: page,
            next_cursor,
        })
    }

    async fn delete(&self, collection: &str, ids: &[RecordId]) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let records = inner
            .collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))?;

        for id in ids.iter().filter_map(|id| parse_id(id)) {
            records.remove(&id);
        }
        Ok(())
    }
}
