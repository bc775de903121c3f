//! LibSQL-backed record store

use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use libsql::{Connection, Row, params};
use tracing::{debug, instrument};

use crate::index::error::StoreError;
use crate::index::schema;
use crate::index::{CollectionInfo, KnowledgeRecord, NewRecord, RecordId, ScrollCursor, ScrollPage, VectorStore};

/// Maximum number of ids bound into a single DELETE statement
const DELETE_BATCH: usize = 500;

/// Record store on a LibSQL database
#[derive(Clone)]
pub struct LibSqlStore {
    conn: Connection,
}

impl LibSqlStore {
    /// Create a store on an open connection
    #[instrument(skip(conn))]
    pub async fn new(conn: Connection) -> Result<Self, StoreError> {
        schema::initialize_schema(&conn).await?;
        Ok(Self { conn })
    }

    /// Create a store from a database file path
    pub async fn new_from_path(path: &str) -> Result<Self, StoreError> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Connection(format!("Failed to open database: {}", e)))?;

        let conn = db
            .connect()
            .map_err(|e| StoreError::Connection(format!("Failed to connect to database: {}", e)))?;

        Self::new(conn).await
    }

    /// Create a throwaway in-memory store
    pub async fn new_in_memory() -> Result<Self, StoreError> {
        Self::new_from_path(":memory:").await
    }

    async fn collection_exists(&self, collection: &str) -> Result<bool, StoreError> {
        let mut rows = self
            .conn
            .query(
                "SELECT 1 FROM collections WHERE name = ?",
                params![collection.to_string()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to look up collection: {}", e)))?;

        match rows.next().await {
            Ok(row) => Ok(row.is_some()),
            Err(e) => Err(StoreError::Data(format!("Failed to read collection: {}", e))),
        }
    }

    async fn require_collection(&self, collection: &str) -> Result<(), StoreError> {
        if self.collection_exists(collection).await? {
            Ok(())
        } else {
            Err(StoreError::CollectionNotFound(collection.to_string()))
        }
    }

    /// Convert a database row to a KnowledgeRecord
    fn row_to_record(&self, row: &Row) -> Result<KnowledgeRecord, StoreError> {
        let id: i64 = row
            .get(0)
            .map_err(|e| StoreError::Data(format!("Failed to get id: {}", e)))?;
        let metadata: String = row
            .get(4)
            .map_err(|e| StoreError::Data(format!("Failed to get metadata: {}", e)))?;

        Ok(KnowledgeRecord {
            id: id.to_string(),
            name: row
                .get(1)
                .map_err(|e| StoreError::Data(format!("Failed to get name: {}", e)))?,
            text_content: row
                .get(2)
                .map_err(|e| StoreError::Data(format!("Failed to get text_content: {}", e)))?,
            source_url: row
                .get(3)
                .map_err(|e| StoreError::Data(format!("Failed to get source_url: {}", e)))?,
            metadata: serde_json::from_str(&metadata)?,
        })
    }
}

#[async_trait]
impl VectorStore for LibSqlStore {
    async fn ensure_collection(&self, collection: &str) -> Result<(), StoreError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default();

        self.conn
            .execute(
                "INSERT OR IGNORE INTO collections (name, created_at) VALUES (?, ?)",
                params![collection.to_string(), now],
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to create collection: {}", e)))?;
        Ok(())
    }

    async fn collection_info(
        &self,
        collection: &str,
    ) -> Result<Option<CollectionInfo>, StoreError> {
        if !self.collection_exists(collection).await? {
            return Ok(None);
        }

        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*) FROM records WHERE collection = ?",
                params![collection.to_string()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to count records: {}", e)))?;

        let count: i64 = match rows.next().await {
            Ok(Some(row)) => row
                .get(0)
                .map_err(|e| StoreError::Data(format!("Failed to get count: {}", e)))?,
            Ok(None) => 0,
            Err(e) => return Err(StoreError::Data(format!("Failed to get count: {}", e))),
        };

        Ok(Some(CollectionInfo {
            record_count: count as usize,
        }))
    }

    #[instrument(skip(self, record), fields(source_url = %record.source_url))]
    async fn upsert(&self, collection: &str, record: NewRecord) -> Result<RecordId, StoreError> {
        self.require_collection(collection).await?;
        let metadata = serde_json::to_string(&record.metadata)?;

        self.conn
            .execute(
                "INSERT INTO records (collection, name, text_content, source_url, metadata)
                 VALUES (?, ?, ?, ?, ?)",
                params![
                    collection.to_string(),
                    record.name,
                    record.text_content,
                    record.source_url,
                    metadata,
                ],
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to add record: {}", e)))?;

        let mut rows = self
            .conn
            .query("SELECT last_insert_rowid()", params![])
            .await
            .map_err(|e| StoreError::Query(format!("Failed to get last insert ID: {}", e)))?;

        let row = match rows.next().await {
            Ok(Some(row)) => row,
            Ok(None) => {
                return Err(StoreError::Data(
                    "No ID returned from last_insert_rowid()".to_string(),
                ));
            }
            Err(e) => return Err(StoreError::Data(format!("Failed to get ID: {}", e))),
        };

        let id: i64 = row
            .get(0)
            .map_err(|e| StoreError::Data(format!("Failed to get ID: {}", e)))?;
        Ok(id.to_string())
    }

    async fn scroll(
        &self,
        collection: &str,
        limit: usize,
        cursor: Option<ScrollCursor>,
    ) -> Result<ScrollPage, StoreError> {
        self.require_collection(collection).await?;

        let start: i64 = match cursor {
            Some(cursor) => cursor
                .parse()
                .map_err(|_| StoreError::Data(format!("Invalid scroll cursor: {}", cursor)))?,
            None => 0,
        };
        let limit = limit.max(1);

        // one extra row tells us where the next page starts
        let mut rows = self
            .conn
            .query(
                "SELECT id, name, text_content, source_url, metadata
                 FROM records
                 WHERE collection = ? AND id >= ?
                 ORDER BY id
                 LIMIT ?",
                params![collection.to_string(), start, (limit + 1) as i64],
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to scroll records: {}", e)))?;

        let mut records = Vec::with_capacity(limit + 1);
        loop {
            match rows.next().await {
                Ok(Some(row)) => records.push(self.row_to_record(&row)?),
                Ok(None) => break,
                Err(e) => return Err(StoreError::Data(format!("Failed to read record: {}", e))),
            }
        }

        let next_cursor = if records.len() > limit {
            records.pop().map(|r| r.id)
        } else {
            None
        };

        debug!(
            "Scrolled {} record(s) from {} (next: {:?})",
            records.len(),
            collection,
            next_cursor
        );
        Ok(ScrollPage {
            records,
            next_cursor,
        })
    }

    #[instrument(skip(self, ids), fields(count = ids.len()))]
    async fn delete(&self, collection: &str, ids: &[RecordId]) -> Result<(), StoreError> {
        self.require_collection(collection).await?;

        // ids this store never issued cannot match anything
        let numeric: Vec<i64> = ids.iter().filter_map(|id| id.parse().ok()).collect();

        for batch in numeric.chunks(DELETE_BATCH) {
            let placeholders = vec!["?"; batch.len()].join(", ");
            let sql = format!(
                "DELETE FROM records WHERE collection = ? AND id IN ({})",
                placeholders
            );

            let mut params: Vec<libsql::Value> = Vec::with_capacity(batch.len() + 1);
            params.push(collection.to_string().into());
            params.extend(batch.iter().map(|id| libsql::Value::from(*id)));

            self.conn
                .execute(&sql, params)
                .await
                .map_err(|e| StoreError::Query(format!("Failed to delete records: {}", e)))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    async fn setup_test_db() -> Result<(LibSqlStore, tempfile::TempDir), StoreError> {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();

        let store = LibSqlStore::new_from_path(&db_path).await?;
        Ok((store, temp_dir))
    }

    fn new_record(source_url: &str, n: usize) -> NewRecord {
        NewRecord {
            name: format!("Page {}", n),
            text_content: format!("Content of page {}", n),
            source_url: source_url.to_string(),
            metadata: json!({"url": source_url, "depth": 0}),
        }
    }

    #[tokio::test]
    async fn test_database_initialization() {
        let (store, _temp_dir) = setup_test_db().await.unwrap();

        let mut result = store
            .conn
            .query(
                "SELECT name FROM sqlite_master WHERE type='table' AND name IN ('collections', 'records')",
                params![],
            )
            .await
            .unwrap();

        let mut tables = Vec::new();
        while let Ok(Some(row)) = result.next().await {
            let table_name: String = row.get(0).unwrap();
            tables.push(table_name);
        }

        assert_eq!(tables.len(), 2);
        assert!(tables.contains(&"collections".to_string()));
        assert!(tables.contains(&"records".to_string()));
    }

    #[tokio::test]
    async fn test_missing_collection() {
        let (store, _temp_dir) = setup_test_db().await.unwrap();

        assert!(store.collection_info("docs").await.unwrap().is_none());
        assert!(matches!(
            store.scroll("docs", 10, None).await,
            Err(StoreError::CollectionNotFound(_))
        ));
        assert!(matches!(
            store.upsert("docs", new_record("https://example.com", 0)).await,
            Err(StoreError::CollectionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_upsert_and_scroll_pages() {
        let (store, _temp_dir) = setup_test_db().await.unwrap();
        store.ensure_collection("docs").await.unwrap();
        store.ensure_collection("docs").await.unwrap();

        let mut ids = Vec::new();
        for n in 0..5 {
            ids.push(store.upsert("docs", new_record("https://example.com", n)).await.unwrap());
        }
        assert_eq!(
            store.collection_info("docs").await.unwrap(),
            Some(CollectionInfo { record_count: 5 })
        );

        let first = store.scroll("docs", 2, None).await.unwrap();
        assert_eq!(first.records.len(), 2);
        assert_eq!(first.records[0].name, "Page 0");
        assert_eq!(first.records[0].metadata["url"], "https://example.com");
        assert_eq!(first.next_cursor.as_deref(), Some(ids[2].as_str()));

        let second = store.scroll("docs", 2, first.next_cursor).await.unwrap();
        assert_eq!(second.records[0].id, ids[2]);

        let third = store.scroll("docs", 2, second.next_cursor).await.unwrap();
        assert_eq!(third.records.len(), 1);
        assert!(third.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_exact_page_boundary_has_no_trailing_cursor() {
        let (store, _temp_dir) = setup_test_db().await.unwrap();
        store.ensure_collection("docs").await.unwrap();
        for n in 0..4 {
            store.upsert("docs", new_record("https://example.com", n)).await.unwrap();
        }

        let first = store.scroll("docs", 2, None).await.unwrap();
        let second = store.scroll("docs", 2, first.next_cursor).await.unwrap();
        assert_eq!(second.records.len(), 2);
        assert!(second.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (store, _temp_dir) = setup_test_db().await.unwrap();
        store.ensure_collection("docs").await.unwrap();
        let keep = store.upsert("docs", new_record("https://a.com", 0)).await.unwrap();
        let gone = store.upsert("docs", new_record("https://b.com", 1)).await.unwrap();

        store.delete("docs", &[gone.clone()]).await.unwrap();
        store
            .delete("docs", &[gone, "999".to_string(), "not-an-id".to_string()])
            .await
            .unwrap();

        let page = store.scroll("docs", 10, None).await.unwrap();
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.records[0].id, keep);
    }

    #[tokio::test]
    async fn test_collections_are_isolated() {
        let (store, _temp_dir) = setup_test_db().await.unwrap();
        store.ensure_collection("a").await.unwrap();
        store.ensure_collection("b").await.unwrap();
        let id = store.upsert("a", new_record("https://a.com", 0)).await.unwrap();

        store.delete("b", &[id]).await.unwrap();
        assert_eq!(store.collection_info("a").await.unwrap().unwrap().record_count, 1);
        assert_eq!(store.collection_info("b").await.unwrap().unwrap().record_count, 0);
    }

    #[tokio::test]
    async fn test_in_memory_store() {
        let store = LibSqlStore::new_in_memory().await.unwrap();
        store.ensure_collection("docs").await.unwrap();
        store.upsert("docs", new_record("https://example.com", 0)).await.unwrap();
        assert_eq!(store.collection_info("docs").await.unwrap().unwrap().record_count, 1);
    }
}
