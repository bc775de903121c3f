//! # Database Schema Module
//!
//! Creates the LibSQL tables backing `LibSqlStore`.
//!
//! ## Schema Design
//!
//! 1. `collections` - one row per named collection; its presence is what
//!    "the collection exists" means
//! 2. `records` - one row per stored record, keyed by an autoincrement id that
//!    doubles as the scroll cursor
//!
//! Records are only indexed by `(collection, id)`. Lookups by source URL are
//! the adapter's job and go through a full scan.

use crate::index::error::StoreError;
use libsql::{Connection, params};

/// Initialize the database schema
pub async fn initialize_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute("PRAGMA foreign_keys = ON", params![])
        .await
        .map_err(|e| StoreError::Schema(format!("Failed to enable foreign keys: {}", e)))?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS collections (
            name TEXT PRIMARY KEY,
            created_at INTEGER NOT NULL
        )",
        params![],
    )
    .await
    .map_err(|e| StoreError::Schema(format!("Failed to create collections table: {}", e)))?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            collection TEXT NOT NULL,
            name TEXT NOT NULL,
            text_content TEXT NOT NULL,
            source_url TEXT NOT NULL,
            metadata TEXT NOT NULL,
            FOREIGN KEY (collection) REFERENCES collections(name) ON DELETE CASCADE
        )",
        params![],
    )
    .await
    .map_err(|e| StoreError::Schema(format!("Failed to create records table: {}", e)))?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_records_collection_id ON records(collection, id)",
        params![],
    )
    .await
    .map_err(|e| StoreError::Schema(format!("Failed to create index on records: {}", e)))?;

    Ok(())
}
