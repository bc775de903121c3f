//! # Store Error Types Module
//!
//! Error types for the knowledge store: backend failures, data problems and
//! the two pagination/lifecycle conditions the adapter has to reason about
//! (`CollectionNotFound` and `CursorStalled`).

use crate::error::Error as CrateError;
use thiserror::Error;

/// Error type for store operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// LibSQL error
    #[error("LibSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// SQL query error
    #[error("SQL query error: {0}")]
    Query(String),

    /// Schema error
    #[error("Schema error: {0}")]
    Schema(String),

    /// Data error
    #[error("Data error: {0}")]
    Data(String),

    /// Connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Metadata (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The collection has never been created
    #[error("Collection '{0}' does not exist")]
    CollectionNotFound(String),

    /// The store handed back a cursor it had already returned
    #[error("Scroll cursor '{cursor}' did not advance")]
    CursorStalled {
        /// The repeated cursor
        cursor: String,
    },
}

impl From<StoreError> for CrateError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::CollectionNotFound(name) => CrateError::StoreUnavailable(format!(
                "collection '{}' has not been created; ingest a URL first",
                name
            )),
            _ => CrateError::Store(err.to_string()),
        }
    }
}
