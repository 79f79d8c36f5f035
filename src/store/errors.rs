//! Record store errors

use thiserror::Error;

use crate::model::RecordId;

/// Result type for record store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Record store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Failed to insert {table} row {id}: {source}")]
    Insert {
        table: &'static str,
        id: RecordId,
        #[source]
        source: rusqlite::Error,
    },

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: RecordId },

    #[error("JSON column error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Record store lock poisoned")]
    Poisoned,
}

impl StoreError {
    /// Returns true if the error reports a missing record
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}
