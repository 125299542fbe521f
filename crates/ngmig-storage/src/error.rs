//! Storage error types for ngmig-storage.
//!
//! [`StorageError`] covers the failure modes of the mapping and task record
//! stores: backend failures, serialization, uniqueness violations, and
//! missing records.

use thiserror::Error;

/// Errors produced by storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The SQLite backend reported an error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Applying schema migrations failed.
    #[error("schema migration failed: {0}")]
    Migration(String),

    /// A record with the same identity already exists.
    #[error("duplicate record: {what}")]
    Duplicate { what: String },

    /// A mapping with the given ID was not found.
    #[error("mapping not found: {0}")]
    MappingNotFound(i64),

    /// A task record with the given ID was not found.
    #[error("task not found: {0}")]
    TaskNotFound(String),

    /// A stored row could not be decoded.
    #[error("corrupt record: {reason}")]
    Corrupt { reason: String },
}

impl StorageError {
    /// Maps SQLite constraint violations to [`StorageError::Duplicate`].
    pub(crate) fn from_insert(err: rusqlite::Error, what: impl Into<String>) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _)
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                StorageError::Duplicate { what: what.into() }
            }
            _ => StorageError::Sqlite(err),
        }
    }
}
