//! The [`MappingStore`] and [`TaskStore`] storage contracts.
//!
//! Both traits are plain CRUD plus one filter query. Backends
//! ([`InMemoryStore`](crate::InMemoryStore), [`SqliteStore`](crate::SqliteStore))
//! are fully swappable without changing engine or server logic.
//!
//! The traits are synchronous. Callers that share a store across threads
//! wrap it in a mutex; `rusqlite::Connection` is `Send` but not `Sync`.

use ngmig_core::{AsyncTaskRecord, MigratedEntityMapping};

use crate::error::StorageError;
use crate::types::MappingFilter;

/// Persistence for source -> destination identity mappings.
pub trait MappingStore: Send {
    /// Inserts a mapping and returns its storage id.
    ///
    /// Fails with [`StorageError::Duplicate`] when an equivalent mapping
    /// (same account, app, source entity, scope and fully-qualified
    /// identifier) already exists.
    fn insert_mapping(&mut self, mapping: &MigratedEntityMapping) -> Result<i64, StorageError>;

    /// Retrieves a mapping by storage id.
    fn get_mapping(&self, id: i64) -> Result<MigratedEntityMapping, StorageError>;

    /// Deletes a mapping by storage id.
    fn delete_mapping(&mut self, id: i64) -> Result<(), StorageError>;

    /// Returns all mappings matching `filter`, oldest first.
    fn find_mappings(
        &self,
        filter: &MappingFilter,
    ) -> Result<Vec<MigratedEntityMapping>, StorageError>;
}

/// Persistence for async task records.
pub trait TaskStore: Send {
    /// Inserts a new record. Fails with [`StorageError::Duplicate`] if the id exists.
    fn insert_task(&mut self, record: &AsyncTaskRecord) -> Result<(), StorageError>;

    /// Retrieves a record by task id.
    fn get_task(&self, id: &str) -> Result<AsyncTaskRecord, StorageError>;

    /// Overwrites an existing record.
    fn update_task(&mut self, record: &AsyncTaskRecord) -> Result<(), StorageError>;

    /// Deletes a record.
    fn delete_task(&mut self, id: &str) -> Result<(), StorageError>;

    /// Lists an account's records, oldest first.
    fn list_tasks(&self, account_id: &str) -> Result<Vec<AsyncTaskRecord>, StorageError>;
}
