//! In-memory implementation of [`MappingStore`] and [`TaskStore`].
//!
//! [`InMemoryStore`] is a first-class backend for tests, dry runs, and
//! anywhere persistence isn't needed. It enforces the same mapping
//! uniqueness rule as the SQLite backend's unique index.

use std::collections::{BTreeMap, HashMap};

use ngmig_core::{AsyncTaskRecord, MigratedEntityMapping};

use crate::error::StorageError;
use crate::traits::{MappingStore, TaskStore};
use crate::types::MappingFilter;

/// In-memory store. All data lives in maps.
#[derive(Debug)]
pub struct InMemoryStore {
    mappings: BTreeMap<i64, MigratedEntityMapping>,
    next_mapping_id: i64,
    tasks: HashMap<String, AsyncTaskRecord>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        InMemoryStore {
            mappings: BTreeMap::new(),
            next_mapping_id: 1,
            tasks: HashMap::new(),
        }
    }

    /// Number of stored mappings.
    pub fn mapping_count(&self) -> usize {
        self.mappings.len()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Same key as the SQLite `idx_mappings_identity` index.
fn same_identity(a: &MigratedEntityMapping, b: &MigratedEntityMapping) -> bool {
    a.account_id == b.account_id
        && a.app_id == b.app_id
        && a.cg_entity_id == b.cg_entity_id
        && a.entity_type == b.entity_type
        && a.scope == b.scope
        && a.fully_qualified_identifier == b.fully_qualified_identifier
}

impl MappingStore for InMemoryStore {
    fn insert_mapping(&mut self, mapping: &MigratedEntityMapping) -> Result<i64, StorageError> {
        if self.mappings.values().any(|m| same_identity(m, mapping)) {
            return Err(StorageError::Duplicate {
                what: format!(
                    "mapping {}:{} -> {}",
                    mapping.entity_type, mapping.cg_entity_id, mapping.fully_qualified_identifier
                ),
            });
        }
        let id = self.next_mapping_id;
        self.next_mapping_id += 1;
        let mut stored = mapping.clone();
        stored.id = Some(id);
        self.mappings.insert(id, stored);
        Ok(id)
    }

    fn get_mapping(&self, id: i64) -> Result<MigratedEntityMapping, StorageError> {
        self.mappings
            .get(&id)
            .cloned()
            .ok_or(StorageError::MappingNotFound(id))
    }

    fn delete_mapping(&mut self, id: i64) -> Result<(), StorageError> {
        self.mappings
            .remove(&id)
            .map(|_| ())
            .ok_or(StorageError::MappingNotFound(id))
    }

    fn find_mappings(
        &self,
        filter: &MappingFilter,
    ) -> Result<Vec<MigratedEntityMapping>, StorageError> {
        Ok(self
            .mappings
            .values()
            .filter(|m| filter.matches(m))
            .cloned()
            .collect())
    }
}

impl TaskStore for InMemoryStore {
    fn insert_task(&mut self, record: &AsyncTaskRecord) -> Result<(), StorageError> {
        if self.tasks.contains_key(&record.id) {
            return Err(StorageError::Duplicate {
                what: format!("task {}", record.id),
            });
        }
        self.tasks.insert(record.id.clone(), record.clone());
        Ok(())
    }

    fn get_task(&self, id: &str) -> Result<AsyncTaskRecord, StorageError> {
        self.tasks
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::TaskNotFound(id.to_string()))
    }

    fn update_task(&mut self, record: &AsyncTaskRecord) -> Result<(), StorageError> {
        match self.tasks.get_mut(&record.id) {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(StorageError::TaskNotFound(record.id.clone())),
        }
    }

    fn delete_task(&mut self, id: &str) -> Result<(), StorageError> {
        self.tasks
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StorageError::TaskNotFound(id.to_string()))
    }

    fn list_tasks(&self, account_id: &str) -> Result<Vec<AsyncTaskRecord>, StorageError> {
        let mut out: Vec<AsyncTaskRecord> = self
            .tasks
            .values()
            .filter(|t| t.account_id == account_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(out)
    }
}
