//! SQLite implementation of [`MappingStore`] and [`TaskStore`].
//!
//! [`SqliteStore`] persists mappings and task records with WAL mode and
//! automatic schema migrations. Mapping uniqueness is enforced by the
//! `idx_mappings_identity` unique index, so two concurrent migrations racing
//! on the same entity cannot both insert. Payloads are stored as JSON TEXT.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use ngmig_core::{AsyncTaskRecord, EntityType, MigratedEntityMapping, Scope, TaskRequestType, TaskStatus};

use crate::error::StorageError;
use crate::traits::{MappingStore, TaskStore};
use crate::types::MappingFilter;

/// SQLite-backed store.
pub struct SqliteStore {
    conn: Connection,
}

const MAPPING_COLUMNS: &str = "id, account_id, app_id, cg_entity_id, entity_type, scope, \
     org_identifier, project_identifier, identifier, fully_qualified_identifier, created_at";

const TASK_COLUMNS: &str = "task_id, account_id, request_type, status, request_payload, \
     response_payload, error_message, created_at, updated_at";

impl SqliteStore {
    /// Opens (or creates) a SQLite database at `path`.
    pub fn new(path: &str) -> Result<Self, StorageError> {
        let conn = crate::schema::open_database(path)?;
        Ok(SqliteStore { conn })
    }

    /// Opens an in-memory SQLite database (for testing).
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = crate::schema::open_in_memory()?;
        Ok(SqliteStore { conn })
    }

    // -----------------------------------------------------------------------
    // Row decoding
    // -----------------------------------------------------------------------

    fn parse_time(raw: &str) -> Result<DateTime<Utc>, StorageError> {
        DateTime::parse_from_rfc3339(raw)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| StorageError::Corrupt {
                reason: format!("bad timestamp '{}': {}", raw, e),
            })
    }

    fn mapping_from_row(row: &Row<'_>) -> rusqlite::Result<RawMapping> {
        Ok(RawMapping {
            id: row.get(0)?,
            account_id: row.get(1)?,
            app_id: row.get(2)?,
            cg_entity_id: row.get(3)?,
            entity_type: row.get(4)?,
            scope: row.get(5)?,
            org_identifier: row.get(6)?,
            project_identifier: row.get(7)?,
            identifier: row.get(8)?,
            fully_qualified_identifier: row.get(9)?,
            created_at: row.get(10)?,
        })
    }

    fn task_from_row(row: &Row<'_>) -> rusqlite::Result<RawTask> {
        Ok(RawTask {
            id: row.get(0)?,
            account_id: row.get(1)?,
            request_type: row.get(2)?,
            status: row.get(3)?,
            request_payload: row.get(4)?,
            response_payload: row.get(5)?,
            error_message: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }
}

/// Undecoded mapping row; enum and timestamp parsing happens outside the
/// rusqlite row callback so it can fail with a [`StorageError`].
struct RawMapping {
    id: i64,
    account_id: String,
    app_id: String,
    cg_entity_id: String,
    entity_type: String,
    scope: String,
    org_identifier: Option<String>,
    project_identifier: Option<String>,
    identifier: String,
    fully_qualified_identifier: String,
    created_at: String,
}

impl RawMapping {
    fn decode(self) -> Result<MigratedEntityMapping, StorageError> {
        let entity_type: EntityType = self.entity_type.parse().map_err(|e| StorageError::Corrupt {
            reason: format!("mapping {}: {}", self.id, e),
        })?;
        let scope = Scope::parse(&self.scope).ok_or_else(|| StorageError::Corrupt {
            reason: format!("mapping {}: bad scope '{}'", self.id, self.scope),
        })?;
        Ok(MigratedEntityMapping {
            id: Some(self.id),
            account_id: self.account_id,
            app_id: (!self.app_id.is_empty()).then_some(self.app_id),
            cg_entity_id: self.cg_entity_id,
            entity_type,
            scope,
            org_identifier: self.org_identifier,
            project_identifier: self.project_identifier,
            identifier: self.identifier,
            fully_qualified_identifier: self.fully_qualified_identifier,
            created_at: SqliteStore::parse_time(&self.created_at)?,
        })
    }
}

struct RawTask {
    id: String,
    account_id: String,
    request_type: String,
    status: String,
    request_payload: String,
    response_payload: Option<String>,
    error_message: Option<String>,
    created_at: String,
    updated_at: String,
}

impl RawTask {
    fn decode(self) -> Result<AsyncTaskRecord, StorageError> {
        let request_type =
            TaskRequestType::parse(&self.request_type).ok_or_else(|| StorageError::Corrupt {
                reason: format!("task {}: bad request type '{}'", self.id, self.request_type),
            })?;
        let status = TaskStatus::parse(&self.status).ok_or_else(|| StorageError::Corrupt {
            reason: format!("task {}: bad status '{}'", self.id, self.status),
        })?;
        let response_payload = match self.response_payload {
            Some(raw) => Some(serde_json::from_str(&raw)?),
            None => None,
        };
        Ok(AsyncTaskRecord {
            request_payload: serde_json::from_str(&self.request_payload)?,
            response_payload,
            created_at: SqliteStore::parse_time(&self.created_at)?,
            updated_at: SqliteStore::parse_time(&self.updated_at)?,
            id: self.id,
            account_id: self.account_id,
            request_type,
            status,
            error_message: self.error_message,
        })
    }
}

impl MappingStore for SqliteStore {
    fn insert_mapping(&mut self, mapping: &MigratedEntityMapping) -> Result<i64, StorageError> {
        let what = format!(
            "mapping {}:{} -> {}",
            mapping.entity_type, mapping.cg_entity_id, mapping.fully_qualified_identifier
        );
        self.conn
            .execute(
                "INSERT INTO migrated_entity_mappings (account_id, app_id, cg_entity_id, entity_type, scope, org_identifier, project_identifier, identifier, fully_qualified_identifier, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    mapping.account_id,
                    mapping.app_id.as_deref().unwrap_or(""),
                    mapping.cg_entity_id,
                    mapping.entity_type.as_str(),
                    mapping.scope.as_str(),
                    mapping.org_identifier,
                    mapping.project_identifier,
                    mapping.identifier,
                    mapping.fully_qualified_identifier,
                    mapping.created_at.to_rfc3339(),
                ],
            )
            .map_err(|e| StorageError::from_insert(e, what))?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_mapping(&self, id: i64) -> Result<MigratedEntityMapping, StorageError> {
        let sql = format!(
            "SELECT {} FROM migrated_entity_mappings WHERE id = ?1",
            MAPPING_COLUMNS
        );
        let raw = self
            .conn
            .query_row(&sql, params![id], Self::mapping_from_row)
            .optional()?
            .ok_or(StorageError::MappingNotFound(id))?;
        raw.decode()
    }

    fn delete_mapping(&mut self, id: i64) -> Result<(), StorageError> {
        let deleted = self.conn.execute(
            "DELETE FROM migrated_entity_mappings WHERE id = ?1",
            params![id],
        )?;
        if deleted == 0 {
            return Err(StorageError::MappingNotFound(id));
        }
        Ok(())
    }

    fn find_mappings(
        &self,
        filter: &MappingFilter,
    ) -> Result<Vec<MigratedEntityMapping>, StorageError> {
        // Each optional filter is `(?n IS NULL OR column = ?n)` so one
        // prepared statement covers every filter shape.
        let sql = format!(
            "SELECT {} FROM migrated_entity_mappings \
             WHERE account_id = ?1 \
               AND (?2 IS NULL OR app_id = ?2) \
               AND (?3 IS NULL OR cg_entity_id = ?3) \
               AND (?4 IS NULL OR entity_type = ?4) \
               AND (?5 IS NULL OR scope = ?5) \
               AND (?6 IS NULL OR identifier = ?6) \
               AND (?7 IS NULL OR fully_qualified_identifier = ?7) \
             ORDER BY id",
            MAPPING_COLUMNS
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let rows = stmt.query_map(
            params![
                filter.account_id,
                filter.app_id,
                filter.cg_entity_id,
                filter.entity_type.map(|t| t.as_str()),
                filter.scope.map(|s| s.as_str()),
                filter.identifier,
                filter.fully_qualified_identifier,
            ],
            Self::mapping_from_row,
        )?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?.decode()?);
        }
        Ok(out)
    }
}

impl TaskStore for SqliteStore {
    fn insert_task(&mut self, record: &AsyncTaskRecord) -> Result<(), StorageError> {
        let response = record
            .response_payload
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        self.conn
            .execute(
                "INSERT INTO async_tasks (task_id, account_id, request_type, status, request_payload, response_payload, error_message, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    record.id,
                    record.account_id,
                    record.request_type.as_str(),
                    record.status.as_str(),
                    serde_json::to_string(&record.request_payload)?,
                    response,
                    record.error_message,
                    record.created_at.to_rfc3339(),
                    record.updated_at.to_rfc3339(),
                ],
            )
            .map_err(|e| StorageError::from_insert(e, format!("task {}", record.id)))?;
        Ok(())
    }

    fn get_task(&self, id: &str) -> Result<AsyncTaskRecord, StorageError> {
        let sql = format!("SELECT {} FROM async_tasks WHERE task_id = ?1", TASK_COLUMNS);
        let raw = self
            .conn
            .query_row(&sql, params![id], Self::task_from_row)
            .optional()?
            .ok_or_else(|| StorageError::TaskNotFound(id.to_string()))?;
        raw.decode()
    }

    fn update_task(&mut self, record: &AsyncTaskRecord) -> Result<(), StorageError> {
        let response = record
            .response_payload
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let updated = self.conn.execute(
            "UPDATE async_tasks SET status = ?2, response_payload = ?3, error_message = ?4, updated_at = ?5 WHERE task_id = ?1",
            params![
                record.id,
                record.status.as_str(),
                response,
                record.error_message,
                record.updated_at.to_rfc3339(),
            ],
        )?;
        if updated == 0 {
            return Err(StorageError::TaskNotFound(record.id.clone()));
        }
        Ok(())
    }

    fn delete_task(&mut self, id: &str) -> Result<(), StorageError> {
        let deleted = self
            .conn
            .execute("DELETE FROM async_tasks WHERE task_id = ?1", params![id])?;
        if deleted == 0 {
            return Err(StorageError::TaskNotFound(id.to_string()));
        }
        Ok(())
    }

    fn list_tasks(&self, account_id: &str) -> Result<Vec<AsyncTaskRecord>, StorageError> {
        let sql = format!(
            "SELECT {} FROM async_tasks WHERE account_id = ?1 ORDER BY created_at, task_id",
            TASK_COLUMNS
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let rows = stmt.query_map(params![account_id], Self::task_from_row)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?.decode()?);
        }
        Ok(out)
    }
}
