//! Shared service state.
//!
//! [`AppState`] owns one [`MigrationEngine`] and one [`AsyncTaskHandler`]
//! and hands both to the discovery and import task handlers.
//!
//! Mappings are read and written from inside blocking task bodies, so the
//! mapping store sits behind a `parking_lot::Mutex`. Task records are touched
//! from async code only and use `tokio::sync::Mutex`. With SQLite each side
//! gets its own connection to the same file; `rusqlite::Connection` is `!Sync`.

use std::sync::Arc;

use ngmig_engine::{DestinationClient, MigrationEngine, SharedMappingStore, SourceRepository};
use ngmig_storage::{InMemoryStore, SqliteStore};

use crate::config::{ServerConfig, TaskHandlerConfig};
use crate::error::ServerError;
use crate::handlers::{DiscoveryTaskHandler, ImportTaskHandler};
use crate::tasks::{AsyncTaskHandler, SharedTaskStore};

#[derive(Debug, Clone)]
pub struct AppState {
    pub engine: MigrationEngine,
    pub tasks: Arc<AsyncTaskHandler>,
    pub discovery: DiscoveryTaskHandler,
    pub import: ImportTaskHandler,
}

impl AppState {
    /// Creates state backed by the SQLite database at `config.db_path`.
    pub fn new(
        config: &ServerConfig,
        repo: Arc<dyn SourceRepository>,
        client: Arc<dyn DestinationClient>,
    ) -> Result<Self, ServerError> {
        let mappings: SharedMappingStore =
            Arc::new(parking_lot::Mutex::new(SqliteStore::new(&config.db_path)?));
        let tasks: SharedTaskStore =
            Arc::new(tokio::sync::Mutex::new(SqliteStore::new(&config.db_path)?));
        Ok(Self::assemble(config.tasks.clone(), repo, client, mappings, tasks))
    }

    /// Creates state with in-memory stores (for testing).
    pub fn in_memory(
        repo: Arc<dyn SourceRepository>,
        client: Arc<dyn DestinationClient>,
    ) -> Self {
        let mappings: SharedMappingStore = Arc::new(parking_lot::Mutex::new(InMemoryStore::new()));
        let tasks: SharedTaskStore = Arc::new(tokio::sync::Mutex::new(InMemoryStore::new()));
        Self::assemble(TaskHandlerConfig::default(), repo, client, mappings, tasks)
    }

    fn assemble(
        config: TaskHandlerConfig,
        repo: Arc<dyn SourceRepository>,
        client: Arc<dyn DestinationClient>,
        mappings: SharedMappingStore,
        task_store: SharedTaskStore,
    ) -> Self {
        let engine = MigrationEngine::generic(repo, mappings);
        let tasks = AsyncTaskHandler::start(config, task_store);
        AppState {
            discovery: DiscoveryTaskHandler::new(tasks.clone(), engine.clone()),
            import: ImportTaskHandler::new(tasks.clone(), engine.clone(), client),
            engine,
            tasks,
        }
    }
}
