//! Service-level error type.
//!
//! [`ServerError`] is returned by task submission, polling and the task
//! handlers. Engine and storage errors convert into it, classified the same
//! way a request-facing caller would need them.

use ngmig_engine::EngineError;
use ngmig_storage::StorageError;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ServerError {
    /// The requested task or entity does not exist for this account.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request itself is invalid.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The task could not be registered; nothing was started.
    #[error("task submission failed: {0}")]
    Submission(String),

    /// The handler is shutting down and no longer accepts work.
    #[error("task handler is shutting down")]
    ShuttingDown,

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StorageError> for ServerError {
    fn from(err: StorageError) -> Self {
        match &err {
            StorageError::TaskNotFound(_) | StorageError::MappingNotFound(_) => {
                ServerError::NotFound(err.to_string())
            }
            _ => ServerError::Internal(err.to_string()),
        }
    }
}

impl From<EngineError> for ServerError {
    fn from(err: EngineError) -> Self {
        match &err {
            EngineError::EntityNotFound { .. } => ServerError::NotFound(err.to_string()),
            EngineError::NoCapability { .. }
            | EngineError::Unsupported { .. }
            | EngineError::CycleDetected { .. } => ServerError::BadRequest(err.to_string()),
            EngineError::Storage(storage) => ServerError::Internal(storage.to_string()),
            _ => ServerError::Internal(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for ServerError {
    fn from(err: serde_json::Error) -> Self {
        ServerError::BadRequest(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ngmig_core::{EntityRef, EntityType};

    #[test]
    fn engine_errors_are_classified() {
        let missing = EngineError::EntityNotFound {
            entity: EntityRef::new(EntityType::Workflow, "w"),
        };
        assert!(matches!(ServerError::from(missing), ServerError::NotFound(_)));

        let cycle = EngineError::CycleDetected { path: Vec::new() };
        assert!(matches!(ServerError::from(cycle), ServerError::BadRequest(_)));

        let storage = EngineError::Storage(StorageError::Migration("boom".into()));
        assert!(matches!(ServerError::from(storage), ServerError::Internal(_)));
    }

    #[test]
    fn missing_task_is_not_found() {
        let err = ServerError::from(StorageError::TaskNotFound("t1".into()));
        assert!(matches!(err, ServerError::NotFound(_)));
    }
}
