//! Engine error types.
//!
//! [`EngineError`] is the single error type for discovery, planning, mapping
//! and import. Per-entity failures during planning and import are NOT
//! returned as errors; they are collected into the run's error list and the
//! run continues. An `Err` from an engine entry point means the whole call
//! could not proceed.

use ngmig_core::{CoreError, EntityRef, EntityType};
use ngmig_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// A requested root entity does not exist in the source system.
    #[error("entity not found: {entity}")]
    EntityNotFound { entity: EntityRef },

    /// No migration capability is registered for the type.
    #[error("no migration capability registered for {kind}")]
    NoCapability { kind: EntityType },

    /// The entity uses a variant this migrator cannot convert.
    #[error("unsupported {entity}: {reason}")]
    Unsupported { entity: EntityRef, reason: String },

    /// The dependency graph contains a cycle.
    #[error("dependency cycle: {}", join_path(.path))]
    CycleDetected { path: Vec<EntityRef> },

    /// Loading an entity from the source system failed.
    #[error("failed to fetch {entity}: {reason}")]
    Fetch { entity: EntityRef, reason: String },

    /// The destination client failed to talk to the destination system.
    #[error("destination client error: {reason}")]
    Client { reason: String },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

fn join_path(path: &[EntityRef]) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}
