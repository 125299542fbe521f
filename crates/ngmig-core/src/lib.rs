//! Entity model for CG -> NG migration.
//!
//! Defines the source-side identity types ([`EntityRef`], [`EntityNode`]),
//! the [`DiscoveryGraph`] produced by discovery, destination-side scope and
//! identity ([`Scope`], [`NgEntityDetail`]), and the persisted records
//! ([`MigratedEntityMapping`], [`AsyncTaskRecord`]) shared by every crate in
//! the workspace.

pub mod artifact;
pub mod entity;
pub mod error;
pub mod graph;
pub mod identifier;
pub mod mapping;
pub mod scope;
pub mod task;

// Re-export commonly used types
pub use artifact::{ImportError, SkipDetail, SkippedExpressionDetail, YamlArtifact};
pub use entity::{CgBasicInfo, DiscoveryUnit, EntityNode, EntityRef, EntityType, SourceEntity};
pub use error::CoreError;
pub use graph::{Adjacency, DiscoveryGraph, GraphBuilder};
pub use identifier::{entity_identifier, identifier_from_name, CaseFormat};
pub use mapping::MigratedEntityMapping;
pub use scope::{fully_qualified_identifier, NgEntityDetail, Scope};
pub use task::{AsyncTaskRecord, TaskRequestType, TaskStatus};
