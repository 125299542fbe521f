//! Core error types for ngmig-core.
//!
//! Uses `thiserror` for structured, matchable error variants covering the
//! failure modes of the entity model and the discovery graph.

use thiserror::Error;

use crate::entity::EntityRef;

/// Core errors produced by the ngmig-core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Text could not be parsed as a `KIND:id` entity reference.
    #[error("invalid entity reference: '{text}'")]
    InvalidEntityRef { text: String },

    /// An entity type tag was not recognised.
    #[error("unknown entity type: '{name}'")]
    UnknownEntityType { name: String },

    /// A reference appears in the adjacency map without a node table entry.
    #[error("graph inconsistency: {reason}")]
    GraphInconsistency { reason: String },

    /// The adjacency map contains a cycle through the given reference.
    #[error("dependency cycle through {entity}")]
    Cycle { entity: EntityRef },
}
