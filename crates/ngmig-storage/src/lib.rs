//! Storage abstraction for migration bookkeeping.
//!
//! Provides the [`MappingStore`] and [`TaskStore`] traits defining the
//! storage contracts, plus the [`InMemoryStore`] and [`SqliteStore`] as
//! first-class backends.
//!
//! # Modules
//!
//! - [`error`]: StorageError enum with all failure modes
//! - [`types`]: MappingFilter query type
//! - [`traits`]: MappingStore and TaskStore trait definitions
//! - [`memory`]: InMemoryStore implementation
//! - [`schema`]: SQL schema and migration setup
//! - [`sqlite`]: SqliteStore implementation

pub mod error;
pub mod memory;
pub mod schema;
pub mod sqlite;
pub mod traits;
pub mod types;

// Re-export key types for ergonomic use.
pub use error::StorageError;
pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{MappingStore, TaskStore};
pub use types::MappingFilter;
