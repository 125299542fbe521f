//! Discovery, ordering and import of CG entities into NG.
//!
//! # Modules
//!
//! - [`capability`]: the per-type `MigrationCapability` contract
//! - [`registry`]: type-keyed capability table
//! - [`generic`]: the uniform capability registered for every type
//! - [`source`]: source-system repository contract and in-memory backend
//! - [`discovery`]: dependency graph construction (`travel`)
//! - [`context`]: run input, overrides and the planning context
//! - [`ordering`]: priority pass plus leaf-stripping generation
//! - [`expressions`]: `${...}` substitution and reporting
//! - [`mapping`]: migrated-entity mappings and scope-widening lookup
//! - [`client`]: destination-system contract and in-memory backend
//! - [`import`]: end-to-end import with per-type summary
//! - [`engine`]: one handle over all of the above

pub mod capability;
pub mod client;
pub mod context;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod expressions;
pub mod generic;
pub mod import;
pub mod mapping;
pub mod ordering;
pub mod registry;
pub mod source;

pub use capability::{GeneratedYaml, MigrationCapability};
pub use client::{CreateOutcome, DestinationClient, InMemoryDestinationClient};
pub use context::{EntityOverride, MigrationContext, MigrationInput};
pub use discovery::{DiscoveryService, DiscoverySummary, EntityInput};
pub use engine::MigrationEngine;
pub use error::EngineError;
pub use generic::GenericMigrator;
pub use import::{ImportStat, Importer, MigrationImportSummary};
pub use mapping::{MappingService, SharedMappingStore};
pub use ordering::{MigrationPlan, MigrationPlanner, PRIORITY_TYPES};
pub use registry::MigratorRegistry;
pub use source::{InMemorySourceRepository, SourceCatalog, SourceRepository};
