//! The per-entity-type migration contract.
//!
//! Every source type the engine can handle registers one
//! [`MigrationCapability`] in the [`MigratorRegistry`](crate::registry::MigratorRegistry).
//! Discovery is mandatory; the planning hooks default to "nothing to do",
//! which makes a type discoverable but never migrated.

use ngmig_core::{
    DiscoveryUnit, EntityRef, MigratedEntityMapping, SkipDetail, SourceEntity, YamlArtifact,
};

use crate::context::MigrationContext;
use crate::error::EngineError;

/// Output of one `generate_yaml` call.
#[derive(Debug, Clone, Default)]
pub struct GeneratedYaml {
    /// Documents to create, the primary one first.
    pub files: Vec<YamlArtifact>,
    /// Parts of the entity that were deliberately left out.
    pub skips: Vec<SkipDetail>,
}

impl GeneratedYaml {
    pub fn single(artifact: YamlArtifact) -> Self {
        GeneratedYaml {
            files: vec![artifact],
            skips: Vec::new(),
        }
    }
}

pub trait MigrationCapability: Send + Sync {
    /// Loads the entity from the source system and declares its direct
    /// dependencies. `Ok(None)` when the entity does not exist.
    fn discover_from_source_id(
        &self,
        account_id: &str,
        app_id: Option<&str>,
        entity_id: &str,
    ) -> Result<Option<DiscoveryUnit>, EngineError>;

    /// Declares the dependencies of an entity the caller already loaded.
    fn discover_from_loaded_entity(
        &self,
        entity: SourceEntity,
    ) -> Result<DiscoveryUnit, EngineError>;

    /// Returns an `exists = true` artifact if this entity was already
    /// migrated somewhere visible from the destination scope.
    fn already_exists(
        &self,
        _ctx: &MigrationContext<'_>,
        _entity_ref: &EntityRef,
    ) -> Result<Option<YamlArtifact>, EngineError> {
        Ok(None)
    }

    /// Produces the NG documents for `entity_ref`. Every dependency that
    /// migrated successfully is available in `ctx.migrated()`.
    fn generate_yaml(
        &self,
        _ctx: &MigrationContext<'_>,
        _entity_ref: &EntityRef,
    ) -> Result<Option<GeneratedYaml>, EngineError> {
        Ok(None)
    }

    /// The mapping to persist once `artifact` is created. `None` means the
    /// type is not tracked.
    fn build_mapping_record(&self, _artifact: &YamlArtifact) -> Option<MigratedEntityMapping> {
        None
    }
}
