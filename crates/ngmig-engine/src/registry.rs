//! Type-keyed table of migration capabilities, built once at startup.

use std::collections::HashMap;
use std::sync::Arc;

use ngmig_core::EntityType;

use crate::capability::MigrationCapability;
use crate::error::EngineError;
use crate::generic::GenericMigrator;
use crate::source::SourceRepository;

#[derive(Default)]
pub struct MigratorRegistry {
    capabilities: HashMap<EntityType, Arc<dyn MigrationCapability>>,
}

impl MigratorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers [`GenericMigrator`] for every concrete entity type.
    pub fn with_generic_capabilities(repo: Arc<dyn SourceRepository>) -> Self {
        let mut registry = Self::new();
        for kind in EntityType::CONCRETE {
            registry.register(kind, Arc::new(GenericMigrator::new(kind, repo.clone())));
        }
        registry
    }

    /// Adds or replaces the capability for `kind`, returning the old one.
    pub fn register(
        &mut self,
        kind: EntityType,
        capability: Arc<dyn MigrationCapability>,
    ) -> Option<Arc<dyn MigrationCapability>> {
        self.capabilities.insert(kind, capability)
    }

    /// Removes the capability for `kind`, leaving that type unhandled.
    pub fn unregister(&mut self, kind: EntityType) -> Option<Arc<dyn MigrationCapability>> {
        self.capabilities.remove(&kind)
    }

    pub fn get(&self, kind: EntityType) -> Result<&Arc<dyn MigrationCapability>, EngineError> {
        self.capabilities
            .get(&kind)
            .ok_or(EngineError::NoCapability { kind })
    }

    pub fn contains(&self, kind: EntityType) -> bool {
        self.capabilities.contains_key(&kind)
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }
}

impl std::fmt::Debug for MigratorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.capabilities.keys().collect();
        kinds.sort();
        f.debug_struct("MigratorRegistry")
            .field("kinds", &kinds)
            .finish()
    }
}
