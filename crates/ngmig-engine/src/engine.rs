//! One handle bundling the registry, mapping service, discovery and
//! planning, shared by the task handlers and the CLI.

use std::sync::Arc;

use ngmig_core::DiscoveryGraph;

use crate::client::DestinationClient;
use crate::context::MigrationInput;
use crate::discovery::DiscoveryService;
use crate::error::EngineError;
use crate::import::{Importer, MigrationImportSummary};
use crate::mapping::{MappingService, SharedMappingStore};
use crate::ordering::{MigrationPlan, MigrationPlanner};
use crate::registry::MigratorRegistry;
use crate::source::SourceRepository;

#[derive(Debug, Clone)]
pub struct MigrationEngine {
    registry: Arc<MigratorRegistry>,
    mapping: Arc<MappingService>,
    discovery: DiscoveryService,
    planner: MigrationPlanner,
}

impl MigrationEngine {
    pub fn new(registry: Arc<MigratorRegistry>, store: SharedMappingStore) -> Self {
        let mapping = Arc::new(MappingService::new(store, registry.clone()));
        MigrationEngine {
            discovery: DiscoveryService::new(registry.clone()),
            planner: MigrationPlanner::new(registry.clone(), mapping.clone()),
            registry,
            mapping,
        }
    }

    /// Engine with the generic capability registered for every type.
    pub fn generic(repo: Arc<dyn SourceRepository>, store: SharedMappingStore) -> Self {
        Self::new(
            Arc::new(MigratorRegistry::with_generic_capabilities(repo)),
            store,
        )
    }

    pub fn registry(&self) -> &Arc<MigratorRegistry> {
        &self.registry
    }

    pub fn mapping(&self) -> &Arc<MappingService> {
        &self.mapping
    }

    pub fn discovery(&self) -> &DiscoveryService {
        &self.discovery
    }

    pub fn planner(&self) -> &MigrationPlanner {
        &self.planner
    }

    pub fn plan(
        &self,
        graph: &DiscoveryGraph,
        input: &MigrationInput,
    ) -> Result<MigrationPlan, EngineError> {
        self.planner.plan_and_generate(graph, input)
    }

    pub fn importer(&self, client: Arc<dyn DestinationClient>) -> Importer {
        Importer::new(self.planner.clone(), self.mapping.clone(), client)
    }

    pub fn import(
        &self,
        graph: &DiscoveryGraph,
        input: &MigrationInput,
        client: Arc<dyn DestinationClient>,
    ) -> Result<MigrationImportSummary, EngineError> {
        self.importer(client).import(graph, input)
    }
}
