//! Full import runs: plan, create each document, record mappings.
//!
//! A document the destination rejects is recorded as an [`ImportError`]
//! and the run moves on. Only failures that make the whole run meaningless
//! (cycles, storage errors while planning) abort it.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use ngmig_core::{
    DiscoveryGraph, EntityType, ImportError, SkipDetail, SkippedExpressionDetail, YamlArtifact,
};

use crate::client::DestinationClient;
use crate::context::MigrationInput;
use crate::error::EngineError;
use crate::mapping::MappingService;
use crate::ordering::{MigrationPlan, MigrationPlanner};

/// Per-type outcome counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportStat {
    pub successfully_migrated: usize,
    pub already_migrated: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationImportSummary {
    pub stats: BTreeMap<EntityType, ImportStat>,
    pub skip_details: Vec<SkipDetail>,
    pub errors: Vec<ImportError>,
    pub skipped_expressions: Vec<SkippedExpressionDetail>,
}

impl MigrationImportSummary {
    fn stat(&mut self, kind: EntityType) -> &mut ImportStat {
        self.stats.entry(kind).or_default()
    }

    pub fn successfully_migrated(&self) -> usize {
        self.stats.values().map(|s| s.successfully_migrated).sum()
    }

    pub fn already_migrated(&self) -> usize {
        self.stats.values().map(|s| s.already_migrated).sum()
    }

    pub fn skipped(&self) -> usize {
        self.stats.values().map(|s| s.skipped).sum()
    }

    fn record_error(&mut self, artifact: &YamlArtifact, message: String) {
        warn!(entity = %artifact.cg_basic_info.entity_ref(), error = %message, "import failed");
        self.stat(artifact.kind()).failed += 1;
        self.errors.push(ImportError {
            message,
            entity: artifact.cg_basic_info.clone(),
        });
    }
}

pub struct Importer {
    planner: MigrationPlanner,
    mapping: Arc<MappingService>,
    client: Arc<dyn DestinationClient>,
}

impl Importer {
    pub fn new(
        planner: MigrationPlanner,
        mapping: Arc<MappingService>,
        client: Arc<dyn DestinationClient>,
    ) -> Self {
        Importer {
            planner,
            mapping,
            client,
        }
    }

    /// Plans `graph` and creates every new document in dependency order.
    pub fn import(
        &self,
        graph: &DiscoveryGraph,
        input: &MigrationInput,
    ) -> Result<MigrationImportSummary, EngineError> {
        let plan = self.planner.plan_and_generate(graph, input)?;
        let summary = self.apply(plan);
        info!(
            created = summary.successfully_migrated(),
            existing = summary.already_migrated(),
            skipped = summary.skipped(),
            errors = summary.errors.len(),
            "import finished"
        );
        Ok(summary)
    }

    /// Creates the plan's new documents and tallies the outcome.
    pub fn apply(&self, plan: MigrationPlan) -> MigrationImportSummary {
        let mut summary = MigrationImportSummary {
            errors: plan.errors,
            skipped_expressions: plan.skipped_expressions,
            ..Default::default()
        };
        for skip in &plan.skipped {
            summary.stat(skip.kind).skipped += 1;
        }
        summary.skip_details = plan.skipped;
        let failed: Vec<EntityType> = summary.errors.iter().map(|e| e.entity.kind).collect();
        for kind in failed {
            summary.stat(kind).failed += 1;
        }

        for artifact in &plan.yaml_files {
            if artifact.exists {
                summary.stat(artifact.kind()).already_migrated += 1;
                continue;
            }
            let outcome = match self.client.create_entity(artifact) {
                Ok(outcome) => outcome,
                Err(err) => {
                    summary.record_error(artifact, err.to_string());
                    continue;
                }
            };
            if !outcome.success {
                let message = if outcome.errors.is_empty() {
                    format!("destination rejected {}", artifact.file_name)
                } else {
                    outcome.errors.join("; ")
                };
                summary.record_error(artifact, message);
                continue;
            }
            if let Err(err) = self.mapping.record_mapping(artifact) {
                summary.record_error(artifact, format!("created but mapping not saved: {err}"));
                continue;
            }
            summary.stat(artifact.kind()).successfully_migrated += 1;
        }
        summary
    }
}
