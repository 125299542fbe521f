//! Dependency-ordered YAML generation.
//!
//! [`MigrationPlanner::plan_and_generate`] turns a [`DiscoveryGraph`] into
//! the list of NG documents to create, in an order where every entity's
//! dependencies already have a destination identity when it is generated.
//!
//! Three passes:
//!
//! 1. Pre-load: entities with a visible existing mapping are reused as
//!    `exists` artifacts. Environments go first.
//! 2. Priority: secret manager templates, secret managers, secrets,
//!    connectors and environments are generated up front regardless of
//!    their position in the graph.
//! 3. Leaf stripping over a private copy of the adjacency map: generate
//!    every entity with no remaining dependencies, remove it, repeat.
//!
//! A failed generation is recorded as an [`ImportError`]; anything that
//! depends on it is skipped and everything else continues.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use ngmig_core::{
    Adjacency, CgBasicInfo, CoreError, DiscoveryGraph, EntityRef, EntityType, ImportError,
    SkipDetail, SkippedExpressionDetail, YamlArtifact,
};

use crate::context::{MigrationContext, MigrationInput};
use crate::error::EngineError;
use crate::expressions;
use crate::mapping::MappingService;
use crate::registry::MigratorRegistry;

/// Types generated ahead of the leaf-stripping pass, in this order.
pub const PRIORITY_TYPES: [EntityType; 5] = [
    EntityType::SecretManagerTemplate,
    EntityType::SecretManager,
    EntityType::Secret,
    EntityType::Connector,
    EntityType::Environment,
];

fn is_priority(kind: EntityType) -> bool {
    PRIORITY_TYPES.contains(&kind)
}

/// Everything one planning run produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationPlan {
    /// Artifacts in creation order; pre-existing ones have `exists = true`.
    pub yaml_files: Vec<YamlArtifact>,
    pub skipped: Vec<SkipDetail>,
    pub errors: Vec<ImportError>,
    pub skipped_expressions: Vec<SkippedExpressionDetail>,
    /// Refs in the order generation was attempted.
    pub generation_order: Vec<EntityRef>,
    /// Number of leaf-stripping passes taken.
    pub leaf_passes: usize,
}

impl MigrationPlan {
    /// Artifacts that still have to be created.
    pub fn new_artifacts(&self) -> impl Iterator<Item = &YamlArtifact> {
        self.yaml_files.iter().filter(|a| !a.exists)
    }

    pub fn position(&self, entity_ref: &EntityRef) -> Option<usize> {
        self.generation_order.iter().position(|r| r == entity_ref)
    }
}

/// Destructive working copy of the adjacency map.
struct LeafTracker {
    remaining: Adjacency,
}

impl LeafTracker {
    /// Copies `adjacency` without the refs `exclude` rejects, both as
    /// entries and as children.
    fn new(adjacency: &Adjacency, exclude: impl Fn(&EntityRef) -> bool) -> Self {
        let mut remaining: Adjacency = adjacency
            .iter()
            .filter(|(r, _)| !exclude(r))
            .map(|(r, children)| (r.clone(), children.clone()))
            .collect();
        let keys: HashSet<EntityRef> = remaining.keys().cloned().collect();
        for children in remaining.values_mut() {
            children.retain(|c| keys.contains(c));
        }
        LeafTracker { remaining }
    }

    fn is_empty(&self) -> bool {
        self.remaining.is_empty()
    }

    fn leaves(&self) -> Vec<EntityRef> {
        self.remaining
            .iter()
            .filter(|(_, children)| children.is_empty())
            .map(|(r, _)| r.clone())
            .collect()
    }

    fn strip(&mut self, leaves: &[EntityRef]) {
        let gone: HashSet<&EntityRef> = leaves.iter().collect();
        self.remaining.retain(|r, _| !gone.contains(r));
        for children in self.remaining.values_mut() {
            children.retain(|c| !gone.contains(c));
        }
    }

    fn remaining_refs(&self) -> Vec<EntityRef> {
        self.remaining.keys().cloned().collect()
    }
}

/// Mutable state of one planning run.
struct Run<'a> {
    ctx: MigrationContext<'a>,
    plan: MigrationPlan,
    attempted: HashSet<EntityRef>,
    /// Failed refs, and refs skipped because of a failed dependency.
    blocked: HashMap<EntityRef, EntityRef>,
}

#[derive(Debug, Clone)]
pub struct MigrationPlanner {
    registry: Arc<MigratorRegistry>,
    mapping: Arc<MappingService>,
}

impl MigrationPlanner {
    pub fn new(registry: Arc<MigratorRegistry>, mapping: Arc<MappingService>) -> Self {
        MigrationPlanner { registry, mapping }
    }

    pub fn plan_and_generate(
        &self,
        graph: &DiscoveryGraph,
        input: &MigrationInput,
    ) -> Result<MigrationPlan, EngineError> {
        info!(root = %graph.root(), entities = graph.node_count(), "planning migration");
        let dependency_order = graph.dependency_order().map_err(|e| match e {
            CoreError::Cycle { entity } => EngineError::CycleDetected {
                path: vec![entity],
            },
            other => EngineError::Core(other),
        })?;

        let mut run = Run {
            ctx: MigrationContext::new(input, graph, &self.mapping),
            plan: MigrationPlan::default(),
            attempted: HashSet::new(),
            blocked: HashMap::new(),
        };

        self.preload_existing(&mut run, graph)?;

        for kind in PRIORITY_TYPES {
            for entity_ref in dependency_order.iter().filter(|r| r.kind == kind) {
                self.generate(&mut run, entity_ref);
            }
        }

        let mut tracker = LeafTracker::new(graph.adjacency(), |r| is_priority(r.kind));
        while !tracker.is_empty() {
            let leaves = tracker.leaves();
            if leaves.is_empty() {
                let path = tracker.remaining_refs();
                warn!(remaining = path.len(), "no leaves left, dependency cycle");
                return Err(EngineError::CycleDetected { path });
            }
            run.plan.leaf_passes += 1;
            debug!(pass = run.plan.leaf_passes, leaves = leaves.len(), "leaf pass");
            for leaf in leaves.iter().filter(|r| r.kind != EntityType::DummyHead) {
                self.generate(&mut run, leaf);
            }
            tracker.strip(&leaves);
        }

        let Run { mut plan, .. } = run;
        plan.skipped_expressions =
            expressions::scan_artifacts(&mut plan.yaml_files, &input.custom_expressions);
        info!(
            artifacts = plan.yaml_files.len(),
            skipped = plan.skipped.len(),
            errors = plan.errors.len(),
            passes = plan.leaf_passes,
            "planning finished"
        );
        Ok(plan)
    }

    fn preload_existing(&self, run: &mut Run<'_>, graph: &DiscoveryGraph) -> Result<(), EngineError> {
        let mut refs: Vec<&EntityRef> = graph
            .entities()
            .keys()
            .filter(|r| r.kind != EntityType::DummyHead)
            .collect();
        refs.sort_by_key(|r| r.kind != EntityType::Environment);

        for entity_ref in refs {
            let Ok(capability) = self.registry.get(entity_ref.kind) else {
                continue;
            };
            if let Some(artifact) = capability.already_exists(&run.ctx, entity_ref)? {
                run.ctx
                    .record_migrated(entity_ref.clone(), artifact.ng_detail.clone());
                run.plan.yaml_files.push(artifact);
            }
        }
        Ok(())
    }

    fn generate(&self, run: &mut Run<'_>, entity_ref: &EntityRef) {
        if run.ctx.is_migrated(entity_ref) || !run.attempted.insert(entity_ref.clone()) {
            return;
        }
        let graph = run.ctx.graph();
        let Some(node) = graph.node(entity_ref) else {
            return;
        };
        let cg = CgBasicInfo::from_node(run.ctx.account_id(), node);

        let failed_dependency = graph
            .children(entity_ref)
            .find_map(|child| run.blocked.get(child).map(|root| (child.clone(), root.clone())));
        if let Some((child, root)) = failed_dependency {
            debug!(entity = %entity_ref, dependency = %child, "skipping, dependency failed");
            run.plan.skipped.push(SkipDetail {
                kind: entity_ref.kind,
                cg_basic_info: cg,
                reason: format!("dependency {child} could not be migrated ({root} failed)"),
            });
            run.blocked.insert(entity_ref.clone(), root);
            return;
        }

        let Ok(capability) = self.registry.get(entity_ref.kind) else {
            return;
        };
        run.plan.generation_order.push(entity_ref.clone());
        match capability.generate_yaml(&run.ctx, entity_ref) {
            Ok(Some(generated)) => {
                if let Some(primary) = generated.files.first() {
                    run.ctx
                        .record_migrated(entity_ref.clone(), primary.ng_detail.clone());
                }
                run.plan.yaml_files.extend(generated.files);
                run.plan.skipped.extend(generated.skips);
            }
            Ok(None) => {}
            Err(err) => {
                warn!(entity = %entity_ref, error = %err, "generation failed");
                run.plan.errors.push(ImportError {
                    message: err.to_string(),
                    entity: cg,
                });
                run.blocked.insert(entity_ref.clone(), entity_ref.clone());
            }
        }
    }
}
