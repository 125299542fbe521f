//! Dependency discovery.
//!
//! Starting from one root (or several, joined under a synthetic dummy
//! head), [`DiscoveryService`] asks each entity's capability for its direct
//! dependencies and walks them depth first, building a [`DiscoveryGraph`]
//! in which every entity appears once no matter how many parents reach it.
//!
//! Children that cannot be fetched are logged and left out of the graph;
//! a dependency cycle aborts discovery with [`EngineError::CycleDetected`].

use std::collections::BTreeMap;
use std::sync::Arc;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use ngmig_core::{
    DiscoveryGraph, DiscoveryUnit, EntityNode, EntityRef, EntityType, GraphBuilder, SourceEntity,
};

use crate::error::EngineError;
use crate::registry::MigratorRegistry;

/// One explicit root for [`DiscoveryService::discover_multi`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    pub id: String,
    #[serde(rename = "type")]
    pub kind: EntityType,
}

impl EntityInput {
    pub fn new(kind: EntityType, id: impl Into<String>, app_id: Option<&str>) -> Self {
        EntityInput {
            app_id: app_id.map(str::to_string),
            id: id.into(),
            kind,
        }
    }
}

/// Shape of a discovered graph, returned by discovery-only runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoverySummary {
    pub root: EntityRef,
    /// Entities discovered, not counting the dummy head.
    pub entity_count: usize,
    pub edge_count: usize,
    pub counts_by_type: BTreeMap<EntityType, usize>,
}

impl DiscoverySummary {
    pub fn of(graph: &DiscoveryGraph) -> Self {
        let counts_by_type = graph.count_by_type();
        DiscoverySummary {
            root: graph.root().clone(),
            entity_count: counts_by_type.values().sum(),
            edge_count: graph.edge_count(),
            counts_by_type,
        }
    }
}

/// Mutable state of one traversal.
struct Walk<'a> {
    account_id: &'a str,
    builder: GraphBuilder,
    /// Refs on the current DFS path, in order.
    visiting: IndexSet<EntityRef>,
}

impl Walk<'_> {
    fn cycle_through(&self, entity_ref: &EntityRef) -> EngineError {
        let start = self.visiting.get_index_of(entity_ref).unwrap_or(0);
        let mut path: Vec<EntityRef> = self.visiting.iter().skip(start).cloned().collect();
        path.push(entity_ref.clone());
        EngineError::CycleDetected { path }
    }
}

#[derive(Debug, Clone)]
pub struct DiscoveryService {
    registry: Arc<MigratorRegistry>,
}

impl DiscoveryService {
    pub fn new(registry: Arc<MigratorRegistry>) -> Self {
        DiscoveryService { registry }
    }

    /// Discovers everything reachable from a single root.
    pub fn discover_single(
        &self,
        account_id: &str,
        app_id: Option<&str>,
        root_id: &str,
        root_kind: EntityType,
    ) -> Result<DiscoveryGraph, EngineError> {
        let root_ref = EntityRef::new(root_kind, root_id);
        info!(account = account_id, root = %root_ref, "discovery started");

        let capability = self.registry.get(root_kind)?;
        let unit = capability
            .discover_from_source_id(account_id, app_id, root_id)?
            .ok_or_else(|| EngineError::EntityNotFound {
                entity: root_ref.clone(),
            })?;

        let mut walk = Walk {
            account_id,
            builder: GraphBuilder::new(unit.node.entity_ref.clone()),
            visiting: IndexSet::new(),
        };
        self.travel(&mut walk, app_id, None, Some(unit))?;
        let graph = walk.builder.build();
        info!(
            root = %root_ref,
            entities = graph.node_count(),
            edges = graph.edge_count(),
            "discovery finished"
        );
        Ok(graph)
    }

    /// Discovers several unrelated roots into one graph rooted at a dummy
    /// head. Roots that cannot be fetched are logged and left out.
    pub fn discover_multi(
        &self,
        account_id: &str,
        inputs: &[EntityInput],
    ) -> Result<DiscoveryGraph, EngineError> {
        info!(account = account_id, roots = inputs.len(), "multi-root discovery started");
        let head = EntityRef::dummy_head();
        let mut walk = Walk {
            account_id,
            builder: GraphBuilder::new(head.clone()),
            visiting: IndexSet::new(),
        };
        walk.builder.put_if_absent(EntityNode::dummy_head());

        for input in inputs {
            // An application is its own app scope.
            let app_id = if input.kind == EntityType::Application {
                Some(input.id.as_str())
            } else {
                input.app_id.as_deref()
            };
            let capability = self.registry.get(input.kind)?;
            let unit = match capability.discover_from_source_id(account_id, app_id, &input.id) {
                Ok(Some(unit)) => unit,
                Ok(None) => {
                    warn!(kind = %input.kind, id = %input.id, "root not found, skipping");
                    continue;
                }
                Err(err) => {
                    warn!(kind = %input.kind, id = %input.id, error = %err, "root fetch failed, skipping");
                    continue;
                }
            };
            walk.builder.link(&head, &unit.node.entity_ref);
            self.travel(&mut walk, app_id, None, Some(unit))?;
        }

        let graph = walk.builder.build();
        info!(
            entities = graph.node_count(),
            edges = graph.edge_count(),
            "multi-root discovery finished"
        );
        Ok(graph)
    }

    /// Discovers the dependencies of an entity the caller already holds.
    pub fn discover_loaded(
        &self,
        account_id: &str,
        entity: SourceEntity,
    ) -> Result<DiscoveryGraph, EngineError> {
        let app_id = match entity.kind {
            EntityType::Application => Some(entity.id.clone()),
            _ => entity.app_id.clone(),
        };
        let unit = self
            .registry
            .get(entity.kind)?
            .discover_from_loaded_entity(entity)?;
        let mut walk = Walk {
            account_id,
            builder: GraphBuilder::new(unit.node.entity_ref.clone()),
            visiting: IndexSet::new(),
        };
        self.travel(&mut walk, app_id.as_deref(), None, Some(unit))?;
        Ok(walk.builder.build())
    }

    fn travel(
        &self,
        walk: &mut Walk<'_>,
        app_id: Option<&str>,
        parent: Option<&EntityRef>,
        unit: Option<DiscoveryUnit>,
    ) -> Result<(), EngineError> {
        let Some(unit) = unit else {
            return Ok(());
        };
        let current = unit.node.entity_ref.clone();

        if walk.visiting.contains(&current) {
            let err = walk.cycle_through(&current);
            warn!(error = %err, "cycle during discovery");
            return Err(err);
        }
        if let Some(parent) = parent {
            if walk.builder.contains(&current) {
                walk.builder.link(parent, &current);
                return Ok(());
            }
        }

        let app_id = if unit.node.kind == EntityType::Application {
            Some(current.id.as_str())
        } else {
            app_id
        };

        walk.builder.put_if_absent(unit.node);
        if let Some(parent) = parent {
            walk.builder.link(parent, &current);
        }

        walk.visiting.insert(current.clone());
        for child in &unit.children {
            if walk.visiting.contains(child) {
                let err = walk.cycle_through(child);
                warn!(error = %err, "cycle during discovery");
                return Err(err);
            }
            if walk.builder.contains(child) {
                walk.builder.link(&current, child);
                continue;
            }
            let capability = match self.registry.get(child.kind) {
                Ok(c) => c,
                Err(_) => {
                    warn!(parent = %current, child = %child, "no capability for dependency, skipping");
                    continue;
                }
            };
            let child_unit =
                match capability.discover_from_source_id(walk.account_id, app_id, &child.id) {
                    Ok(Some(u)) => Some(u),
                    Ok(None) => {
                        warn!(parent = %current, child = %child, "dependency not found");
                        None
                    }
                    Err(err) => {
                        warn!(parent = %current, child = %child, error = %err, "dependency fetch failed");
                        None
                    }
                };
            self.travel(walk, app_id, Some(&current), child_unit)?;
        }
        walk.visiting.shift_remove(&current);

        debug!(entity = %current, children = unit.children.len(), "visited");
        Ok(())
    }
}
