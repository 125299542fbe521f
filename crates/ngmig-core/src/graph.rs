//! DiscoveryGraph: the entity dependency graph produced by discovery.
//!
//! The graph is two parallel insertion-ordered maps:
//! - `entities`: the node table, [`EntityRef`] -> [`EntityNode`]
//! - `adjacency`: directed "depends on" edges, parent -> set of children
//!
//! Discovery builds the graph incrementally through [`GraphBuilder`], which
//! is the only mutable form. Once [`GraphBuilder::build`] returns, the
//! [`DiscoveryGraph`] is read-only; consumers that need to destructively walk
//! it (the migration planner's leaf tracker) clone [`DiscoveryGraph::adjacency`].

use std::collections::BTreeMap;

use indexmap::{IndexMap, IndexSet};
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use serde::{Deserialize, Serialize};

use crate::entity::{EntityNode, EntityRef, EntityType};
use crate::error::CoreError;

/// Adjacency map type: parent -> children ("depends on").
pub type Adjacency = IndexMap<EntityRef, IndexSet<EntityRef>>;

/// An immutable entity dependency graph with one designated root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryGraph {
    root: EntityRef,
    entities: IndexMap<EntityRef, EntityNode>,
    adjacency: Adjacency,
}

impl DiscoveryGraph {
    // -----------------------------------------------------------------------
    // Read-only accessors
    // -----------------------------------------------------------------------

    pub fn root(&self) -> &EntityRef {
        &self.root
    }

    /// The node table, in discovery order.
    pub fn entities(&self) -> &IndexMap<EntityRef, EntityNode> {
        &self.entities
    }

    /// The adjacency map, in discovery order.
    pub fn adjacency(&self) -> &Adjacency {
        &self.adjacency
    }

    pub fn node(&self, entity_ref: &EntityRef) -> Option<&EntityNode> {
        self.entities.get(entity_ref)
    }

    pub fn contains(&self, entity_ref: &EntityRef) -> bool {
        self.entities.contains_key(entity_ref)
    }

    /// Direct dependencies of `entity_ref` (empty if unknown).
    pub fn children(&self, entity_ref: &EntityRef) -> impl Iterator<Item = &EntityRef> {
        self.adjacency.get(entity_ref).into_iter().flatten()
    }

    /// Refs that directly depend on `entity_ref`.
    pub fn incoming(&self, entity_ref: &EntityRef) -> Vec<&EntityRef> {
        self.adjacency
            .iter()
            .filter(|(_, children)| children.contains(entity_ref))
            .map(|(parent, _)| parent)
            .collect()
    }

    pub fn node_count(&self) -> usize {
        self.entities.len()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(IndexSet::len).sum()
    }

    /// All refs of one type, in discovery order.
    pub fn refs_of_type(&self, kind: EntityType) -> impl Iterator<Item = &EntityRef> {
        self.entities.keys().filter(move |r| r.kind == kind)
    }

    /// Node count per entity type, excluding the synthetic dummy head.
    pub fn count_by_type(&self) -> BTreeMap<EntityType, usize> {
        let mut counts = BTreeMap::new();
        for r in self.entities.keys() {
            if r.kind != EntityType::DummyHead {
                *counts.entry(r.kind).or_insert(0) += 1;
            }
        }
        counts
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    /// Checks that every adjacency key and child has a node table entry and
    /// that the graph is acyclic.
    pub fn validate(&self) -> Result<(), CoreError> {
        for (parent, children) in &self.adjacency {
            if !self.entities.contains_key(parent) {
                return Err(CoreError::GraphInconsistency {
                    reason: format!("adjacency key {} has no node", parent),
                });
            }
            if let Some(child) = children.iter().find(|c| !self.entities.contains_key(*c)) {
                return Err(CoreError::GraphInconsistency {
                    reason: format!("edge {} -> {} targets a missing node", parent, child),
                });
            }
        }
        self.dependency_order().map(|_| ())
    }

    /// A full order in which every child precedes all of its parents.
    pub fn dependency_order(&self) -> Result<Vec<&EntityRef>, CoreError> {
        let mut g: DiGraphMap<usize, ()> = DiGraphMap::new();
        for idx in 0..self.entities.len() {
            g.add_node(idx);
        }
        for (parent, children) in &self.adjacency {
            let Some(p) = self.entities.get_index_of(parent) else {
                continue;
            };
            for child in children {
                if let Some(c) = self.entities.get_index_of(child) {
                    g.add_edge(p, c, ());
                }
            }
        }

        let sorted = toposort(&g, None).map_err(|cycle| CoreError::Cycle {
            entity: self
                .entities
                .get_index(cycle.node_id())
                .map(|(r, _)| r.clone())
                .unwrap_or_else(|| self.root.clone()),
        })?;

        Ok(sorted
            .into_iter()
            .rev()
            .filter_map(|idx| self.entities.get_index(idx).map(|(r, _)| r))
            .collect())
    }
}

/// Mutable builder used by discovery; consumed into a [`DiscoveryGraph`].
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    root: EntityRef,
    entities: IndexMap<EntityRef, EntityNode>,
    adjacency: Adjacency,
}

impl GraphBuilder {
    pub fn new(root: EntityRef) -> Self {
        GraphBuilder {
            root,
            entities: IndexMap::new(),
            adjacency: IndexMap::new(),
        }
    }

    pub fn root(&self) -> &EntityRef {
        &self.root
    }

    pub fn contains(&self, entity_ref: &EntityRef) -> bool {
        self.entities.contains_key(entity_ref)
    }

    /// Inserts `node` unless its ref is already present, and makes sure it
    /// has an adjacency entry. Returns true if the node was new.
    pub fn put_if_absent(&mut self, node: EntityNode) -> bool {
        let key = node.entity_ref.clone();
        self.adjacency.entry(key.clone()).or_default();
        if self.entities.contains_key(&key) {
            return false;
        }
        self.entities.insert(key, node);
        true
    }

    /// Adds the `parent -> child` edge. Returns true if the edge was new.
    pub fn link(&mut self, parent: &EntityRef, child: &EntityRef) -> bool {
        self.adjacency
            .entry(parent.clone())
            .or_default()
            .insert(child.clone())
    }

    pub fn node_count(&self) -> usize {
        self.entities.len()
    }

    pub fn build(self) -> DiscoveryGraph {
        DiscoveryGraph {
            root: self.root,
            entities: self.entities,
            adjacency: self.adjacency,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::SourceEntity;

    fn node(kind: EntityType, id: &str) -> EntityNode {
        EntityNode::from_entity(SourceEntity {
            id: id.to_string(),
            kind,
            name: id.to_string(),
            app_id: None,
            spec: serde_json::Value::Null,
            references: Vec::new(),
        })
    }

    fn r(kind: EntityType, id: &str) -> EntityRef {
        EntityRef::new(kind, id)
    }

    /// W -> S -> C and W -> E -> C.
    fn diamond() -> DiscoveryGraph {
        let w = r(EntityType::Workflow, "w");
        let s = r(EntityType::Service, "s");
        let e = r(EntityType::Environment, "e");
        let c = r(EntityType::Connector, "c");

        let mut b = GraphBuilder::new(w.clone());
        b.put_if_absent(node(EntityType::Workflow, "w"));
        b.put_if_absent(node(EntityType::Service, "s"));
        b.link(&w, &s);
        b.put_if_absent(node(EntityType::Connector, "c"));
        b.link(&s, &c);
        b.put_if_absent(node(EntityType::Environment, "e"));
        b.link(&w, &e);
        assert!(!b.put_if_absent(node(EntityType::Connector, "c")));
        b.link(&e, &c);
        b.build()
    }

    #[test]
    fn test_put_if_absent_is_idempotent() {
        let g = diamond();
        assert_eq!(g.node_count(), 4);
        assert_eq!(g.edge_count(), 4);
        assert_eq!(g.adjacency().len(), 4);
    }

    #[test]
    fn test_incoming_edges() {
        let g = diamond();
        let c = r(EntityType::Connector, "c");
        let mut parents: Vec<String> = g.incoming(&c).iter().map(|p| p.to_string()).collect();
        parents.sort();
        assert_eq!(parents, vec!["ENVIRONMENT:e", "SERVICE:s"]);
    }

    #[test]
    fn test_dependency_order_puts_children_first() {
        let g = diamond();
        let order = g.dependency_order().unwrap();
        let pos = |k: EntityType, id: &str| order.iter().position(|x| **x == r(k, id)).unwrap();
        assert!(pos(EntityType::Connector, "c") < pos(EntityType::Service, "s"));
        assert!(pos(EntityType::Connector, "c") < pos(EntityType::Environment, "e"));
        assert!(pos(EntityType::Service, "s") < pos(EntityType::Workflow, "w"));
        assert!(g.validate().is_ok());
    }

    #[test]
    fn test_validate_detects_cycle() {
        let a = r(EntityType::Service, "a");
        let b_ref = r(EntityType::Service, "b");
        let mut b = GraphBuilder::new(a.clone());
        b.put_if_absent(node(EntityType::Service, "a"));
        b.put_if_absent(node(EntityType::Service, "b"));
        b.link(&a, &b_ref);
        b.link(&b_ref, &a);
        let g = b.build();
        assert!(matches!(g.validate(), Err(CoreError::Cycle { .. })));
    }

    #[test]
    fn test_validate_detects_dangling_edge() {
        let a = r(EntityType::Service, "a");
        let mut b = GraphBuilder::new(a.clone());
        b.put_if_absent(node(EntityType::Service, "a"));
        b.link(&a, &r(EntityType::Connector, "ghost"));
        let g = b.build();
        assert!(matches!(
            g.validate(),
            Err(CoreError::GraphInconsistency { .. })
        ));
    }

    #[test]
    fn test_count_by_type_skips_dummy_head() {
        let mut b = GraphBuilder::new(EntityRef::dummy_head());
        b.put_if_absent(EntityNode::dummy_head());
        b.put_if_absent(node(EntityType::Secret, "s1"));
        b.link(&EntityRef::dummy_head(), &r(EntityType::Secret, "s1"));
        let counts = b.build().count_by_type();
        assert_eq!(counts.len(), 1);
        assert_eq!(counts[&EntityType::Secret], 1);
    }

    #[test]
    fn test_graph_json_roundtrip_keeps_ref_keys() {
        let g = diamond();
        let json = serde_json::to_value(&g).unwrap();
        assert!(json["adjacency"]["WORKFLOW:w"].is_array());
        let back: DiscoveryGraph = serde_json::from_value(json).unwrap();
        assert_eq!(back.edge_count(), g.edge_count());
        assert_eq!(back.root(), g.root());
    }
}
