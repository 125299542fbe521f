//! Property tests: leaf stripping orders every dependency before its
//! dependents and terminates within |V| passes on any DAG.

use std::sync::Arc;

use parking_lot::Mutex;
use proptest::prelude::*;

use ngmig_core::{DiscoveryGraph, EntityNode, EntityRef, EntityType, GraphBuilder, SourceEntity};
use ngmig_engine::{InMemorySourceRepository, MigrationEngine, MigrationInput};
use ngmig_storage::InMemoryStore;

const KINDS: [EntityType; 4] = [
    EntityType::Pipeline,
    EntityType::Workflow,
    EntityType::Service,
    EntityType::ArtifactStream,
];

/// A random DAG: edges only point from lower to higher indices.
fn dag() -> impl Strategy<Value = (Vec<EntityType>, Vec<(usize, usize)>)> {
    (2usize..14).prop_flat_map(|n| {
        let kinds = prop::collection::vec(prop::sample::select(KINDS.to_vec()), n);
        let edges = prop::collection::vec((0..n, 0..n), 0..n * 2).prop_map(|pairs| {
            pairs
                .into_iter()
                .filter(|(a, b)| a != b)
                .map(|(a, b)| (a.min(b), a.max(b)))
                .collect::<Vec<_>>()
        });
        (kinds, edges)
    })
}

fn build(kinds: &[EntityType], edges: &[(usize, usize)]) -> DiscoveryGraph {
    let refs: Vec<EntityRef> = kinds
        .iter()
        .enumerate()
        .map(|(i, k)| EntityRef::new(*k, format!("e{i}")))
        .collect();
    let mut builder = GraphBuilder::new(refs[0].clone());
    for (i, r) in refs.iter().enumerate() {
        builder.put_if_absent(EntityNode::from_entity(SourceEntity {
            id: r.id.clone(),
            kind: r.kind,
            name: format!("entity {i}"),
            app_id: Some("app".into()),
            spec: serde_json::json!({}),
            references: Vec::new(),
        }));
    }
    for (parent, child) in edges {
        builder.link(&refs[*parent], &refs[*child]);
    }
    builder.build()
}

proptest! {
    #[test]
    fn children_generated_before_parents((kinds, edges) in dag()) {
        let graph = build(&kinds, &edges);
        let engine = MigrationEngine::generic(
            Arc::new(InMemorySourceRepository::new()),
            Arc::new(Mutex::new(InMemoryStore::new())),
        );
        let plan = engine.plan(&graph, &MigrationInput::new("acc")).unwrap();

        prop_assert!(plan.leaf_passes <= graph.node_count());
        prop_assert_eq!(plan.generation_order.len(), graph.node_count());
        for (parent, children) in graph.adjacency() {
            for child in children {
                let p = plan.position(parent);
                let c = plan.position(child);
                prop_assert!(c < p, "{} must precede {}", child, parent);
            }
        }
    }
}
