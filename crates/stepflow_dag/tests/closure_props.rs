//! Property-based tests for incremental transitive closure.
//!
//! Random edge sequences over a small vertex pool are inserted one at a time.
//! After every accepted insertion each vertex's ancestor and descendant sets
//! must equal a from-scratch walk of the adjacency lists. Every rejected
//! insertion must report the right error and leave the graph untouched.


use hashbrown::HashSet;
use proptest::prelude::*;
use stepflow_dag::error::GraphError;
use stepflow_dag::graph::Graph;
use stepflow_dag::vertex::VertexKey;
use stepflow_dag::workflow::Workflow;
use test_utils::{reachable_from, reaching};

/// Everything an edge insertion may touch, per vertex in creation order.
#[derive(Debug, PartialEq, Eq)]
struct VertexState {
    id: String,
    children: Vec<VertexKey>,
    depends_on: Vec<VertexKey>,
    ancestors: HashSet<VertexKey>,
    descendants: HashSet<VertexKey>,
}

fn snapshot(graph: &Graph) -> Vec<VertexState> {
    graph
        .vertices()
        .map(|vertex| VertexState {
            id: vertex.id().to_string(),
            children: vertex.children().to_vec(),
            depends_on: vertex.depends_on().to_vec(),
            ancestors: vertex.ancestors().clone(),
            descendants: vertex.descendants().clone(),
        })
        .collect()
}

fn vertex_name(n: usize) -> String {
    format!("v{n}")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Closure sets match a fresh traversal after every accepted edge.
    #[test]
    fn prop_closure_matches_recomputation(
        edges in prop::collection::vec((0..8usize, 0..8usize), 1..40usize)
    ) {
        let mut workflow = Workflow::new();
        let key = workflow.new_graph();
        let graph = workflow.graph_mut(key).unwrap();

        for (from, to) in edges {
            let (from, to) = (vertex_name(from), vertex_name(to));
            if graph.add_edge(&from, &to).is_err() {
                continue;
            }
            for vertex in graph.vertices() {
                prop_assert_eq!(
                    vertex.descendants(),
                    &reachable_from(graph, vertex.key()),
                    "descendants of {}", vertex.id()
                );
                prop_assert_eq!(
                    vertex.ancestors(),
                    &reaching(graph, vertex.key()),
                    "ancestors of {}", vertex.id()
                );
            }
        }
    }

    /// Rejected edges report the expected error and change nothing.
    #[test]
    fn prop_rejected_edges_leave_graph_unchanged(
        edges in prop::collection::vec((0..6usize, 0..6usize), 1..40usize)
    ) {
        let mut workflow = Workflow::new();
        let key = workflow.new_graph();
        let graph = workflow.graph_mut(key).unwrap();

        for (from, to) in edges {
            let (from, to) = (vertex_name(from), vertex_name(to));

            let view: &Graph = graph;
            let existing = view.key_of(&from).zip(view.key_of(&to));
            let closes_cycle = from == to
                || existing.is_some_and(|(f, t)| reachable_from(view, t).contains(&f));
            let duplicate = existing.is_some_and(|(f, t)| {
                view.vertex_by_key(f)
                    .is_some_and(|vertex| vertex.children().contains(&t))
            });
            let before = snapshot(view);

            match graph.add_edge(&from, &to) {
                Ok(()) => {
                    prop_assert!(!closes_cycle && !duplicate);
                }
                Err(GraphError::Cyclic { .. }) => {
                    prop_assert!(closes_cycle);
                    prop_assert_eq!(&snapshot(graph), &before);
                }
                Err(GraphError::DuplicateEdge { .. }) => {
                    prop_assert!(duplicate);
                    prop_assert_eq!(&snapshot(graph), &before);
                }
                Err(other) => {
                    return Err(TestCaseError::fail(format!("unexpected error: {other}")));
                }
            }
        }
    }
}
