//! Integration tests for hierarchical composition.
//!
//! Covers nesting graphs under vertices, the recursive-inclusion check at any
//! depth, id namespacing across a whole tree, appending one graph into another
//! and the flattening query.


use hashbrown::{HashMap, HashSet};
use stepflow_dag::error::GraphError;
use stepflow_dag::workflow::{GraphKey, Workflow};
use test_utils::{graph_from_edges, step};

// ═══════════════════════════════════════════════════════════════════════════════
// RECURSION
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn nesting_a_graph_inside_its_own_descendant_fails_at_depth() {
    let mut workflow = Workflow::new();
    let top = graph_from_edges(&mut workflow, &[("a", "b")]);
    let mid = graph_from_edges(&mut workflow, &[("c", "d")]);
    let low = graph_from_edges(&mut workflow, &[("e", "f")]);
    workflow.attach_sub_graph(top, "b", mid).unwrap();
    workflow.attach_sub_graph(mid, "d", low).unwrap();

    assert_eq!(
        workflow.attach_sub_graph(low, "f", top),
        Err(GraphError::RecursiveDependency("0".to_string()))
    );
    assert!(matches!(
        workflow.attach_conditional_graph(low, "e", "again", mid),
        Err(GraphError::RecursiveDependency(_))
    ));

    // Nothing was recorded by the failed attempts.
    let low_graph = workflow.graph(low).unwrap();
    assert!(low_graph.vertex("f").unwrap().sub_graph().is_none());
    assert!(low_graph.vertex("e").unwrap().conditional_graphs().is_empty());
    assert!(workflow.graph(top).unwrap().is_root());
}

#[test]
fn unrelated_graphs_nest_freely() {
    let mut workflow = Workflow::new();
    let top = graph_from_edges(&mut workflow, &[("a", "b")]);
    let left = graph_from_edges(&mut workflow, &[("l", "m")]);
    let right = graph_from_edges(&mut workflow, &[("r", "s")]);

    workflow.attach_sub_graph(top, "a", left).unwrap();
    workflow.attach_sub_graph(top, "b", right).unwrap();
    workflow.validate(top).unwrap();

    assert_eq!(workflow.graph(left).unwrap().id(), "1");
    assert_eq!(workflow.graph(right).unwrap().id(), "2");
}

// ═══════════════════════════════════════════════════════════════════════════════
// NAMESPACING
// ═══════════════════════════════════════════════════════════════════════════════

/// Builds a three-level tree where every graph reuses the same vertex ids.
fn repeated_id_tree(workflow: &mut Workflow) -> GraphKey {
    let root = graph_from_edges(workflow, &[("start", "work"), ("work", "done")]);
    let body = graph_from_edges(workflow, &[("start", "work"), ("work", "done")]);
    let inner = graph_from_edges(workflow, &[("start", "work"), ("work", "done")]);
    workflow.attach_sub_graph(body, "work", inner).unwrap();
    workflow.attach_sub_graph(root, "work", body).unwrap();
    root
}

#[test]
fn qualified_ids_are_unique_across_the_tree() {
    let mut workflow = Workflow::new();
    let root = repeated_id_tree(&mut workflow);
    workflow.validate(root).unwrap();

    let ids = workflow.flattened_ids(root, None).unwrap();
    let unique: HashSet<&String> = ids.iter().collect();
    assert_eq!(ids.len(), 9);
    assert_eq!(unique.len(), ids.len());
    assert_eq!(
        ids,
        [
            "0.1.start",
            "0.2.work",
            "2.1.start",
            "2.2.work",
            "2.2.1.start",
            "2.2.2.work",
            "2.2.3.done",
            "2.3.done",
            "0.3.done"
        ]
    );
}

#[test]
fn conditional_graphs_are_namespaced_by_label() {
    let mut workflow = Workflow::new();
    let root = graph_from_edges(&mut workflow, &[("check", "route")]);
    let approve = graph_from_edges(&mut workflow, &[("notify", "ship")]);
    let reject = graph_from_edges(&mut workflow, &[("notify", "refund")]);
    workflow
        .attach_conditional_graph(root, "route", "approve", approve)
        .unwrap();
    workflow
        .attach_conditional_graph(root, "route", "reject", reject)
        .unwrap();

    let approve_graph = workflow.graph(approve).unwrap();
    let reject_graph = workflow.graph(reject).unwrap();
    assert_eq!(approve_graph.id(), "2.approve");
    assert_eq!(reject_graph.id(), "2.reject");

    let notify_a = approve_graph.vertex("notify").unwrap();
    let notify_r = reject_graph.vertex("notify").unwrap();
    assert_ne!(
        approve_graph.qualified_id(notify_a),
        reject_graph.qualified_id(notify_r)
    );

    let route = workflow.graph(root).unwrap().vertex("route").unwrap();
    let labels: Vec<&str> = route.conditional_graphs().keys().map(String::as_str).collect();
    assert_eq!(labels, ["approve", "reject"]);
}

#[test]
fn parent_links_resolve_to_owning_vertex() {
    let mut workflow = Workflow::new();
    let root = repeated_id_tree(&mut workflow);
    let body = workflow
        .graph(root)
        .unwrap()
        .vertex("work")
        .unwrap()
        .sub_graph()
        .unwrap();

    let owner = workflow.parent_vertex(body).unwrap();
    assert_eq!(owner.id(), "work");
    assert_eq!(owner.owning_graph(), root);

    let link = workflow.graph(body).unwrap().parent_vertex().unwrap();
    assert_eq!(link.graph, root);
    assert_eq!(link.vertex, owner.key());
}

// ═══════════════════════════════════════════════════════════════════════════════
// APPEND
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn appended_vertices_keep_operations_and_capabilities() {
    let mut workflow = Workflow::new();
    let target = graph_from_edges(&mut workflow, &[("a", "b")]);
    let source = workflow.new_graph();
    {
        let graph = workflow.graph_mut(source).unwrap();
        graph.add_vertex("fan", vec![step("fan")]).unwrap();
        graph
            .vertex_mut("fan")
            .unwrap()
            .set_foreach(|data| HashMap::from([("all".to_string(), data.to_vec())]));
    }

    workflow.append(target, source).unwrap();

    let graph = workflow.graph_mut(target).unwrap();
    let fan = graph.vertex("fan").unwrap();
    assert_eq!(fan.operations().len(), 1);
    assert!(fan.dynamic());
    assert_eq!(fan.creation_index(), 3);
    assert_eq!(graph.qualified_id(fan), "0.3.fan");

    graph.add_edge("b", "fan").unwrap();
    assert_eq!(graph.vertex("fan").unwrap().indegree(), 1);
}

#[test]
fn appended_sub_graphs_are_renamed_recursively() {
    let mut workflow = Workflow::new();
    let target = graph_from_edges(&mut workflow, &[("a", "b"), ("b", "c")]);
    let source = graph_from_edges(&mut workflow, &[("p", "q")]);
    let nested = graph_from_edges(&mut workflow, &[("x", "y")]);
    let deeper = graph_from_edges(&mut workflow, &[("m", "n")]);
    workflow.attach_sub_graph(nested, "x", deeper).unwrap();
    workflow.attach_sub_graph(source, "q", nested).unwrap();
    assert_eq!(workflow.graph(deeper).unwrap().id(), "2.1");

    workflow.append(target, source).unwrap();

    assert_eq!(workflow.graph(nested).unwrap().id(), "5");
    assert_eq!(workflow.graph(deeper).unwrap().id(), "5.1");
    assert_eq!(workflow.graph_count(), 3);
}

#[test]
fn appending_a_graph_into_itself_collides() {
    let mut workflow = Workflow::new();
    let graph = graph_from_edges(&mut workflow, &[("a", "b")]);
    let other = graph_from_edges(&mut workflow, &[("c", "d")]);

    assert!(matches!(
        workflow.append(graph, graph),
        Err(GraphError::DuplicateVertex(_))
    ));
    workflow.append(graph, other).unwrap();
    assert_eq!(workflow.graph(graph).unwrap().len(), 4);
}

// ═══════════════════════════════════════════════════════════════════════════════
// FLATTENING
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn flattening_expands_non_dynamic_sub_graphs_only() {
    let mut workflow = Workflow::new();
    let root = graph_from_edges(&mut workflow, &[("load", "each"), ("load", "batch")]);
    let per_item = graph_from_edges(&mut workflow, &[("enrich", "score")]);
    let batch_body = graph_from_edges(&mut workflow, &[("sort", "write")]);
    workflow.attach_sub_graph(root, "each", per_item).unwrap();
    workflow.attach_sub_graph(root, "batch", batch_body).unwrap();
    workflow
        .graph_mut(root)
        .unwrap()
        .vertex_mut("each")
        .unwrap()
        .set_foreach(|data| HashMap::from([("0".to_string(), data.to_vec())]));

    let ids = workflow.flattened_ids(root, None).unwrap();
    assert_eq!(
        ids,
        ["0.1.load", "0.2.each", "0.3.batch", "3.1.sort", "3.2.write"]
    );
    assert!(!ids.iter().any(|id| id.starts_with("2.")));
}

#[test]
fn flattening_a_dynamic_body_names_one_instance() {
    let mut workflow = Workflow::new();
    let root = graph_from_edges(&mut workflow, &[("split", "join")]);
    let body = graph_from_edges(&mut workflow, &[("enrich", "score")]);
    workflow.attach_sub_graph(root, "split", body).unwrap();
    workflow
        .graph_mut(root)
        .unwrap()
        .vertex_mut("split")
        .unwrap()
        .set_foreach(|data| HashMap::from([("item-7".to_string(), data.to_vec())]));

    assert_eq!(
        workflow.flattened_ids(body, Some("item-7")).unwrap(),
        ["1.1.enrich-item-7", "1.2.score-item-7"]
    );
}
