//! Vertices of a workflow graph.
//!
//! A vertex is a unit of work: an ordered list of opaque operations plus
//! optional branching metadata. Relationships to other vertices are stored as
//! [`VertexKey`]s into the owning graph's arena, never as owning references.

use core::fmt;
use std::sync::Arc;

use hashbrown::{HashMap, HashSet};
use indexmap::IndexMap;

use crate::operation::{
    Aggregator, BoxError, BoxedOperation, Condition, ForEach, Forwarder, Operation,
    default_forwarder,
};
use crate::workflow::GraphKey;

/// Position of a vertex in its graph's arena.
///
/// Keys are assigned in creation order and stay stable for the lifetime of the
/// graph. They are only meaningful within the graph that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexKey(pub(crate) usize);

impl VertexKey {
    /// Creates a vertex key from a raw arena position.
    #[must_use]
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the raw arena position.
    #[must_use]
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for VertexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vertex_{}", self.0)
    }
}

/// A vertex addressed across the whole workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexRef {
    /// The graph holding the vertex.
    pub graph: GraphKey,
    /// The vertex within that graph.
    pub vertex: VertexKey,
}

/// A vertex in a workflow graph.
///
/// Vertices are created through [`Graph::add_vertex`](crate::graph::Graph::add_vertex)
/// or implicitly by [`Graph::add_edge`](crate::graph::Graph::add_edge), and live
/// as long as their graph.
pub struct Vertex {
    pub(crate) id: String,
    pub(crate) key: VertexKey,
    pub(crate) index: usize,
    pub(crate) graph: GraphKey,

    pub(crate) operations: Vec<BoxedOperation>,

    pub(crate) dynamic: bool,
    pub(crate) aggregator: Option<Aggregator>,
    pub(crate) foreach: Option<ForEach>,
    pub(crate) condition: Option<Condition>,
    pub(crate) sub_aggregator: Option<Aggregator>,
    pub(crate) forwarders: IndexMap<String, Option<Forwarder>>,

    pub(crate) sub_graph: Option<GraphKey>,
    pub(crate) conditional_graphs: IndexMap<String, GraphKey>,

    pub(crate) indegree: usize,
    pub(crate) outdegree: usize,
    pub(crate) children: Vec<VertexKey>,
    pub(crate) depends_on: Vec<VertexKey>,
    pub(crate) ancestors: HashSet<VertexKey>,
    pub(crate) descendants: HashSet<VertexKey>,
}

impl Vertex {
    pub(crate) fn new(
        id: String,
        key: VertexKey,
        index: usize,
        graph: GraphKey,
        operations: Vec<BoxedOperation>,
    ) -> Self {
        Self {
            id,
            key,
            index,
            graph,
            operations,
            dynamic: false,
            aggregator: None,
            foreach: None,
            condition: None,
            sub_aggregator: None,
            forwarders: IndexMap::new(),
            sub_graph: None,
            conditional_graphs: IndexMap::new(),
            indegree: 0,
            outdegree: 0,
            children: Vec::new(),
            depends_on: Vec::new(),
            ancestors: HashSet::new(),
            descendants: HashSet::new(),
        }
    }

    /// Re-homes the vertex into another graph, dropping every relationship.
    ///
    /// Operations, capabilities and nested graph keys survive.
    pub(crate) fn rehome(&mut self, graph: GraphKey, key: VertexKey, index: usize) {
        self.graph = graph;
        self.key = key;
        self.index = index;
        self.indegree = 0;
        self.outdegree = 0;
        self.children.clear();
        self.depends_on.clear();
        self.ancestors.clear();
        self.descendants.clear();
        self.forwarders.clear();
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    /// Returns the vertex id, unique within its graph.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the vertex's arena key.
    #[must_use]
    pub fn key(&self) -> VertexKey {
        self.key
    }

    /// Returns the 1-based creation index within the owning graph.
    #[must_use]
    pub fn creation_index(&self) -> usize {
        self.index
    }

    /// Returns the graph this vertex belongs to.
    #[must_use]
    pub fn owning_graph(&self) -> GraphKey {
        self.graph
    }

    /// Returns the ordered operations.
    #[must_use]
    pub fn operations(&self) -> &[BoxedOperation] {
        &self.operations
    }

    /// Returns true if a foreach or condition function is attached.
    #[must_use]
    pub fn dynamic(&self) -> bool {
        self.dynamic
    }

    /// Returns the number of incoming edges.
    #[must_use]
    pub fn indegree(&self) -> usize {
        self.indegree
    }

    /// Returns the number of outgoing edges.
    #[must_use]
    pub fn outdegree(&self) -> usize {
        self.outdegree
    }

    /// Returns the direct successors, in edge insertion order.
    #[must_use]
    pub fn children(&self) -> &[VertexKey] {
        &self.children
    }

    /// Returns the direct predecessors, in edge insertion order.
    #[must_use]
    pub fn depends_on(&self) -> &[VertexKey] {
        &self.depends_on
    }

    /// Returns every vertex this one transitively depends on.
    #[must_use]
    pub fn ancestors(&self) -> &HashSet<VertexKey> {
        &self.ancestors
    }

    /// Returns every vertex transitively reachable from this one.
    #[must_use]
    pub fn descendants(&self) -> &HashSet<VertexKey> {
        &self.descendants
    }

    /// Returns the plain sub-graph, if any.
    #[must_use]
    pub fn sub_graph(&self) -> Option<GraphKey> {
        self.sub_graph
    }

    /// Returns the conditional sub-graph registered under `label`.
    #[must_use]
    pub fn conditional_graph(&self, label: &str) -> Option<GraphKey> {
        self.conditional_graphs.get(label).copied()
    }

    /// Returns every conditional sub-graph, in attachment order.
    #[must_use]
    pub fn conditional_graphs(&self) -> &IndexMap<String, GraphKey> {
        &self.conditional_graphs
    }

    /// Returns the aggregator, if any.
    #[must_use]
    pub fn aggregator(&self) -> Option<&Aggregator> {
        self.aggregator.as_ref()
    }

    /// Returns the foreach function, if any.
    #[must_use]
    pub fn foreach(&self) -> Option<&ForEach> {
        self.foreach.as_ref()
    }

    /// Returns the condition function, if any.
    #[must_use]
    pub fn condition(&self) -> Option<&Condition> {
        self.condition.as_ref()
    }

    /// Returns the sub-aggregator, if any.
    #[must_use]
    pub fn sub_aggregator(&self) -> Option<&Aggregator> {
        self.sub_aggregator.as_ref()
    }

    /// Returns the forwarder for the edge to `child`.
    ///
    /// The outer `None` means no forwarder was ever recorded for `child`. An
    /// inner `None` marks a control-only edge.
    #[must_use]
    pub fn forwarder(&self, child: &str) -> Option<Option<&Forwarder>> {
        self.forwarders.get(child).map(Option::as_ref)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Capability setters
    // ─────────────────────────────────────────────────────────────────────────

    /// Appends an operation.
    pub fn add_operation(&mut self, operation: impl Operation + 'static) -> &mut Self {
        self.operations.push(Box::new(operation));
        self
    }

    /// Records the aggregator that merges this vertex's named inputs.
    pub fn set_aggregator<F>(&mut self, aggregator: F) -> &mut Self
    where
        F: Fn(&HashMap<String, Vec<u8>>) -> Result<Vec<u8>, BoxError> + Send + Sync + 'static,
    {
        self.aggregator = Some(Arc::new(aggregator));
        self
    }

    /// Records the aggregator that merges foreach/condition outputs.
    pub fn set_sub_aggregator<F>(&mut self, aggregator: F) -> &mut Self
    where
        F: Fn(&HashMap<String, Vec<u8>>) -> Result<Vec<u8>, BoxError> + Send + Sync + 'static,
    {
        self.sub_aggregator = Some(Arc::new(aggregator));
        self
    }

    /// Records a foreach split and marks the vertex dynamic.
    pub fn set_foreach<F>(&mut self, foreach: F) -> &mut Self
    where
        F: Fn(&[u8]) -> HashMap<String, Vec<u8>> + Send + Sync + 'static,
    {
        self.foreach = Some(Arc::new(foreach));
        self.dynamic = true;
        self
    }

    /// Records a condition and marks the vertex dynamic.
    pub fn set_condition<F>(&mut self, condition: F) -> &mut Self
    where
        F: Fn(&[u8]) -> Vec<String> + Send + Sync + 'static,
    {
        self.condition = Some(Arc::new(condition));
        self.dynamic = true;
        self
    }

    /// Records the default identity forwarder for a new edge.
    pub(crate) fn record_default_forwarder(&mut self, child: &str) {
        self.forwarders
            .insert(child.to_string(), Some(default_forwarder()));
    }

    pub(crate) fn record_forwarder(&mut self, child: &str, forwarder: Option<Forwarder>) {
        self.forwarders.insert(child.to_string(), forwarder);
    }

    /// Re-keys the forwarder slot of a renamed child, keeping its position.
    pub(crate) fn rename_forwarder(&mut self, from: &str, to: &str) {
        self.forwarders = core::mem::take(&mut self.forwarders)
            .into_iter()
            .map(|(child, forwarder)| {
                if child == from {
                    (to.to_string(), forwarder)
                } else {
                    (child, forwarder)
                }
            })
            .collect();
    }
}

impl fmt::Debug for Vertex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vertex")
            .field("id", &self.id)
            .field("index", &self.index)
            .field("graph", &self.graph)
            .field("operations", &self.operations)
            .field("dynamic", &self.dynamic)
            .field("indegree", &self.indegree)
            .field("outdegree", &self.outdegree)
            .field("sub_graph", &self.sub_graph)
            .field("conditional_graphs", &self.conditional_graphs)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::Modifier;

    fn vertex(id: &str) -> Vertex {
        Vertex::new(id.to_string(), VertexKey::new(0), 1, GraphKey::new(0), Vec::new())
    }

    #[test]
    fn vertex_key_display() {
        assert_eq!(format!("{}", VertexKey::new(7)), "vertex_7");
    }

    #[test]
    fn foreach_and_condition_mark_dynamic() {
        let mut v = vertex("split");
        assert!(!v.dynamic());
        v.set_foreach(|_| HashMap::new());
        assert!(v.dynamic());
        assert!(v.foreach().is_some());

        let mut v = vertex("route");
        v.set_condition(|_| vec!["left".to_string()]);
        assert!(v.dynamic());
        assert!(v.condition().is_some());
    }

    #[test]
    fn aggregators_do_not_mark_dynamic() {
        let mut v = vertex("join");
        v.set_aggregator(|_| Ok(Vec::new()))
            .set_sub_aggregator(|_| Ok(Vec::new()));
        assert!(!v.dynamic());
        assert!(v.aggregator().is_some());
        assert!(v.sub_aggregator().is_some());
    }

    #[test]
    fn operations_keep_insertion_order() {
        let mut v = vertex("work");
        v.add_operation(Modifier::new("first", |d| Ok(d.to_vec())))
            .add_operation(Modifier::blank());
        let names: Vec<&str> = v.operations().iter().map(|op| op.name()).collect();
        assert_eq!(names, ["first", Modifier::BLANK]);
    }

    #[test]
    fn forwarder_distinguishes_missing_and_control_only() {
        let mut v = vertex("a");
        assert!(v.forwarder("b").is_none());
        v.record_default_forwarder("b");
        assert!(matches!(v.forwarder("b"), Some(Some(_))));
        v.record_forwarder("b", None);
        assert!(matches!(v.forwarder("b"), Some(None)));
    }

    #[test]
    fn rehome_drops_relationships_but_keeps_capabilities() {
        let mut v = vertex("a");
        v.set_condition(|_| Vec::new());
        v.children.push(VertexKey::new(3));
        v.descendants.insert(VertexKey::new(3));
        v.outdegree = 1;
        v.record_default_forwarder("c");

        v.rehome(GraphKey::new(4), VertexKey::new(2), 9);

        assert_eq!(v.owning_graph(), GraphKey::new(4));
        assert_eq!(v.key(), VertexKey::new(2));
        assert_eq!(v.creation_index(), 9);
        assert!(v.children().is_empty());
        assert!(v.descendants().is_empty());
        assert_eq!(v.outdegree(), 0);
        assert!(v.forwarder("c").is_none());
        assert!(v.dynamic());
    }
}
