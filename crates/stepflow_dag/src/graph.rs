//! Graph structure and edge insertion.
//!
//! A [`Graph`] is an arena of [`Vertex`] values addressed by [`VertexKey`],
//! plus the bookkeeping validation fills in (start and end vertex). Edges are
//! inserted one at a time and every insertion keeps each vertex's ancestor and
//! descendant sets exact, so cycle checks are set lookups rather than a fresh
//! traversal.
//!
//! Graphs never own other graphs. Nested graphs live in the same
//! [`Workflow`](crate::workflow::Workflow) arena and are referenced by key.

use hashbrown::HashMap;

use crate::error::GraphError;
use crate::operation::{BoxedOperation, Forwarder};
use crate::vertex::{Vertex, VertexKey, VertexRef};
use crate::workflow::GraphKey;

/// Id carried by every graph that is not nested under a vertex.
pub const ROOT_GRAPH_ID: &str = "0";

/// A directed acyclic graph of vertices.
///
/// # Example
///
/// ```
/// use stepflow_dag::workflow::Workflow;
///
/// let mut workflow = Workflow::new();
/// let key = workflow.new_graph();
/// let graph = workflow.graph_mut(key).unwrap();
/// graph.add_edge("fetch", "parse").unwrap();
/// graph.add_edge("parse", "store").unwrap();
///
/// assert!(graph.add_edge("store", "fetch").is_err());
/// ```
#[derive(Debug)]
pub struct Graph {
    /// This graph's key in the owning workflow.
    key: GraphKey,
    /// Hierarchical id, `"0"` until the graph is nested.
    pub(crate) id: String,
    /// Vertex arena, in creation order.
    pub(crate) vertices: Vec<Vertex>,
    /// Vertex id to arena position.
    lookup: HashMap<String, VertexKey>,
    /// The vertex this graph is nested under.
    pub(crate) parent: Option<VertexRef>,
    /// Start vertex, set by validation.
    pub(crate) initial: Option<VertexKey>,
    /// End vertex, set by validation.
    pub(crate) end: Option<VertexKey>,
    /// True while no edge carries an explicitly assigned forwarder.
    pub(crate) execution_flow: bool,
    /// Creation index handed to the last vertex.
    next_index: usize,
}

impl Graph {
    pub(crate) fn new(key: GraphKey) -> Self {
        Self {
            key,
            id: ROOT_GRAPH_ID.to_string(),
            vertices: Vec::new(),
            lookup: HashMap::new(),
            parent: None,
            initial: None,
            end: None,
            execution_flow: true,
            next_index: 0,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    /// Returns this graph's key in its workflow.
    #[must_use]
    pub fn key(&self) -> GraphKey {
        self.key
    }

    /// Returns the hierarchical graph id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns true if the graph is not nested under a vertex.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Returns the vertex this graph is nested under.
    #[must_use]
    pub fn parent_vertex(&self) -> Option<VertexRef> {
        self.parent
    }

    /// Returns the number of vertices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    /// Returns true if the graph has no vertices.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Returns true while no edge carries an explicitly assigned forwarder.
    #[must_use]
    pub fn is_execution_flow(&self) -> bool {
        self.execution_flow
    }

    /// Returns true if validation resolved a start and an end vertex and no
    /// structural change happened since.
    #[must_use]
    pub fn is_validated(&self) -> bool {
        self.initial.is_some() && self.end.is_some()
    }

    /// Returns the start vertex resolved by validation.
    #[must_use]
    pub fn initial_vertex(&self) -> Option<&Vertex> {
        self.initial.map(|key| &self.vertices[key.0])
    }

    /// Returns the end vertex resolved by validation.
    #[must_use]
    pub fn end_vertex(&self) -> Option<&Vertex> {
        self.end.map(|key| &self.vertices[key.0])
    }

    /// Looks up a vertex by id.
    #[must_use]
    pub fn vertex(&self, id: &str) -> Option<&Vertex> {
        self.lookup.get(id).map(|key| &self.vertices[key.0])
    }

    /// Looks up a vertex by id for capability updates.
    #[must_use]
    pub fn vertex_mut(&mut self, id: &str) -> Option<&mut Vertex> {
        let key = *self.lookup.get(id)?;
        Some(&mut self.vertices[key.0])
    }

    /// Looks up a vertex by arena key.
    #[must_use]
    pub fn vertex_by_key(&self, key: VertexKey) -> Option<&Vertex> {
        self.vertices.get(key.0)
    }

    /// Returns the arena key of a vertex.
    #[must_use]
    pub fn key_of(&self, id: &str) -> Option<VertexKey> {
        self.lookup.get(id).copied()
    }

    /// Returns true if a vertex with this id exists.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.lookup.contains_key(id)
    }

    /// Iterates over vertices in creation order.
    pub fn vertices(&self) -> impl Iterator<Item = &Vertex> {
        self.vertices.iter()
    }

    /// Iterates over the direct successors of a vertex.
    ///
    /// Yields nothing for a vertex owned by another graph.
    pub fn children_of<'a>(&'a self, vertex: &'a Vertex) -> impl Iterator<Item = &'a Vertex> {
        self.resolve_keys(vertex, &vertex.children)
    }

    /// Iterates over the direct predecessors of a vertex.
    ///
    /// Yields nothing for a vertex owned by another graph.
    pub fn depends_on_of<'a>(&'a self, vertex: &'a Vertex) -> impl Iterator<Item = &'a Vertex> {
        self.resolve_keys(vertex, &vertex.depends_on)
    }

    fn resolve_keys<'a>(
        &'a self,
        vertex: &Vertex,
        keys: &'a [VertexKey],
    ) -> impl Iterator<Item = &'a Vertex> {
        let keys: &[VertexKey] = if vertex.graph == self.key { keys } else { &[] };
        keys.iter().filter_map(|key| self.vertices.get(key.0))
    }

    /// Returns the vertex id qualified by graph id and creation index.
    ///
    /// The result, `<graph_id>.<creation_index>.<vertex_id>`, is unique across
    /// a whole nesting tree even though vertex ids are only unique per graph.
    #[must_use]
    pub fn qualified_id(&self, vertex: &Vertex) -> String {
        format!("{}.{}.{}", self.id, vertex.index, vertex.id)
    }

    fn require(&self, id: &str) -> Result<VertexKey, GraphError> {
        self.key_of(id).ok_or_else(|| GraphError::UnknownVertex {
            graph: self.id.clone(),
            vertex: id.to_string(),
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Builder API
    // ─────────────────────────────────────────────────────────────────────────

    /// Creates a vertex with the given operations.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::DuplicateVertex`] if the id is already taken.
    pub fn add_vertex(
        &mut self,
        id: impl Into<String>,
        operations: Vec<BoxedOperation>,
    ) -> Result<VertexKey, GraphError> {
        let id = id.into();
        if self.lookup.contains_key(&id) {
            return Err(GraphError::DuplicateVertex(id));
        }
        Ok(self.push_vertex(id, operations))
    }

    /// Inserts a fresh vertex without the duplicate check.
    pub(crate) fn push_vertex(&mut self, id: String, operations: Vec<BoxedOperation>) -> VertexKey {
        let key = VertexKey(self.vertices.len());
        self.next_index += 1;
        self.lookup.insert(id.clone(), key);
        self.vertices
            .push(Vertex::new(id, key, self.next_index, self.key, operations));
        self.invalidate();
        key
    }

    /// Moves an already built vertex into this graph, assigning a fresh key
    /// and creation index.
    pub(crate) fn adopt_vertex(&mut self, mut vertex: Vertex) -> VertexKey {
        let key = VertexKey(self.vertices.len());
        self.next_index += 1;
        vertex.rehome(self.key, key, self.next_index);
        self.lookup.insert(vertex.id.clone(), key);
        self.vertices.push(vertex);
        self.invalidate();
        key
    }

    /// Removes every vertex, handing them to the caller in creation order.
    pub(crate) fn take_vertices(&mut self) -> Vec<Vertex> {
        self.lookup.clear();
        self.invalidate();
        std::mem::take(&mut self.vertices)
    }

    /// Adds a directed edge `from -> to`.
    ///
    /// Unknown ids are created as vertices without operations, which allows
    /// declaring a graph purely through its edges. The new edge records the
    /// identity forwarder; [`set_forwarder`](Self::set_forwarder) overrides it.
    ///
    /// Both checks run before anything is created, so a rejected edge leaves
    /// the graph exactly as it was.
    ///
    /// # Errors
    ///
    /// - [`GraphError::DuplicateEdge`] if the edge already exists
    /// - [`GraphError::Cyclic`] if `to` already reaches `from`, or `from == to`
    pub fn add_edge(&mut self, from: &str, to: &str) -> Result<(), GraphError> {
        if from == to {
            return Err(GraphError::Cyclic {
                from: from.to_string(),
                to: to.to_string(),
            });
        }

        if let (Some(from_key), Some(to_key)) = (self.key_of(from), self.key_of(to)) {
            self.check_edge(from_key, to_key)?;
        }

        let from_key = self.key_of(from).unwrap_or_else(|| self.implicit_vertex(from));
        let to_key = self.key_of(to).unwrap_or_else(|| self.implicit_vertex(to));

        self.link(from_key, to_key);
        self.vertices[from_key.0].record_default_forwarder(to);
        Ok(())
    }

    /// Inserts a control-only edge between existing vertices.
    ///
    /// Used by validation to wire natural end vertices into a merge vertex.
    /// The edge records no forwarder and leaves `execution_flow` alone.
    pub(crate) fn add_control_edge(
        &mut self,
        from: VertexKey,
        to: VertexKey,
    ) -> Result<(), GraphError> {
        self.check_edge(from, to)?;
        self.link(from, to);
        let to_id = self.vertices[to.0].id.clone();
        self.vertices[from.0].record_forwarder(&to_id, None);
        Ok(())
    }

    /// Assigns the forwarder for the edge `vertex -> child`.
    ///
    /// Passing `None` marks the edge as execution-order only. Any explicit
    /// assignment turns the graph's execution flow off for good.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::UnknownVertex`] if `vertex` does not exist.
    pub fn set_forwarder(
        &mut self,
        vertex: &str,
        child: &str,
        forwarder: Option<Forwarder>,
    ) -> Result<(), GraphError> {
        let key = self.require(vertex)?;
        self.vertices[key.0].record_forwarder(child, forwarder);
        if self.execution_flow {
            tracing::debug!(graph = %self.id, vertex, child, "graph switched to data flow");
        }
        self.execution_flow = false;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internal helpers
    // ─────────────────────────────────────────────────────────────────────────

    fn implicit_vertex(&mut self, id: &str) -> VertexKey {
        tracing::debug!(graph = %self.id, vertex = id, "implicitly creating vertex for edge");
        self.push_vertex(id.to_string(), Vec::new())
    }

    fn check_edge(&self, from: VertexKey, to: VertexKey) -> Result<(), GraphError> {
        let source = &self.vertices[from.0];
        let target = &self.vertices[to.0];

        if source.children.contains(&to) || target.depends_on.contains(&from) {
            return Err(GraphError::DuplicateEdge {
                from: source.id.clone(),
                to: target.id.clone(),
            });
        }

        if from == to || source.ancestors.contains(&to) || target.descendants.contains(&from) {
            return Err(GraphError::Cyclic {
                from: source.id.clone(),
                to: target.id.clone(),
            });
        }

        Ok(())
    }

    /// Wires adjacency, degrees and the transitive closure for `from -> to`.
    fn link(&mut self, from: VertexKey, to: VertexKey) {
        // `from` and everything above it gain `to` and everything below it.
        let upstream: Vec<VertexKey> = core::iter::once(from)
            .chain(self.vertices[from.0].ancestors.iter().copied())
            .collect();
        let downstream: Vec<VertexKey> = core::iter::once(to)
            .chain(self.vertices[to.0].descendants.iter().copied())
            .collect();

        for key in &upstream {
            self.vertices[key.0]
                .descendants
                .extend(downstream.iter().copied());
        }
        for key in &downstream {
            self.vertices[key.0]
                .ancestors
                .extend(upstream.iter().copied());
        }

        let source = &mut self.vertices[from.0];
        source.children.push(to);
        source.outdegree += 1;

        let target = &mut self.vertices[to.0];
        target.depends_on.push(from);
        target.indegree += 1;

        self.invalidate();

        tracing::trace!(
            graph = %self.id,
            from = %self.vertices[from.0].id,
            to = %self.vertices[to.0].id,
            upstream = upstream.len(),
            downstream = downstream.len(),
            "edge linked"
        );
    }

    /// Drops the validated start and end, the structure changed under them.
    /// Moves the graph to a new hierarchical id.
    ///
    /// A merge vertex synthesized under the old id is renamed along with the
    /// graph unless the new name is already in use.
    pub(crate) fn set_id(&mut self, id: String) {
        let old_merge = format!("end-{}", self.id);
        let new_merge = format!("end-{id}");
        self.id = id;

        let Some(end) = self.end else {
            return;
        };
        if self.vertices[end.0].id != old_merge || self.lookup.contains_key(&new_merge) {
            return;
        }

        self.lookup.remove(&old_merge);
        self.lookup.insert(new_merge.clone(), end);
        for parent in self.vertices[end.0].depends_on.clone() {
            self.vertices[parent.0].rename_forwarder(&old_merge, &new_merge);
        }
        tracing::debug!(graph = %self.id, from = %old_merge, to = %new_merge, "renamed merge vertex");
        self.vertices[end.0].id = new_merge;
    }

    fn invalidate(&mut self) {
        self.initial = None;
        self.end = None;
    }
}
