//! The workflow arena and hierarchical composition.
//!
//! A [`Workflow`] owns every [`Graph`] of a nesting tree. Vertices point at
//! their nested graphs by [`GraphKey`] and nested graphs point back at their
//! owning vertex through a [`VertexRef`], so no ownership cycle ever exists.
//!
//! Composition derives each nested graph's id from its position in the tree:
//!
//! | Parent graph id | Plain sub-graph | Conditional sub-graph |
//! |-----------------|-----------------|-----------------------|
//! | `"0"` (root)    | `"<index>"`     | `"<index>.<label>"`   |
//! | `p`             | `"p.<index>"`   | `"p.<index>.<label>"` |
//!
//! where `<index>` is the owning vertex's creation index.

use core::fmt;

use hashbrown::HashMap;

use crate::error::GraphError;
use crate::graph::{Graph, ROOT_GRAPH_ID};
use crate::vertex::{Vertex, VertexRef};

/// Key of a graph in its workflow arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GraphKey(pub(crate) usize);

impl GraphKey {
    /// Creates a graph key from a raw value.
    #[must_use]
    pub fn new(id: usize) -> Self {
        Self(id)
    }

    /// Returns the raw key value.
    #[must_use]
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for GraphKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "graph_{}", self.0)
    }
}

/// Which slot of a vertex a nested graph occupies.
#[derive(Debug, Clone, Copy)]
enum Slot<'a> {
    Plain,
    Conditional(&'a str),
}

/// Owner of a tree of nested graphs.
///
/// # Example
///
/// ```
/// use stepflow_dag::workflow::Workflow;
///
/// let mut workflow = Workflow::new();
/// let root = workflow.new_graph();
/// let body = workflow.new_graph();
///
/// workflow.graph_mut(body).unwrap().add_edge("load", "transform").unwrap();
/// let root_graph = workflow.graph_mut(root).unwrap();
/// root_graph.add_edge("start", "batch").unwrap();
///
/// workflow.attach_sub_graph(root, "batch", body).unwrap();
/// workflow.validate(root).unwrap();
///
/// assert_eq!(workflow.graph(body).unwrap().id(), "2");
/// ```
#[derive(Debug)]
pub struct Workflow {
    /// Every graph in the arena.
    graphs: HashMap<GraphKey, Graph>,
    /// Next key handed out by [`new_graph`](Self::new_graph).
    next_key: usize,
    /// Maximum nesting depth accepted by validation.
    pub(crate) max_nesting_depth: usize,
}

impl Default for Workflow {
    fn default() -> Self {
        Self::new()
    }
}

impl Workflow {
    /// Default maximum nesting depth accepted by validation.
    pub const DEFAULT_MAX_NESTING_DEPTH: usize = 64;

    /// Creates an empty workflow.
    #[must_use]
    pub fn new() -> Self {
        Self {
            graphs: HashMap::new(),
            next_key: 0,
            max_nesting_depth: Self::DEFAULT_MAX_NESTING_DEPTH,
        }
    }

    /// Sets the maximum nesting depth accepted by validation.
    #[must_use]
    pub fn with_max_nesting_depth(mut self, max: usize) -> Self {
        self.max_nesting_depth = max;
        self
    }

    /// Returns the maximum nesting depth accepted by validation.
    #[must_use]
    pub fn max_nesting_depth(&self) -> usize {
        self.max_nesting_depth
    }

    /// Creates an empty root graph and returns its key.
    pub fn new_graph(&mut self) -> GraphKey {
        let key = GraphKey(self.next_key);
        self.next_key += 1;
        self.graphs.insert(key, Graph::new(key));
        key
    }

    /// Returns a graph by key.
    #[must_use]
    pub fn graph(&self, key: GraphKey) -> Option<&Graph> {
        self.graphs.get(&key)
    }

    /// Returns a graph by key for mutation.
    #[must_use]
    pub fn graph_mut(&mut self, key: GraphKey) -> Option<&mut Graph> {
        self.graphs.get_mut(&key)
    }

    /// Returns the number of graphs in the arena.
    #[must_use]
    pub fn graph_count(&self) -> usize {
        self.graphs.len()
    }

    /// Iterates over graphs in key order.
    pub fn graphs(&self) -> impl Iterator<Item = &Graph> {
        let mut keys: Vec<GraphKey> = self.graphs.keys().copied().collect();
        keys.sort_unstable();
        keys.into_iter().map(|key| &self.graphs[&key])
    }

    /// Returns the vertex a graph is nested under.
    #[must_use]
    pub fn parent_vertex(&self, key: GraphKey) -> Option<&Vertex> {
        let parent = self.graphs.get(&key)?.parent?;
        self.graphs.get(&parent.graph)?.vertex_by_key(parent.vertex)
    }

    pub(crate) fn get(&self, key: GraphKey) -> Result<&Graph, GraphError> {
        self.graphs.get(&key).ok_or(GraphError::UnknownGraph(key))
    }

    pub(crate) fn get_mut(&mut self, key: GraphKey) -> Result<&mut Graph, GraphError> {
        self.graphs.get_mut(&key).ok_or(GraphError::UnknownGraph(key))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Composition API
    // ─────────────────────────────────────────────────────────────────────────

    /// Nests `sub` under the vertex `vertex` of `graph` as its body.
    ///
    /// `sub` and everything already nested inside it are renamed after their
    /// new position in the tree.
    ///
    /// # Errors
    ///
    /// - [`GraphError::RecursiveDependency`] if `sub` is `graph` or one of its
    ///   ancestors
    /// - [`GraphError::AlreadyNested`] if `sub` is nested elsewhere
    /// - [`GraphError::NestingConflict`] if the vertex already holds a nested
    ///   graph
    /// - [`GraphError::UnknownGraph`] / [`GraphError::UnknownVertex`] for bad
    ///   references
    pub fn attach_sub_graph(
        &mut self,
        graph: GraphKey,
        vertex: &str,
        sub: GraphKey,
    ) -> Result<(), GraphError> {
        self.attach(graph, vertex, sub, Slot::Plain)
    }

    /// Nests `sub` under the vertex `vertex` of `graph` as the branch selected
    /// by `label`.
    ///
    /// # Errors
    ///
    /// Same as [`attach_sub_graph`](Self::attach_sub_graph); a label that is
    /// already taken, or a vertex holding a plain sub-graph, is a
    /// [`GraphError::NestingConflict`].
    pub fn attach_conditional_graph(
        &mut self,
        graph: GraphKey,
        vertex: &str,
        label: &str,
        sub: GraphKey,
    ) -> Result<(), GraphError> {
        self.attach(graph, vertex, sub, Slot::Conditional(label))
    }

    fn attach(
        &mut self,
        graph: GraphKey,
        vertex: &str,
        sub: GraphKey,
        slot: Slot<'_>,
    ) -> Result<(), GraphError> {
        let owner = self.get(graph)?;
        let sub_graph = self.get(sub)?;
        let vertex_key = owner.key_of(vertex).ok_or_else(|| GraphError::UnknownVertex {
            graph: owner.id.clone(),
            vertex: vertex.to_string(),
        })?;

        if self.is_ancestor_or_self(sub, graph) {
            return Err(GraphError::RecursiveDependency(sub_graph.id.clone()));
        }
        if sub_graph.parent.is_some() {
            return Err(GraphError::AlreadyNested(sub_graph.id.clone()));
        }

        let owning_vertex = &owner.vertices[vertex_key.0];
        let conflict = if owning_vertex.sub_graph.is_some() {
            Some("a sub-graph".to_string())
        } else {
            match slot {
                Slot::Plain if !owning_vertex.conditional_graphs.is_empty() => {
                    Some("conditional graphs".to_string())
                }
                Slot::Conditional(label)
                    if owning_vertex.conditional_graphs.contains_key(label) =>
                {
                    Some(format!("a conditional graph for '{label}'"))
                }
                Slot::Plain | Slot::Conditional(_) => None,
            }
        };
        if let Some(existing) = conflict {
            return Err(GraphError::NestingConflict {
                vertex: vertex.to_string(),
                existing,
            });
        }

        let owning_vertex = &mut self.get_mut(graph)?.vertices[vertex_key.0];
        match slot {
            Slot::Plain => owning_vertex.sub_graph = Some(sub),
            Slot::Conditional(label) => {
                owning_vertex
                    .conditional_graphs
                    .insert(label.to_string(), sub);
            }
        }
        self.get_mut(sub)?.parent = Some(VertexRef {
            graph,
            vertex: vertex_key,
        });
        self.renamespace(sub)?;

        tracing::debug!(
            graph = %self.get(graph)?.id,
            vertex,
            sub = %self.get(sub)?.id,
            ?slot,
            "nested graph attached"
        );
        Ok(())
    }

    /// Returns true if `candidate` is `start` or contains it at any depth.
    fn is_ancestor_or_self(&self, candidate: GraphKey, start: GraphKey) -> bool {
        let mut current = Some(start);
        while let Some(key) = current {
            if key == candidate {
                return true;
            }
            current = self
                .graphs
                .get(&key)
                .and_then(|graph| graph.parent)
                .map(|parent| parent.graph);
        }
        false
    }

    /// Re-derives the id of `key` and of every graph nested below it.
    fn renamespace(&mut self, key: GraphKey) -> Result<(), GraphError> {
        let mut pending = vec![key];
        while let Some(key) = pending.pop() {
            let graph = self.get(key)?;
            let id = match graph.parent {
                Some(parent) => self.derive_id(key, parent)?,
                None => ROOT_GRAPH_ID.to_string(),
            };
            for vertex in graph.vertices() {
                pending.extend(vertex.sub_graph);
                pending.extend(vertex.conditional_graphs.values().copied());
            }
            self.get_mut(key)?.set_id(id);
        }
        Ok(())
    }

    /// Builds the id of `key` from its owning vertex.
    fn derive_id(&self, key: GraphKey, parent: VertexRef) -> Result<String, GraphError> {
        let owner = self.get(parent.graph)?;
        let vertex = &owner.vertices[parent.vertex.0];
        let base = if owner.id == ROOT_GRAPH_ID {
            vertex.index.to_string()
        } else {
            format!("{}.{}", owner.id, vertex.index)
        };
        let label = vertex
            .conditional_graphs
            .iter()
            .find_map(|(label, nested)| (*nested == key).then_some(label));
        Ok(match label {
            Some(label) => format!("{base}.{label}"),
            None => base,
        })
    }

    /// Moves every vertex of `source` into `target`.
    ///
    /// Appended vertices keep their operations, capabilities and nested graphs
    /// but arrive without edges and with fresh creation indices; link them with
    /// [`Graph::add_edge`] afterwards. `source` is consumed.
    ///
    /// # Errors
    ///
    /// - [`GraphError::DuplicateVertex`] if any id already exists in `target`;
    ///   nothing is moved in that case
    /// - [`GraphError::AlreadyNested`] if `source` is nested under a vertex
    /// - [`GraphError::RecursiveDependency`] if `target` lives inside `source`
    pub fn append(&mut self, target: GraphKey, source: GraphKey) -> Result<(), GraphError> {
        let into = self.get(target)?;
        let from = self.get(source)?;

        if let Some(clash) = from.vertices().find(|vertex| into.contains(vertex.id())) {
            return Err(GraphError::DuplicateVertex(clash.id.clone()));
        }
        if from.parent.is_some() {
            return Err(GraphError::AlreadyNested(from.id.clone()));
        }
        if self.is_ancestor_or_self(source, target) {
            return Err(GraphError::RecursiveDependency(from.id.clone()));
        }

        let mut from = self
            .graphs
            .remove(&source)
            .ok_or(GraphError::UnknownGraph(source))?;
        let moved = from.take_vertices();
        let count = moved.len();

        let mut nested = Vec::new();
        let into = self.get_mut(target)?;
        for vertex in moved {
            let sub_graph = vertex.sub_graph;
            let conditional: Vec<GraphKey> = vertex.conditional_graphs.values().copied().collect();
            let key = into.adopt_vertex(vertex);
            let parent = VertexRef { graph: target, vertex: key };
            nested.extend(sub_graph.into_iter().chain(conditional).map(|g| (g, parent)));
        }

        for (key, parent) in nested {
            self.get_mut(key)?.parent = Some(parent);
            self.renamespace(key)?;
        }

        tracing::debug!(
            into = %self.get(target)?.id,
            %source,
            vertices = count,
            "graph appended"
        );
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Query API
    // ─────────────────────────────────────────────────────────────────────────

    /// Returns the qualified ids of every vertex in `graph` and, recursively,
    /// in the plain sub-graph of every non-dynamic vertex.
    ///
    /// With a `dynamic_suffix`, each id is suffixed with `-<suffix>` to name
    /// one run-time instance of a dynamic fan-out. Conditional graphs and the
    /// sub-graphs of dynamic vertices are left for the executor to expand once
    /// the fan-out or branch is known.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::UnknownGraph`] if a key does not resolve.
    pub fn flattened_ids(
        &self,
        graph: GraphKey,
        dynamic_suffix: Option<&str>,
    ) -> Result<Vec<String>, GraphError> {
        let mut ids = Vec::new();
        self.collect_ids(graph, dynamic_suffix, &mut ids)?;
        Ok(ids)
    }

    fn collect_ids(
        &self,
        key: GraphKey,
        dynamic_suffix: Option<&str>,
        ids: &mut Vec<String>,
    ) -> Result<(), GraphError> {
        let graph = self.get(key)?;
        for vertex in graph.vertices() {
            let id = graph.qualified_id(vertex);
            ids.push(match dynamic_suffix {
                Some(suffix) => format!("{id}-{suffix}"),
                None => id,
            });
            if vertex.dynamic {
                continue;
            }
            if let Some(sub) = vertex.sub_graph {
                self.collect_ids(sub, dynamic_suffix, ids)?;
            }
        }
        Ok(())
    }
}
