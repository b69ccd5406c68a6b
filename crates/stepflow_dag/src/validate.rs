//! Recursive structural validation.
//!
//! A validated graph has exactly one start vertex (indegree 0) and exactly one
//! end vertex (outdegree 0), and so does every graph nested inside it. When a
//! graph has several natural end vertices, validation adds a merge vertex
//! `end-<graph id>` and wires every natural end into it with a control-only
//! edge.

use crate::error::GraphError;
use crate::graph::Graph;
use crate::operation::Modifier;
use crate::vertex::VertexKey;
use crate::workflow::{GraphKey, Workflow};

impl Workflow {
    /// Validates `graph` and every graph nested inside it.
    ///
    /// Must run after the last structural change and before execution. On
    /// success [`Graph::initial_vertex`] and [`Graph::end_vertex`] are set on
    /// every graph of the tree. Validating twice is harmless: the second pass
    /// finds the merge vertex as the single end.
    ///
    /// After each plain sub-graph validates, this graph takes over the
    /// sub-graph's execution-flow flag, replacing its own value. Conditional
    /// graphs never affect the flag.
    ///
    /// # Errors
    ///
    /// The whole tree is checked before anything is touched, so a failure
    /// leaves every graph exactly as it was. The first failure is returned
    /// unchanged, even when it comes from a nested graph:
    ///
    /// - [`GraphError::EmptyGraph`] if a graph has no vertices
    /// - [`GraphError::MultipleStart`] if a graph has several start vertices
    /// - [`GraphError::NestingTooDeep`] past the configured depth
    /// - [`GraphError::DuplicateVertex`] if the merge vertex id is taken
    pub fn validate(&mut self, graph: GraphKey) -> Result<(), GraphError> {
        self.check_at(graph, 0)?;
        self.resolve(graph)
    }

    /// Read-only pass reporting the first failure in the tree.
    fn check_at(&self, key: GraphKey, depth: usize) -> Result<(), GraphError> {
        if depth > self.max_nesting_depth {
            return Err(GraphError::NestingTooDeep {
                depth,
                max: self.max_nesting_depth,
            });
        }

        let graph = self.get(key)?;
        if graph.is_empty() {
            return Err(GraphError::EmptyGraph(graph.id.clone()));
        }

        let survey = Survey::of(graph);
        for nested in survey.nested() {
            self.check_at(nested, depth + 1)?;
        }

        survey.initial(graph)?;
        let merge_id = merge_id(graph);
        if survey.ends.len() > 1 && graph.contains(&merge_id) {
            return Err(GraphError::DuplicateVertex(merge_id));
        }
        Ok(())
    }

    /// Resolves start and end vertices, bottom-up, on an already checked tree.
    fn resolve(&mut self, key: GraphKey) -> Result<(), GraphError> {
        let survey = Survey::of(self.get(key)?);

        for (sub_graph, branches) in &survey.nested {
            if let Some(sub) = *sub_graph {
                self.resolve(sub)?;
                let inherited = self.get(sub)?.execution_flow;
                self.get_mut(key)?.execution_flow = inherited;
            }
            for branch in branches {
                self.resolve(*branch)?;
            }
        }

        let graph = self.get_mut(key)?;
        let initial = survey.initial(graph)?;
        let end = match survey.ends.as_slice() {
            [end] => *end,
            ends => merge_ends(graph, ends)?,
        };

        graph.initial = Some(initial);
        graph.end = Some(end);

        tracing::debug!(
            graph = %graph.id,
            vertices = graph.len(),
            execution_flow = graph.execution_flow,
            "graph validated"
        );
        Ok(())
    }
}

/// Start vertices, end vertices and nested graphs of one graph, in creation
/// order.
struct Survey {
    starts: Vec<VertexKey>,
    ends: Vec<VertexKey>,
    nested: Vec<(Option<GraphKey>, Vec<GraphKey>)>,
}

impl Survey {
    fn of(graph: &Graph) -> Self {
        let mut survey = Self {
            starts: Vec::new(),
            ends: Vec::new(),
            nested: Vec::new(),
        };
        for vertex in graph.vertices() {
            if vertex.indegree == 0 {
                survey.starts.push(vertex.key);
            }
            if vertex.outdegree == 0 {
                survey.ends.push(vertex.key);
            }
            if vertex.sub_graph.is_some() || !vertex.conditional_graphs.is_empty() {
                let branches: Vec<GraphKey> = vertex.conditional_graphs.values().copied().collect();
                survey.nested.push((vertex.sub_graph, branches));
            }
        }
        survey
    }

    fn nested(&self) -> impl Iterator<Item = GraphKey> + '_ {
        self.nested
            .iter()
            .flat_map(|(sub_graph, branches)| sub_graph.iter().chain(branches).copied())
    }

    fn initial(&self, graph: &Graph) -> Result<VertexKey, GraphError> {
        match self.starts.as_slice() {
            [initial] => Ok(*initial),
            starts => Err(GraphError::MultipleStart {
                graph: graph.id.clone(),
                starts: starts
                    .iter()
                    .map(|start| graph.vertices[start.0].id.clone())
                    .collect(),
            }),
        }
    }
}

fn merge_id(graph: &Graph) -> String {
    format!("end-{}", graph.id)
}

/// Adds the `end-<graph id>` vertex and links every natural end into it.
fn merge_ends(graph: &mut Graph, ends: &[VertexKey]) -> Result<VertexKey, GraphError> {
    let merge = graph.add_vertex(merge_id(graph), vec![Modifier::blank().boxed()])?;
    for end in ends {
        graph.add_control_edge(*end, merge)?;
    }

    tracing::debug!(
        graph = %graph.id,
        merged = ends.len(),
        "synthesized end vertex"
    );
    Ok(merge)
}
