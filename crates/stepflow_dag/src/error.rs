//! Errors raised while building or validating workflow graphs.
//!
//! Every variant is a construction-time failure: the caller has to fix the
//! graph definition and rebuild. Nothing here is retryable.

use crate::workflow::GraphKey;

/// Errors returned by graph construction, composition and validation.
///
/// Callers branch on the variant, never on the rendered message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// A vertex with this id already exists in the target graph.
    #[error("vertex '{0}' redefined")]
    DuplicateVertex(String),

    /// The directed edge already exists.
    #[error("edge '{from}' -> '{to}' redefined")]
    DuplicateEdge {
        /// Source vertex id.
        from: String,
        /// Target vertex id.
        to: String,
    },

    /// Inserting the edge would close a cycle.
    #[error("edge '{from}' -> '{to}' would create a cyclic dependency")]
    Cyclic {
        /// Source vertex id.
        from: String,
        /// Target vertex id.
        to: String,
    },

    /// The graph has more than one vertex without incoming edges.
    #[error("graph '{graph}' has {} start vertices, only one is allowed", .starts.len())]
    MultipleStart {
        /// Id of the offending graph.
        graph: String,
        /// Ids of every zero-indegree vertex, in creation order.
        starts: Vec<String>,
    },

    /// A graph would end up nested, directly or transitively, inside itself.
    #[error("graph '{0}' has a recursive dependency")]
    RecursiveDependency(String),

    /// The key does not name a graph owned by this workflow.
    #[error("unknown graph: {0}")]
    UnknownGraph(GraphKey),

    /// The graph has no vertex with this id.
    #[error("graph '{graph}' has no vertex '{vertex}'")]
    UnknownVertex {
        /// Id of the graph that was searched.
        graph: String,
        /// The missing vertex id.
        vertex: String,
    },

    /// A graph without vertices cannot be validated.
    #[error("graph '{0}' has no vertices")]
    EmptyGraph(String),

    /// The graph is already nested under another vertex.
    #[error("graph '{0}' is already nested under a vertex")]
    AlreadyNested(String),

    /// The vertex already holds a nested graph in the requested slot.
    #[error("vertex '{vertex}' already holds {existing}")]
    NestingConflict {
        /// Id of the owning vertex.
        vertex: String,
        /// What the vertex already holds.
        existing: String,
    },

    /// Validation descended deeper than the configured nesting limit.
    #[error("nesting depth {depth} exceeds max {max}")]
    NestingTooDeep {
        /// Depth at which the limit was hit.
        depth: usize,
        /// The configured maximum.
        max: usize,
    },
}
