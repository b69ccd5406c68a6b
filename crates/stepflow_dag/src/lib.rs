//! Workflow graph construction and validation for stepflow.
//!
//! `stepflow_dag` builds the static shape of a workflow: directed acyclic
//! graphs of vertices, each vertex carrying opaque operations and optional
//! capability functions, with graphs nested under vertices to express bodies,
//! fan-outs and branches. Nothing here runs an operation; an executor consumes
//! the validated structure.
//!
//! # Core Concepts
//!
//! - [`Workflow`] - Arena owning every graph of a nesting tree
//! - [`Graph`] - Directed acyclic graph with incremental cycle detection
//! - [`Vertex`] - A unit of work plus its capabilities and nested graphs
//! - [`Operation`] - Opaque work stored on a vertex
//! - [`GraphError`] - Every construction and validation failure
//!
//! # Example
//!
//! ```
//! use stepflow_dag::{GraphError, Workflow};
//!
//! let mut workflow = Workflow::new();
//! let root = workflow.new_graph();
//! let graph = workflow.graph_mut(root).unwrap();
//! graph.add_edge("extract", "clean").unwrap();
//! graph.add_edge("extract", "audit").unwrap();
//!
//! assert!(matches!(
//!     graph.add_edge("clean", "extract"),
//!     Err(GraphError::Cyclic { .. })
//! ));
//!
//! workflow.validate(root).unwrap();
//! let end = workflow.graph(root).unwrap().end_vertex().unwrap();
//! assert_eq!(end.id(), "end-0");
//! ```
//!
//! # Identity
//!
//! Vertex ids are unique per graph only. Nested graphs are renamed after their
//! position in the tree, so `<graph id>.<creation index>.<vertex id>` (see
//! [`Graph::qualified_id`]) is unique across the whole workflow.

/// Error types for construction and validation.
pub mod error;

/// Graph structure and edge insertion.
pub mod graph;

/// Operations and capability function types.
pub mod operation;

mod validate;

/// Vertex type and its capabilities.
pub mod vertex;

/// The graph arena, composition and queries.
pub mod workflow;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use crate::error::GraphError;
    pub use crate::graph::{Graph, ROOT_GRAPH_ID};
    pub use crate::operation::{
        Aggregator, BoxError, BoxedOperation, Condition, ForEach, Forwarder, Modifier, Operation,
        default_forwarder,
    };
    pub use crate::vertex::{Vertex, VertexKey, VertexRef};
    pub use crate::workflow::{GraphKey, Workflow};
}

// Re-export key types at crate root for convenience
pub use error::GraphError;
pub use graph::Graph;
pub use operation::{BoxedOperation, Modifier, Operation};
pub use vertex::{Vertex, VertexKey, VertexRef};
pub use workflow::{GraphKey, Workflow};
