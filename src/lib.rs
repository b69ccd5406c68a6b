//! Workflow DAG construction and validation.
//!
//! See [`stepflow_dag`] for the graph core.

pub use stepflow_dag::*;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use stepflow_dag::prelude::*;
}
