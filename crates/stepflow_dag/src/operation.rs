//! Operations and capability functions attached to vertices.
//!
//! The graph core stores these but never invokes them. Invocation belongs to
//! whatever executor walks a validated [`Workflow`](crate::workflow::Workflow).
//!
//! # Architecture
//!
//! Operations follow the same type erasure pattern as the rest of the crate:
//!
//! - [`Operation`] - Object-safe trait for a unit of work
//! - [`BoxedOperation`] - Owned, boxed operation stored on a vertex
//! - [`Modifier`] - The stock operation: a byte-to-byte transform
//!
//! Capability functions are shared handles (`Arc<dyn Fn ...>`) so a validated
//! workflow can be handed to a concurrent executor.

use core::fmt;
use std::sync::Arc;

use hashbrown::HashMap;

/// Boxed error returned by collaborator functions.
pub type BoxError = Box<dyn core::error::Error + Send + Sync>;

/// Combines multiple named inputs into one output.
pub type Aggregator =
    Arc<dyn Fn(&HashMap<String, Vec<u8>>) -> Result<Vec<u8>, BoxError> + Send + Sync>;

/// Transforms the data flowing along one edge.
pub type Forwarder = Arc<dyn Fn(&[u8]) -> Vec<u8> + Send + Sync>;

/// Splits one input into named parallel instances.
pub type ForEach = Arc<dyn Fn(&[u8]) -> HashMap<String, Vec<u8>> + Send + Sync>;

/// Selects which conditional sub-graphs apply to an input.
pub type Condition = Arc<dyn Fn(&[u8]) -> Vec<String> + Send + Sync>;

/// Returns the identity forwarder recorded for every new edge.
#[must_use]
pub fn default_forwarder() -> Forwarder {
    Arc::new(|data: &[u8]| data.to_vec())
}

/// Object-safe trait for an opaque unit of work.
pub trait Operation: Send + Sync {
    /// Returns the operation's name for debugging and tracing.
    fn name(&self) -> &str;
}

impl fmt::Debug for dyn Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("name", &self.name())
            .finish()
    }
}

/// Type alias for boxed operations stored on vertices.
pub type BoxedOperation = Box<dyn Operation>;

type ModifierFn = Arc<dyn Fn(&[u8]) -> Result<Vec<u8>, BoxError> + Send + Sync>;

/// An operation that rewrites its input bytes.
///
/// The blank modifier passes data through unchanged. Validation uses it as the
/// body of a synthesized merge vertex.
#[derive(Clone)]
pub struct Modifier {
    name: String,
    func: ModifierFn,
}

impl Modifier {
    /// Name given to the pass-through modifier.
    pub const BLANK: &'static str = "blank";

    /// Creates a named modifier.
    #[must_use]
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&[u8]) -> Result<Vec<u8>, BoxError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    /// Creates a modifier that returns its input unchanged.
    #[must_use]
    pub fn blank() -> Self {
        Self::new(Self::BLANK, |data| Ok(data.to_vec()))
    }

    /// Applies the modifier.
    ///
    /// # Errors
    ///
    /// Returns whatever error the wrapped function produces.
    pub fn apply(&self, data: &[u8]) -> Result<Vec<u8>, BoxError> {
        (self.func)(data)
    }

    /// Boxes the modifier for storage on a vertex.
    #[must_use]
    pub fn boxed(self) -> BoxedOperation {
        Box::new(self)
    }
}

impl Operation for Modifier {
    fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Modifier").field("name", &self.name).finish()
    }
}
