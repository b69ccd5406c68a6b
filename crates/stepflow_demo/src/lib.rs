//! Order-processing workflow built with stepflow.
//!
//! Builds a complete nesting tree with every kind of composition the graph core
//! supports, validates it, and previews how a concrete order would fan out.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  Root graph "0"                                                  │
//! │                                                                  │
//! │  ┌─────────┐   ┌───────┐   ┌───────┐   ┌─────────┐   ┌───────┐   │
//! │  │ receive │──▶│ check │──▶│ price │──▶│ fulfil  │──▶│ route │   │
//! │  └─────────┘   └───────┘   └───┬───┘   └────┬────┘   └───┬───┘   │
//! │                                │  sub-graph │ foreach    │ cond  │
//! │                                ▼            ▼            ▼       │
//! │                           rates → tax  reserve → pack  priority  │
//! │                                                        standard  │
//! │                  price ──▶ invoice          route ──▶ notify     │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `invoice` and `notify` both end the root graph, so validation merges them
//! into a synthesized `end-0` vertex.

pub mod order;
pub mod telemetry;

use stepflow_dag::error::GraphError;
use stepflow_dag::graph::{Graph, ROOT_GRAPH_ID};
use stepflow_dag::operation::{BoxedOperation, Forwarder, Modifier};
use stepflow_dag::workflow::{GraphKey, Workflow};
use std::sync::Arc;

pub use order::{Line, Order};

/// Errors raised while building or previewing the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum DemoError {
    /// The workflow definition was rejected.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// An order could not be encoded.
    #[error("order encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),

    /// A vertex the preview relies on lacks a capability.
    #[error("vertex '{vertex}' has no {capability}")]
    MissingCapability {
        /// The vertex id.
        vertex: String,
        /// The missing capability.
        capability: &'static str,
    },
}

/// Keys of every graph in the order pipeline.
#[derive(Debug)]
pub struct OrderPipeline {
    /// The arena holding the whole tree.
    pub workflow: Workflow,
    /// The top-level graph.
    pub root: GraphKey,
    /// Body of the `price` vertex.
    pub pricing: GraphKey,
    /// Per-line body of the `fulfil` vertex.
    pub fulfilment: GraphKey,
    /// Branch taken by large orders.
    pub priority: GraphKey,
    /// Branch taken by everything else.
    pub standard: GraphKey,
}

/// What the pipeline would do with one order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    /// Order total after pricing.
    pub total_cents: u64,
    /// Qualified ids of every fulfilment instance, one group per line.
    pub fulfilment_ids: Vec<String>,
    /// Labels of the shipping branches selected for the order.
    pub routes: Vec<String>,
}

fn stage(name: &str) -> BoxedOperation {
    Modifier::new(name, |data| Ok(data.to_vec())).boxed()
}

/// Builds and validates the order pipeline.
///
/// # Errors
///
/// Returns the first [`GraphError`] raised while wiring or validating.
pub fn build_order_pipeline() -> Result<OrderPipeline, GraphError> {
    let mut workflow = Workflow::new();
    let root = workflow.new_graph();
    let pricing = workflow.new_graph();
    let fulfilment = workflow.new_graph();
    let priority = workflow.new_graph();
    let standard = workflow.new_graph();

    {
        let graph = graph_mut(&mut workflow, root)?;
        graph.add_vertex("receive", vec![stage("receive")])?;
        graph.add_vertex("check", vec![Modifier::new("check", order::check_order).boxed()])?;
        graph.add_vertex("price", vec![Modifier::new("price", order::price_order).boxed()])?;
        graph.add_edge("receive", "check")?;
        graph.add_edge("check", "price")?;
        graph.add_edge("price", "fulfil")?;
        graph.add_edge("price", "invoice")?;
        graph.add_edge("fulfil", "route")?;
        graph.add_edge("route", "notify")?;

        graph
            .vertex_mut("fulfil")
            .ok_or_else(|| missing("fulfil"))?
            .add_operation(Modifier::blank())
            .set_foreach(order::split_lines)
            .set_sub_aggregator(order::join_lines);
        graph
            .vertex_mut("route")
            .ok_or_else(|| missing("route"))?
            .set_condition(order::shipping_route);
    }

    {
        let graph = graph_mut(&mut workflow, pricing)?;
        graph.add_edge("rates", "tax")?;
        let total_only: Forwarder = Arc::new(order::total_only);
        graph.set_forwarder("rates", "tax", Some(total_only))?;
    }

    graph_mut(&mut workflow, fulfilment)?.add_edge("reserve", "pack")?;
    graph_mut(&mut workflow, priority)?.add_edge("express_label", "dispatch")?;
    graph_mut(&mut workflow, standard)?.add_edge("ground_label", "dispatch")?;

    workflow.attach_sub_graph(root, "price", pricing)?;
    workflow.attach_sub_graph(root, "fulfil", fulfilment)?;
    workflow.attach_conditional_graph(root, "route", "priority", priority)?;
    workflow.attach_conditional_graph(root, "route", "standard", standard)?;

    workflow.validate(root)?;

    tracing::info!(
        graphs = workflow.graph_count(),
        "order pipeline validated"
    );

    Ok(OrderPipeline {
        workflow,
        root,
        pricing,
        fulfilment,
        priority,
        standard,
    })
}

fn graph_mut(workflow: &mut Workflow, key: GraphKey) -> Result<&mut Graph, GraphError> {
    workflow.graph_mut(key).ok_or(GraphError::UnknownGraph(key))
}

fn missing(vertex: &str) -> GraphError {
    GraphError::UnknownVertex {
        graph: ROOT_GRAPH_ID.to_string(),
        vertex: vertex.to_string(),
    }
}

impl OrderPipeline {
    /// Qualified ids of every statically known vertex.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::UnknownGraph`] if the tree was tampered with.
    pub fn static_ids(&self) -> Result<Vec<String>, GraphError> {
        self.workflow.flattened_ids(self.root, None)
    }

    /// Runs the fan-out and routing functions against an order without
    /// executing any operation.
    ///
    /// # Errors
    ///
    /// Returns [`DemoError`] if the order cannot be encoded or the pipeline is
    /// missing a capability.
    pub fn preview(&self, order: &Order) -> Result<Preview, DemoError> {
        let mut priced = order.clone();
        priced.total_cents = priced.line_total();
        let payload = priced.to_bytes()?;

        let root = self
            .workflow
            .graph(self.root)
            .ok_or(GraphError::UnknownGraph(self.root))?;

        let fulfil = root.vertex("fulfil").ok_or_else(|| missing("fulfil"))?;
        let foreach = fulfil.foreach().ok_or_else(|| DemoError::MissingCapability {
            vertex: "fulfil".to_string(),
            capability: "foreach function",
        })?;
        let mut instances: Vec<String> = foreach(payload.as_slice()).into_keys().collect();
        instances.sort_unstable();

        let mut fulfilment_ids = Vec::new();
        for instance in &instances {
            fulfilment_ids.extend(self.workflow.flattened_ids(self.fulfilment, Some(instance.as_str()))?);
        }

        let route = root.vertex("route").ok_or_else(|| missing("route"))?;
        let condition = route.condition().ok_or_else(|| DemoError::MissingCapability {
            vertex: "route".to_string(),
            capability: "condition function",
        })?;

        Ok(Preview {
            total_cents: priced.total_cents,
            fulfilment_ids,
            routes: condition(payload.as_slice()),
        })
    }
}
