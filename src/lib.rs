//! texflow - GPU node-graph image processing engine
//!
//! The engine consumes a directed node/pin/edge graph built by an editor
//! layer, orders the subgraph reachable from a designated output node,
//! runs every operator exactly once per pass, recycles GPU image buffers
//! through a resolution-bucketed pool, and synchronizes the result into a
//! display-bound texture.
//!
//! ```no_run
//! use glam::{UVec2, Vec4};
//! use texflow::nodes::blend::MixNode;
//! use texflow::nodes::generate::{ColorNode, UvGradientNode};
//! use texflow::nodes::output::OutputNode;
//! use texflow::{GraphEvaluator, NodeGraph};
//!
//! # fn main() -> Result<(), texflow::EvalError> {
//! let mut graph = NodeGraph::new();
//! let gradient = graph.add_node(UvGradientNode::create());
//! let tint = graph.add_node(ColorNode::create(Vec4::new(1.0, 0.5, 0.0, 1.0)));
//! let mix = graph.add_node(MixNode::create());
//! let output = graph.add_node(OutputNode::create());
//!
//! graph.connect_nodes(gradient, 0, mix, 0).unwrap();
//! graph.connect_nodes(tint, 0, mix, 1).unwrap();
//! graph.connect_nodes(mix, 0, output, 0).unwrap();
//!
//! let mut evaluator = GraphEvaluator::new(UVec2::new(1920, 1080))?;
//! evaluator.set_output_node(output);
//! evaluator.evaluate(&mut graph)?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod gpu;
pub mod nodes;

// Re-export commonly used types
pub use error::{EvalError, GraphError};
pub use gpu::{GpuContext, PoolStats, TextureHandle, TexturePool};
pub use nodes::{GraphEvaluator, Node, NodeGraph, NodeId, NodeOp};
