//! Node system - graph data structures, operators, and the evaluator

// Core node system modules
pub mod evaluator;
pub mod graph;
pub mod node;
pub mod pin;

// Operator implementations
pub mod blend;
pub mod filter;
pub mod generate;
pub mod output;

// Re-export core types
pub use evaluator::{evaluation_order, EvalContext, GraphEvaluator};
pub use graph::{Edge, EdgeId, NodeGraph};
pub use node::{Node, NodeId, NodeOp, NODE_ID_STRIDE};
pub use pin::{Pin, PinId, PinType};

use glam::Vec4;

/// Fallback color consulted when an input pin has no incoming edge and the
/// operator defines no other backup.
pub const DEFAULT_BACKUP_COLOR: Vec4 = Vec4::new(0.0, 0.0, 0.0, 1.0);
