//! Error types for graph construction and evaluation

use thiserror::Error;

use crate::nodes::{NodeId, PinId};

/// Errors raised while wiring the graph
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("node {0} does not exist")]
    NodeNotFound(NodeId),

    #[error("pin {0} does not exist")]
    PinNotFound(PinId),

    #[error("node {node} has no pin at index {index}")]
    PinIndexOutOfRange { node: NodeId, index: usize },

    #[error("cannot connect a node to itself")]
    SelfConnection,

    #[error("an edge must run from an output pin to an input pin")]
    PinDirection,

    #[error("input pin {0} already has an incoming edge")]
    InputPinOccupied(PinId),
}

/// Errors raised during an evaluation pass
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("no output node configured")]
    NoOutputNode,

    #[error("graph contains a cycle: ordered {ordered} of {reachable} reachable nodes")]
    CycleDetected { ordered: usize, reachable: usize },

    #[error("texture allocation failed for {width}x{height}: {reason}")]
    AllocationFailed {
        width: u32,
        height: u32,
        reason: String,
    },

    #[error("node {0} does not exist")]
    NodeNotFound(NodeId),

    #[error(
        "publish target is {target_width}x{target_height} but the output image is {width}x{height}"
    )]
    PublishTargetMismatch {
        width: u32,
        height: u32,
        target_width: u32,
        target_height: u32,
    },

    #[error("gpu: {0}")]
    Gpu(String),
}
