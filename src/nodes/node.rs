//! Node type and the operator behavior contract

use std::fmt;

use crate::error::EvalError;
use crate::nodes::evaluator::EvalContext;
use crate::nodes::pin::{Pin, PinId, PinType};

/// Unique identifier for a node
pub type NodeId = usize;

/// Spacing between consecutive node ids, reserving id slots for a node's
/// pins: pin ids fall in `node.id + 1 ..= node.id + NODE_ID_STRIDE`, unique
/// graph-wide. A node may therefore carry at most `NODE_ID_STRIDE - 1` pins.
pub const NODE_ID_STRIDE: usize = 32;

/// Behavior contract every node operator implements.
///
/// `evaluate` runs once per pass, after every upstream producer has already
/// run. An implementation reads its resolved inputs (falling back to its
/// documented backup values for unconnected pins), acquires output textures
/// from the pool, writes them with a full-resolution kernel dispatch, and
/// assigns them to the context's output slots. It must not assume a pool
/// texture arrives cleared; reused textures carry stale contents.
pub trait NodeOp: Send + Sync {
    /// Short operator name, used as the node's default title.
    fn op_name(&self) -> &'static str;

    fn evaluate(&mut self, ctx: &mut EvalContext<'_>) -> Result<(), EvalError>;
}

/// A vertex in the graph: identity, pins, and the operator behind them.
pub struct Node {
    pub id: NodeId,
    pub title: String,
    pub inputs: Vec<Pin>,
    pub outputs: Vec<Pin>,
    pub(crate) op: Box<dyn NodeOp>,
}

impl Node {
    /// Creates a node with no pins. The id is provisional until the node is
    /// inserted into a graph, which assigns the real node and pin ids.
    pub fn new(title: impl Into<String>, op: Box<dyn NodeOp>) -> Self {
        Self {
            id: 0,
            title: title.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            op,
        }
    }

    /// Adds an input pin. Pins are fixed once the node joins a graph.
    pub fn add_input(&mut self, name: impl Into<String>) -> &mut Self {
        let id = 1 + self.inputs.len() + self.outputs.len();
        self.inputs.push(Pin::new(id, name, PinType::Input));
        self
    }

    /// Adds an output pin. Pins are fixed once the node joins a graph.
    pub fn add_output(&mut self, name: impl Into<String>) -> &mut Self {
        let id = 1 + self.inputs.len() + self.outputs.len();
        self.outputs.push(Pin::new(id, name, PinType::Output));
        self
    }

    /// Looks up a pin of this node by its graph-wide id.
    pub fn pin(&self, pin_id: PinId) -> Option<&Pin> {
        let local = pin_id.checked_sub(self.id + 1)?;
        if local < self.inputs.len() {
            self.inputs.get(local)
        } else {
            self.outputs.get(local - self.inputs.len())
        }
    }

    pub(crate) fn pin_mut(&mut self, pin_id: PinId) -> Option<&mut Pin> {
        let local = pin_id.checked_sub(self.id + 1)?;
        if local < self.inputs.len() {
            self.inputs.get_mut(local)
        } else {
            self.outputs.get_mut(local - self.inputs.len())
        }
    }

    /// Graph-wide id of the input pin at `index`.
    pub fn input_pin_id(&self, index: usize) -> Option<PinId> {
        self.inputs.get(index).map(|pin| pin.id)
    }

    /// Graph-wide id of the output pin at `index`.
    pub fn output_pin_id(&self, index: usize) -> Option<PinId> {
        self.outputs.get(index).map(|pin| pin.id)
    }

    /// Re-bases the node and pin ids onto the id slot assigned by the
    /// graph. Inputs come first, outputs after.
    pub(crate) fn assign_ids(&mut self, id: NodeId) {
        let pin_count = self.inputs.len() + self.outputs.len();
        assert!(
            pin_count < NODE_ID_STRIDE,
            "node '{}' has {} pins, exceeding the id stride",
            self.title,
            pin_count
        );
        self.id = id;
        let mut next = id + 1;
        for pin in self.inputs.iter_mut().chain(self.outputs.iter_mut()) {
            pin.id = next;
            next += 1;
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("op", &self.op.op_name())
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .finish()
    }
}
