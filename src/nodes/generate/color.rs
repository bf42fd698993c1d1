//! Constant color source

use glam::Vec4;

use crate::error::EvalError;
use crate::nodes::evaluator::EvalContext;
use crate::nodes::node::{Node, NodeOp};

/// Emits a single RGBA color as a uniform texture rather than an image.
#[derive(Debug, Clone)]
pub struct ColorNode {
    pub color: Vec4,
}

impl ColorNode {
    pub fn create(color: Vec4) -> Node {
        let mut node = Node::new("Color", Box::new(ColorNode { color }));
        node.add_output("Color");
        node
    }
}

impl NodeOp for ColorNode {
    fn op_name(&self) -> &'static str {
        "Color"
    }

    fn evaluate(&mut self, ctx: &mut EvalContext<'_>) -> Result<(), EvalError> {
        let handle = ctx.acquire_uniform(self.color)?;
        ctx.set_output(0, handle);
        Ok(())
    }
}
