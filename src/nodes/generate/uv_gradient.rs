//! UV gradient source

use crate::error::EvalError;
use crate::gpu::Kernel;
use crate::nodes::evaluator::EvalContext;
use crate::nodes::node::{Node, NodeOp};

/// Fills an image with its normalized pixel coordinates: red ramps with u,
/// green with v.
#[derive(Debug, Clone)]
pub struct UvGradientNode;

impl UvGradientNode {
    pub fn create() -> Node {
        let mut node = Node::new("UV Gradient", Box::new(UvGradientNode));
        node.add_output("Image");
        node
    }
}

impl NodeOp for UvGradientNode {
    fn op_name(&self) -> &'static str {
        "UV Gradient"
    }

    fn evaluate(&mut self, ctx: &mut EvalContext<'_>) -> Result<(), EvalError> {
        let out = ctx.acquire(ctx.output_resolution())?;
        ctx.dispatch(Kernel::UvGradient, &[], out)?;
        ctx.set_output(0, out);
        Ok(())
    }
}
