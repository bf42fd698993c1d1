//! Display output sink

use crate::error::EvalError;
use crate::nodes::evaluator::EvalContext;
use crate::nodes::node::{Node, NodeOp};

/// Designates its input texture as the image published at the end of the
/// pass. With no input connected, nothing is designated and the publish
/// phase is skipped.
#[derive(Debug, Clone)]
pub struct OutputNode;

impl OutputNode {
    pub fn create() -> Node {
        let mut node = Node::new("Output", Box::new(OutputNode));
        node.add_input("Image");
        node
    }
}

impl NodeOp for OutputNode {
    fn op_name(&self) -> &'static str {
        "Output"
    }

    fn evaluate(&mut self, ctx: &mut EvalContext<'_>) -> Result<(), EvalError> {
        ctx.set_output_texture(ctx.input(0));
        Ok(())
    }
}
