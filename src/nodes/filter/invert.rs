//! Color inversion filter

use glam::Vec4;

use crate::error::EvalError;
use crate::gpu::{Kernel, KernelInput};
use crate::nodes::evaluator::EvalContext;
use crate::nodes::node::{Node, NodeOp};
use crate::nodes::DEFAULT_BACKUP_COLOR;

/// Inverts the RGB channels of its input, leaving alpha untouched.
#[derive(Debug, Clone)]
pub struct InvertNode {
    /// Consulted when the input pin is unconnected.
    pub backup: Vec4,
}

impl InvertNode {
    pub fn create() -> Node {
        let mut node = Node::new(
            "Invert",
            Box::new(InvertNode {
                backup: DEFAULT_BACKUP_COLOR,
            }),
        );
        node.add_input("Color");
        node.add_output("Color");
        node
    }
}

impl NodeOp for InvertNode {
    fn op_name(&self) -> &'static str {
        "Invert"
    }

    fn evaluate(&mut self, ctx: &mut EvalContext<'_>) -> Result<(), EvalError> {
        let input = KernelInput::new(ctx.input(0), self.backup);
        let out = ctx.acquire(ctx.output_resolution())?;
        ctx.dispatch(Kernel::Invert, &[input], out)?;
        ctx.set_output(0, out);
        Ok(())
    }
}
