//! Exposure adjustment filter

use glam::Vec4;

use crate::error::EvalError;
use crate::gpu::{Kernel, KernelInput};
use crate::nodes::evaluator::EvalContext;
use crate::nodes::node::{Node, NodeOp};
use crate::nodes::DEFAULT_BACKUP_COLOR;

/// Scales RGB by `2^stops`. The exposure amount is itself an input, so it
/// can be driven by an upstream node; the x channel is consulted.
#[derive(Debug, Clone)]
pub struct ExposureNode {
    pub backup_color: Vec4,
    pub backup_exposure: f32,
}

impl ExposureNode {
    pub fn create() -> Node {
        let mut node = Node::new(
            "Exposure",
            Box::new(ExposureNode {
                backup_color: DEFAULT_BACKUP_COLOR,
                backup_exposure: 0.0,
            }),
        );
        node.add_input("Color");
        node.add_input("Exposure");
        node.add_output("Color");
        node
    }
}

impl NodeOp for ExposureNode {
    fn op_name(&self) -> &'static str {
        "Exposure"
    }

    fn evaluate(&mut self, ctx: &mut EvalContext<'_>) -> Result<(), EvalError> {
        let color = KernelInput::new(ctx.input(0), self.backup_color);
        let stops = KernelInput::new(ctx.input(1), Vec4::splat(self.backup_exposure));
        let out = ctx.acquire(ctx.output_resolution())?;
        ctx.dispatch(Kernel::Exposure, &[color, stops], out)?;
        ctx.set_output(0, out);
        Ok(())
    }
}
