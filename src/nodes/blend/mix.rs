//! Linear blend of two inputs

use glam::Vec4;

use crate::error::EvalError;
use crate::gpu::{Kernel, KernelInput};
use crate::nodes::evaluator::EvalContext;
use crate::nodes::node::{Node, NodeOp};
use crate::nodes::DEFAULT_BACKUP_COLOR;

/// Blends inputs A and B by a factor input: `mix(a, b, factor.x)`.
#[derive(Debug, Clone)]
pub struct MixNode {
    pub backup_a: Vec4,
    pub backup_b: Vec4,
    pub backup_factor: f32,
}

impl MixNode {
    pub fn create() -> Node {
        let mut node = Node::new(
            "Mix",
            Box::new(MixNode {
                backup_a: DEFAULT_BACKUP_COLOR,
                backup_b: DEFAULT_BACKUP_COLOR,
                backup_factor: 0.5,
            }),
        );
        node.add_input("A");
        node.add_input("B");
        node.add_input("Factor");
        node.add_output("Color");
        node
    }
}

impl NodeOp for MixNode {
    fn op_name(&self) -> &'static str {
        "Mix"
    }

    fn evaluate(&mut self, ctx: &mut EvalContext<'_>) -> Result<(), EvalError> {
        let a = KernelInput::new(ctx.input(0), self.backup_a);
        let b = KernelInput::new(ctx.input(1), self.backup_b);
        let factor = KernelInput::new(ctx.input(2), Vec4::splat(self.backup_factor));
        let out = ctx.acquire(ctx.output_resolution())?;
        ctx.dispatch(Kernel::Mix, &[a, b, factor], out)?;
        ctx.set_output(0, out);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::UVec2;
    use crate::nodes::generate::ColorNode;
    use crate::nodes::graph::NodeGraph;
    use crate::nodes::output::OutputNode;
    use crate::nodes::test_support::gpu_evaluator;

    #[test]
    fn mix_node_creation() {
        let node = MixNode::create();
        assert_eq!(node.inputs.len(), 3);
        assert_eq!(node.inputs[0].name, "A");
        assert_eq!(node.inputs[1].name, "B");
        assert_eq!(node.inputs[2].name, "Factor");
        assert_eq!(node.outputs.len(), 1);
    }

    #[test]
    fn default_factor_averages_the_inputs() {
        let Some(mut evaluator) = gpu_evaluator(UVec2::new(4, 4)) else {
            return;
        };
        let mut graph = NodeGraph::new();
        let a = graph.add_node(ColorNode::create(Vec4::new(1.0, 0.0, 0.0, 1.0)));
        let b = graph.add_node(ColorNode::create(Vec4::new(0.0, 0.0, 1.0, 1.0)));
        let mix = graph.add_node(MixNode::create());
        let out = graph.add_node(OutputNode::create());
        graph.connect_nodes(a, 0, mix, 0).unwrap();
        graph.connect_nodes(b, 0, mix, 1).unwrap();
        graph.connect_nodes(mix, 0, out, 0).unwrap();
        evaluator.set_output_node(out);
        evaluator.evaluate(&mut graph).unwrap();

        // Factor pin is unconnected, so the backup of 0.5 applies.
        let pixels = evaluator
            .read_texture(evaluator.output_texture().unwrap())
            .unwrap();
        for pixel in pixels.chunks_exact(4) {
            assert!((pixel[0] - 0.5).abs() < 1e-6);
            assert!((pixel[1] - 0.0).abs() < 1e-6);
            assert!((pixel[2] - 0.5).abs() < 1e-6);
            assert!((pixel[3] - 1.0).abs() < 1e-6);
        }
    }
}
