//! Graph evaluation: reachability, ordering, execution, and publish
//!
//! One pass walks the subgraph reachable backward from the designated
//! output node, orders it topologically, runs every operator exactly once,
//! and finally synchronizes the designated result into the publish target.
//! A single CPU thread drives the pass; operators enqueue GPU work without
//! blocking and the in-order queue keeps producer writes ahead of consumer
//! reads (see [`crate::gpu::context`]).

use std::collections::{HashMap, HashSet, VecDeque};

use glam::{UVec2, Vec4};
use log::debug;

use crate::error::EvalError;
use crate::gpu::{GpuContext, Kernel, KernelInput, TextureHandle, TexturePool};
use crate::nodes::graph::{EdgeId, NodeGraph};
use crate::nodes::node::NodeId;

/// Per-node view of an evaluation pass, handed to
/// [`NodeOp::evaluate`](crate::nodes::NodeOp::evaluate).
pub struct EvalContext<'a> {
    gpu: &'a GpuContext,
    pool: &'a mut TexturePool,
    output_resolution: UVec2,
    inputs: &'a [Option<TextureHandle>],
    outputs: &'a mut [Option<TextureHandle>],
    publish_source: &'a mut Option<TextureHandle>,
}

impl EvalContext<'_> {
    /// Resolution operators render at by default.
    pub fn output_resolution(&self) -> UVec2 {
        self.output_resolution
    }

    /// Effective texture on the input pin at `index`; `None` when the pin
    /// is unconnected or its producer emitted nothing.
    pub fn input(&self, index: usize) -> Option<TextureHandle> {
        self.inputs.get(index).copied().flatten()
    }

    /// Assign a texture to the output pin at `index`. The evaluator
    /// propagates it onto every edge leaving that pin.
    pub fn set_output(&mut self, index: usize, handle: TextureHandle) {
        if let Some(slot) = self.outputs.get_mut(index) {
            *slot = Some(handle);
        }
    }

    /// Designate the pool texture published at the end of the pass.
    pub fn set_output_texture(&mut self, handle: Option<TextureHandle>) {
        *self.publish_source = handle;
    }

    /// Acquire a pool texture of the given resolution.
    pub fn acquire(&mut self, resolution: UVec2) -> Result<TextureHandle, EvalError> {
        self.pool.acquire(resolution)
    }

    /// Acquire a uniform-constant texture holding `value`.
    pub fn acquire_uniform(&mut self, value: Vec4) -> Result<TextureHandle, EvalError> {
        let handle = self.pool.acquire(crate::gpu::UNIFORM_RESOLUTION)?;
        self.pool.set_uniform(handle, value);
        Ok(handle)
    }

    /// Enqueue a kernel writing the full extent of `out`.
    pub fn dispatch(
        &mut self,
        kernel: Kernel,
        inputs: &[KernelInput],
        out: TextureHandle,
    ) -> Result<(), EvalError> {
        self.gpu.dispatch(self.pool, kernel, inputs, out)
    }
}

/// Computes the order in which the nodes reachable from `output_node` must
/// run: every edge's producer strictly precedes its consumer.
///
/// Discovery walks input edges breadth-first from the output node; each
/// node's indegree is its total incoming edge count (parallel edges from
/// one upstream node count individually). Emission pops a LIFO ready set,
/// which biases the order depth-first. The tie-break is an implementation
/// artifact; only the partial order is contractual.
///
/// A cycle among the reachable nodes leaves them never reaching indegree
/// zero; that surfaces as [`EvalError::CycleDetected`] instead of a
/// silently truncated order.
pub fn evaluation_order(graph: &NodeGraph, output_node: NodeId) -> Result<Vec<NodeId>, EvalError> {
    let mut visited: HashSet<NodeId> = HashSet::new();
    let mut indegrees: HashMap<NodeId, usize> = HashMap::new();
    let mut ready: Vec<NodeId> = Vec::new();

    let mut frontier = VecDeque::new();
    if !graph.contains_node(output_node) {
        return Err(EvalError::NodeNotFound(output_node));
    }
    frontier.push_back(output_node);
    visited.insert(output_node);

    while let Some(node_id) = frontier.pop_front() {
        let node = graph.node(node_id).ok_or(EvalError::NodeNotFound(node_id))?;
        let mut indegree = 0;
        for pin in &node.inputs {
            for edge_id in pin.edges() {
                let Some(edge) = graph.edge(*edge_id) else {
                    continue;
                };
                indegree += 1;
                let upstream = NodeGraph::owner_of(edge.from);
                if visited.insert(upstream) {
                    frontier.push_back(upstream);
                }
            }
        }
        indegrees.insert(node_id, indegree);
        if indegree == 0 {
            ready.push(node_id);
        }
    }

    let mut order = Vec::with_capacity(visited.len());
    while let Some(node_id) = ready.pop() {
        order.push(node_id);
        let Some(node) = graph.node(node_id) else {
            continue;
        };
        for pin in &node.outputs {
            for edge_id in pin.edges() {
                let Some(edge) = graph.edge(*edge_id) else {
                    continue;
                };
                let downstream = NodeGraph::owner_of(edge.to);
                // Outgoing edges may lead outside the reachable set; only
                // discovered nodes hold an indegree.
                if let Some(remaining) = indegrees.get_mut(&downstream) {
                    *remaining -= 1;
                    if *remaining == 0 {
                        ready.push(downstream);
                    }
                }
            }
        }
    }

    if order.len() != visited.len() {
        return Err(EvalError::CycleDetected {
            ordered: order.len(),
            reachable: visited.len(),
        });
    }
    Ok(order)
}

/// Drives evaluation passes over a [`NodeGraph`] and owns the texture pool
/// the operators draw from.
///
/// Lives as long as the graph session; pool textures are recycled across
/// passes and freed only when the evaluator is dropped.
pub struct GraphEvaluator {
    gpu: GpuContext,
    pool: TexturePool,
    output_resolution: UVec2,
    output_node: Option<NodeId>,
    /// Incremental re-evaluation hint from the editor. Every pass is
    /// currently a full recompute; kept as the extension point.
    changed_node: Option<NodeId>,
    output_texture: Option<TextureHandle>,
    publish_target: Option<wgpu::Texture>,
}

impl GraphEvaluator {
    /// Create an evaluator rendering at `output_resolution`, acquiring a
    /// compute device in the process.
    pub fn new(output_resolution: UVec2) -> Result<Self, EvalError> {
        let gpu = GpuContext::new()?;
        Ok(Self::with_context(gpu, output_resolution))
    }

    /// Create an evaluator on an existing device context.
    pub fn with_context(gpu: GpuContext, output_resolution: UVec2) -> Self {
        let pool = TexturePool::new(&gpu);
        Self {
            gpu,
            pool,
            output_resolution,
            output_node: None,
            changed_node: None,
            output_texture: None,
            publish_target: None,
        }
    }

    pub fn gpu(&self) -> &GpuContext {
        &self.gpu
    }

    pub fn pool(&self) -> &TexturePool {
        &self.pool
    }

    pub fn output_resolution(&self) -> UVec2 {
        self.output_resolution
    }

    /// Designate the node whose upstream subgraph gets evaluated.
    pub fn set_output_node(&mut self, node_id: NodeId) {
        self.output_node = Some(node_id);
    }

    /// Editor hint that a node's parameters changed. Recorded for a future
    /// dirty-only evaluation mode; the current evaluator recomputes fully
    /// regardless.
    pub fn set_changed_node(&mut self, node_id: NodeId) {
        self.changed_node = Some(node_id);
        debug!("changed-node hint: {node_id}");
    }

    /// Last node reported through [`set_changed_node`](Self::set_changed_node).
    pub fn changed_node(&self) -> Option<NodeId> {
        self.changed_node
    }

    pub fn has_output_texture(&self) -> bool {
        self.output_texture.is_some()
    }

    /// Pool texture designated as the pass result, normally set by the
    /// output operator during the pass.
    pub fn output_texture(&self) -> Option<TextureHandle> {
        self.output_texture
    }

    pub fn set_output_texture(&mut self, handle: Option<TextureHandle>) {
        self.output_texture = handle;
    }

    /// Register the display-bound texture the pass result is uploaded
    /// into. Must be `Rgba32Float` with `COPY_DST` usage and match the
    /// output resolution. `None` disables publishing.
    pub fn set_publish_target(&mut self, target: Option<wgpu::Texture>) -> Result<(), EvalError> {
        if let Some(target) = &target {
            if target.format() != wgpu::TextureFormat::Rgba32Float {
                return Err(EvalError::Gpu(format!(
                    "publish target must be rgba32float, got {:?}",
                    target.format()
                )));
            }
        }
        self.publish_target = target;
        Ok(())
    }

    /// Run one full evaluation pass.
    ///
    /// Phases: reachability discovery, topological ordering, sequential
    /// operator execution with input-reference clearing, and publish. On
    /// error the pass aborts and the previously published image stays
    /// untouched.
    pub fn evaluate(&mut self, graph: &mut NodeGraph) -> Result<(), EvalError> {
        let output_node = self.output_node.ok_or(EvalError::NoOutputNode)?;
        let order = evaluation_order(graph, output_node)?;
        debug!("evaluating {} nodes: {:?}", order.len(), order);

        for &node_id in &order {
            self.evaluate_node(graph, node_id)?;
            // Release this node's inputs immediately so downstream nodes
            // can reuse the buffers later in the same pass.
            Self::clear_input_textures(graph, &mut self.pool, node_id);
        }

        self.publish()
    }

    fn evaluate_node(&mut self, graph: &mut NodeGraph, node_id: NodeId) -> Result<(), EvalError> {
        let (inputs, output_count) = {
            let node = graph.node(node_id).ok_or(EvalError::NodeNotFound(node_id))?;
            let inputs: Vec<Option<TextureHandle>> = node
                .inputs
                .iter()
                .map(|pin| graph.pin_texture(pin))
                .collect();
            (inputs, node.outputs.len())
        };

        let mut outputs: Vec<Option<TextureHandle>> = vec![None; output_count];
        {
            let mut ctx = EvalContext {
                gpu: &self.gpu,
                pool: &mut self.pool,
                output_resolution: self.output_resolution,
                inputs: &inputs,
                outputs: &mut outputs,
                publish_source: &mut self.output_texture,
            };
            let node = graph
                .node_mut(node_id)
                .ok_or(EvalError::NodeNotFound(node_id))?;
            node.op.evaluate(&mut ctx)?;
        }

        // Propagate each produced texture onto every edge leaving its
        // output pin, retaining once per edge.
        let mut assignments: Vec<(EdgeId, TextureHandle)> = Vec::new();
        if let Some(node) = graph.node(node_id) {
            for (pin, handle) in node.outputs.iter().zip(&outputs) {
                if let Some(handle) = handle {
                    for edge_id in pin.edges() {
                        assignments.push((*edge_id, *handle));
                    }
                }
            }
        }
        for (edge_id, handle) in assignments {
            if let Some(edge) = graph.edge_mut(edge_id) {
                edge.texture = Some(handle);
                self.pool.retain(handle);
            }
        }
        Ok(())
    }

    fn clear_input_textures(graph: &mut NodeGraph, pool: &mut TexturePool, node_id: NodeId) {
        let edge_ids: Vec<EdgeId> = match graph.node(node_id) {
            Some(node) => node
                .inputs
                .iter()
                .flat_map(|pin| pin.edges().iter().copied())
                .collect(),
            None => return,
        };
        for edge_id in edge_ids {
            if let Some(edge) = graph.edge_mut(edge_id) {
                if let Some(handle) = edge.texture.take() {
                    pool.release(handle);
                }
            }
        }
    }

    fn publish(&mut self) -> Result<(), EvalError> {
        let Some(target) = self.publish_target.as_ref() else {
            return Ok(());
        };
        let Some(handle) = self.output_texture else {
            debug!("publish skipped: no output texture designated");
            return Ok(());
        };

        // The only explicit synchronization point of a pass: all enqueued
        // kernel work has finished once this returns.
        self.gpu.wait_idle()?;

        let resolution = if handle.is_uniform() {
            self.output_resolution
        } else {
            handle.resolution()
        };
        if target.width() != resolution.x || target.height() != resolution.y {
            return Err(EvalError::PublishTargetMismatch {
                width: resolution.x,
                height: resolution.y,
                target_width: target.width(),
                target_height: target.height(),
            });
        }

        let pixels = match self.pool.device_texture(handle) {
            Some(texture) => self.gpu.read_texture(texture, resolution)?,
            None => {
                // Uniform result: expand the constant to a solid fill.
                let color = self.pool.uniform(handle).to_array();
                let count = (resolution.x * resolution.y) as usize;
                let mut pixels = Vec::with_capacity(count * 4);
                for _ in 0..count {
                    pixels.extend_from_slice(&color);
                }
                pixels
            }
        };

        self.gpu.write_texture(target, resolution, &pixels);
        debug!("published {}x{} output", resolution.x, resolution.y);
        Ok(())
    }

    /// Read a pool texture back into host memory as RGBA f32 pixels, after
    /// waiting for all enqueued work. Uniform textures return their single
    /// constant value.
    pub fn read_texture(&self, handle: TextureHandle) -> Result<Vec<f32>, EvalError> {
        self.gpu.wait_idle()?;
        match self.pool.device_texture(handle) {
            Some(texture) => self.gpu.read_texture(texture, handle.resolution()),
            None => Ok(self.pool.uniform(handle).to_array().to_vec()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::blend::MixNode;
    use crate::nodes::filter::{ExposureNode, InvertNode};
    use crate::nodes::generate::{ColorNode, UvGradientNode};
    use crate::nodes::output::OutputNode;
    use crate::nodes::test_support::gpu_evaluator;

    /// Src -> A, Src -> B, A -> Mix, B -> Mix, Mix -> Out
    fn diamond() -> (NodeGraph, [NodeId; 5]) {
        let mut graph = NodeGraph::new();
        let src = graph.add_node(UvGradientNode::create());
        let a = graph.add_node(InvertNode::create());
        let b = graph.add_node(ExposureNode::create());
        let mix = graph.add_node(MixNode::create());
        let out = graph.add_node(OutputNode::create());

        graph.connect_nodes(src, 0, a, 0).unwrap();
        graph.connect_nodes(src, 0, b, 0).unwrap();
        graph.connect_nodes(a, 0, mix, 0).unwrap();
        graph.connect_nodes(b, 0, mix, 1).unwrap();
        graph.connect_nodes(mix, 0, out, 0).unwrap();
        (graph, [src, a, b, mix, out])
    }

    fn position(order: &[NodeId], node: NodeId) -> usize {
        order
            .iter()
            .position(|id| *id == node)
            .unwrap_or_else(|| panic!("node {node} missing from order"))
    }

    #[test]
    fn diamond_order_respects_dependencies() {
        let (graph, [src, a, b, mix, out]) = diamond();
        let order = evaluation_order(&graph, out).unwrap();

        assert!(position(&order, src) < position(&order, a));
        assert!(position(&order, src) < position(&order, b));
        assert!(position(&order, a) < position(&order, mix));
        assert!(position(&order, b) < position(&order, mix));
        assert!(position(&order, mix) < position(&order, out));
    }

    #[test]
    fn order_covers_every_reachable_node() {
        let (mut graph, [_, _, _, _, out]) = diamond();
        // A stray node outside the output's upstream subgraph is ignored.
        let stray = graph.add_node(ColorNode::create(Vec4::ONE));

        let order = evaluation_order(&graph, out).unwrap();
        assert_eq!(order.len(), 5);
        assert!(!order.contains(&stray));
    }

    #[test]
    fn cycle_is_reported_not_truncated() {
        let mut graph = NodeGraph::new();
        let a = graph.add_node(InvertNode::create());
        let b = graph.add_node(InvertNode::create());
        let out = graph.add_node(OutputNode::create());

        graph.connect_nodes(a, 0, b, 0).unwrap();
        graph.connect_nodes(b, 0, a, 0).unwrap();
        graph.connect_nodes(a, 0, out, 0).unwrap();

        match evaluation_order(&graph, out) {
            Err(EvalError::CycleDetected { ordered, reachable }) => {
                assert_eq!(ordered, 0);
                assert_eq!(reachable, 3);
            }
            other => panic!("expected cycle error, got {other:?}"),
        }
    }

    #[test]
    fn missing_output_node_is_an_error() {
        let graph = NodeGraph::new();
        assert!(matches!(
            evaluation_order(&graph, 0),
            Err(EvalError::NodeNotFound(0))
        ));
    }

    #[test]
    fn evaluate_without_output_node_fails_cleanly() {
        let Some(mut evaluator) = gpu_evaluator(UVec2::new(4, 4)) else {
            return;
        };
        let mut graph = NodeGraph::new();
        assert!(matches!(
            evaluator.evaluate(&mut graph),
            Err(EvalError::NoOutputNode)
        ));
    }

    #[test]
    fn full_pass_clears_references_and_reuses_textures() {
        let Some(mut evaluator) = gpu_evaluator(UVec2::new(8, 8)) else {
            return;
        };
        let (mut graph, [_, _, _, _, out]) = diamond();
        evaluator.set_output_node(out);

        evaluator.evaluate(&mut graph).unwrap();
        assert!(evaluator.has_output_texture());

        // Every edge reference was cleared and released.
        assert!(graph.edges().all(|edge| edge.texture().is_none()));
        assert_eq!(evaluator.pool().stats().references, 0);

        // A second pass recycles the pool instead of growing it.
        let textures_after_first = evaluator.pool().stats().textures;
        evaluator.evaluate(&mut graph).unwrap();
        assert_eq!(evaluator.pool().stats().textures, textures_after_first);
        assert_eq!(evaluator.pool().stats().references, 0);
    }

    #[test]
    fn pass_without_publish_target_skips_phase_four() {
        let Some(mut evaluator) = gpu_evaluator(UVec2::new(4, 4)) else {
            return;
        };
        let mut graph = NodeGraph::new();
        let color = graph.add_node(ColorNode::create(Vec4::new(0.2, 0.4, 0.6, 1.0)));
        let out = graph.add_node(OutputNode::create());
        graph.connect_nodes(color, 0, out, 0).unwrap();
        evaluator.set_output_node(out);

        // No publish target registered: the pass completes and the result
        // is still designated.
        evaluator.evaluate(&mut graph).unwrap();
        assert!(evaluator.has_output_texture());
    }

    #[test]
    fn publish_uploads_result_into_target() {
        let Some(mut evaluator) = gpu_evaluator(UVec2::new(4, 4)) else {
            return;
        };
        let mut graph = NodeGraph::new();
        let color = graph.add_node(ColorNode::create(Vec4::new(0.25, 0.5, 0.75, 1.0)));
        let invert = graph.add_node(InvertNode::create());
        let out = graph.add_node(OutputNode::create());
        graph.connect_nodes(color, 0, invert, 0).unwrap();
        graph.connect_nodes(invert, 0, out, 0).unwrap();
        evaluator.set_output_node(out);

        let target = evaluator.gpu().device().create_texture(&wgpu::TextureDescriptor {
            label: Some("display"),
            size: wgpu::Extent3d {
                width: 4,
                height: 4,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba32Float,
            usage: wgpu::TextureUsages::COPY_DST | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        evaluator.set_publish_target(Some(target.clone())).unwrap();

        evaluator.evaluate(&mut graph).unwrap();

        let pixels = evaluator
            .gpu()
            .read_texture(&target, UVec2::new(4, 4))
            .unwrap();
        assert_eq!(pixels.len(), 4 * 4 * 4);
        for pixel in pixels.chunks_exact(4) {
            assert!((pixel[0] - 0.75).abs() < 1e-6);
            assert!((pixel[1] - 0.5).abs() < 1e-6);
            assert!((pixel[2] - 0.25).abs() < 1e-6);
            assert!((pixel[3] - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn fanned_out_texture_is_shared_then_recycled() {
        let Some(mut evaluator) = gpu_evaluator(UVec2::new(8, 8)) else {
            return;
        };
        let (mut graph, [_, _, _, _, out]) = diamond();
        evaluator.set_output_node(out);
        evaluator.evaluate(&mut graph).unwrap();

        // The source's image plus the two filter results plus the blend
        // result all come from the 8x8 bucket; with release-after-consume
        // the pass needs at most three image textures live at once.
        let resolution = UVec2::new(8, 8);
        let stats = evaluator.pool().stats();
        assert_eq!(evaluator.pool().free_count(resolution), 3);
        assert_eq!(stats.resident_bytes, 3 * 8 * 8 * 16);
    }
}
