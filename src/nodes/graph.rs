//! Node graph data structures and wiring operations
//!
//! The graph is the arena: it owns every node (and through them, every
//! pin) and every edge. Everything else refers to graph contents through
//! ids. Wiring operations (`connect`/`disconnect`) belong to the editor
//! layer driving this crate; evaluation only reads the structure and
//! moves texture references across the edges.

use std::collections::HashMap;

use crate::error::GraphError;
use crate::gpu::TextureHandle;
use crate::nodes::node::{Node, NodeId, NODE_ID_STRIDE};
use crate::nodes::pin::{Pin, PinId};

/// Unique identifier for an edge
pub type EdgeId = usize;

/// A directed link from an output pin to an input pin, carrying the
/// texture reference that flows between them during a pass.
#[derive(Debug, Clone)]
pub struct Edge {
    pub id: EdgeId,
    pub from: PinId,
    pub to: PinId,
    pub(crate) texture: Option<TextureHandle>,
}

impl Edge {
    /// Texture currently flowing over this edge, if any. Populated only
    /// while a pass is between the producer's and the consumer's turn.
    pub fn texture(&self) -> Option<TextureHandle> {
        self.texture
    }
}

/// A graph containing nodes and the edges wired between their pins.
#[derive(Debug, Default)]
pub struct NodeGraph {
    nodes: HashMap<NodeId, Node>,
    edges: HashMap<EdgeId, Edge>,
    next_node_id: NodeId,
    next_edge_id: EdgeId,
}

impl NodeGraph {
    /// Creates a new empty node graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node to the graph and returns its id.
    ///
    /// The node receives the next id slot (advanced by [`NODE_ID_STRIDE`])
    /// and its pins are renumbered into that slot, inputs first.
    pub fn add_node(&mut self, mut node: Node) -> NodeId {
        let id = self.next_node_id;
        self.next_node_id += NODE_ID_STRIDE;
        node.assign_ids(id);
        self.nodes.insert(id, node);
        id
    }

    /// Removes a node and detaches all edges touching its pins.
    pub fn remove_node(&mut self, node_id: NodeId) -> Option<Node> {
        let edge_ids: Vec<EdgeId> = match self.nodes.get(&node_id) {
            Some(node) => node
                .inputs
                .iter()
                .chain(node.outputs.iter())
                .flat_map(|pin| pin.edges().iter().copied())
                .collect(),
            None => return None,
        };
        for edge_id in edge_ids {
            self.disconnect(edge_id);
        }
        self.nodes.remove(&node_id)
    }

    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    pub fn node_mut(&mut self, node_id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&node_id)
    }

    pub fn contains_node(&self, node_id: NodeId) -> bool {
        self.nodes.contains_key(&node_id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge(&self, edge_id: EdgeId) -> Option<&Edge> {
        self.edges.get(&edge_id)
    }

    pub(crate) fn edge_mut(&mut self, edge_id: EdgeId) -> Option<&mut Edge> {
        self.edges.get_mut(&edge_id)
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Id of the node owning a pin, recovered from the id stride layout.
    pub fn owner_of(pin_id: PinId) -> NodeId {
        (pin_id.saturating_sub(1) / NODE_ID_STRIDE) * NODE_ID_STRIDE
    }

    /// Looks up a pin anywhere in the graph by its id.
    pub fn pin(&self, pin_id: PinId) -> Option<&Pin> {
        self.nodes
            .get(&Self::owner_of(pin_id))
            .and_then(|node| node.pin(pin_id))
    }

    fn pin_mut(&mut self, pin_id: PinId) -> Option<&mut Pin> {
        self.nodes
            .get_mut(&Self::owner_of(pin_id))
            .and_then(|node| node.pin_mut(pin_id))
    }

    /// Wires an edge from an output pin to an input pin.
    ///
    /// An input pin accepts at most one incoming edge; output pins fan out
    /// freely.
    pub fn connect(&mut self, from: PinId, to: PinId) -> Result<EdgeId, GraphError> {
        if Self::owner_of(from) == Self::owner_of(to) {
            return Err(GraphError::SelfConnection);
        }
        {
            let from_pin = self.pin(from).ok_or(GraphError::PinNotFound(from))?;
            if !from_pin.is_output() {
                return Err(GraphError::PinDirection);
            }
        }
        let to_pin = self.pin(to).ok_or(GraphError::PinNotFound(to))?;
        if !to_pin.is_input() {
            return Err(GraphError::PinDirection);
        }
        if to_pin.has_edge() {
            return Err(GraphError::InputPinOccupied(to));
        }

        let edge_id = self.next_edge_id;
        self.next_edge_id += 1;
        self.edges.insert(
            edge_id,
            Edge {
                id: edge_id,
                from,
                to,
                texture: None,
            },
        );
        if let Some(pin) = self.pin_mut(from) {
            pin.edges.push(edge_id);
        }
        if let Some(pin) = self.pin_mut(to) {
            pin.edges.push(edge_id);
        }
        Ok(edge_id)
    }

    /// Convenience wiring by node id and pin index.
    pub fn connect_nodes(
        &mut self,
        from_node: NodeId,
        output: usize,
        to_node: NodeId,
        input: usize,
    ) -> Result<EdgeId, GraphError> {
        let from = self
            .nodes
            .get(&from_node)
            .ok_or(GraphError::NodeNotFound(from_node))?
            .output_pin_id(output)
            .ok_or(GraphError::PinIndexOutOfRange {
                node: from_node,
                index: output,
            })?;
        let to = self
            .nodes
            .get(&to_node)
            .ok_or(GraphError::NodeNotFound(to_node))?
            .input_pin_id(input)
            .ok_or(GraphError::PinIndexOutOfRange {
                node: to_node,
                index: input,
            })?;
        self.connect(from, to)
    }

    /// Removes an edge and detaches it from both endpoint pins.
    ///
    /// Edges carry texture references only while a pass is running, and
    /// wiring happens between passes, so disconnecting never drops a live
    /// reference.
    pub fn disconnect(&mut self, edge_id: EdgeId) -> Option<Edge> {
        let edge = self.edges.remove(&edge_id)?;
        if let Some(pin) = self.pin_mut(edge.from) {
            pin.edges.retain(|id| *id != edge_id);
        }
        if let Some(pin) = self.pin_mut(edge.to) {
            pin.edges.retain(|id| *id != edge_id);
        }
        Some(edge)
    }

    /// Effective texture seen by an input pin: the one carried by its
    /// first connected edge (input pins hold at most one).
    pub fn pin_texture(&self, pin: &Pin) -> Option<TextureHandle> {
        pin.edges
            .first()
            .and_then(|edge_id| self.edges.get(edge_id))
            .and_then(|edge| edge.texture)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::blend::MixNode;
    use crate::nodes::filter::InvertNode;
    use crate::nodes::generate::UvGradientNode;

    #[test]
    fn pin_ids_are_unique_and_within_stride() {
        let mut graph = NodeGraph::new();
        let ids = [
            graph.add_node(UvGradientNode::create()),
            graph.add_node(InvertNode::create()),
            graph.add_node(MixNode::create()),
        ];

        let mut seen = std::collections::HashSet::new();
        for node_id in ids {
            let node = graph.node(node_id).unwrap();
            for pin in node.inputs.iter().chain(node.outputs.iter()) {
                assert!(pin.id > node.id, "pin id must exceed node id");
                assert!(pin.id <= node.id + NODE_ID_STRIDE, "pin id outside stride");
                assert!(seen.insert(pin.id), "duplicate pin id {}", pin.id);
                assert_eq!(NodeGraph::owner_of(pin.id), node.id);
            }
        }
    }

    #[test]
    fn pin_lookup_by_id() {
        let mut graph = NodeGraph::new();
        let mix = graph.add_node(MixNode::create());
        let node = graph.node(mix).unwrap();

        let factor = node.input_pin_id(2).unwrap();
        let pin = graph.pin(factor).unwrap();
        assert!(pin.is_input());
        assert_eq!(pin.name, "Factor");

        let out = node.output_pin_id(0).unwrap();
        assert!(graph.pin(out).unwrap().is_output());
    }

    #[test]
    fn connect_validates_direction_and_endpoints() {
        let mut graph = NodeGraph::new();
        let src = graph.add_node(UvGradientNode::create());
        let dst = graph.add_node(InvertNode::create());

        let src_out = graph.node(src).unwrap().output_pin_id(0).unwrap();
        let dst_in = graph.node(dst).unwrap().input_pin_id(0).unwrap();

        assert_eq!(
            graph.connect(dst_in, src_out),
            Err(GraphError::PinDirection)
        );
        assert_eq!(
            graph.connect(src_out, src_out),
            Err(GraphError::SelfConnection)
        );
        assert!(graph.connect(src_out, dst_in).is_ok());
    }

    #[test]
    fn input_pins_accept_a_single_edge() {
        let mut graph = NodeGraph::new();
        let a = graph.add_node(UvGradientNode::create());
        let b = graph.add_node(UvGradientNode::create());
        let mix = graph.add_node(MixNode::create());

        graph.connect_nodes(a, 0, mix, 0).unwrap();
        let mix_in = graph.node(mix).unwrap().input_pin_id(0).unwrap();
        let b_out = graph.node(b).unwrap().output_pin_id(0).unwrap();
        assert_eq!(
            graph.connect(b_out, mix_in),
            Err(GraphError::InputPinOccupied(mix_in))
        );

        // The second input is still open.
        graph.connect_nodes(b, 0, mix, 1).unwrap();
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn disconnect_detaches_both_pins() {
        let mut graph = NodeGraph::new();
        let src = graph.add_node(UvGradientNode::create());
        let dst = graph.add_node(InvertNode::create());
        let edge = graph.connect_nodes(src, 0, dst, 0).unwrap();

        assert!(graph.disconnect(edge).is_some());
        assert_eq!(graph.edge_count(), 0);
        let src_out = graph.node(src).unwrap().output_pin_id(0).unwrap();
        let dst_in = graph.node(dst).unwrap().input_pin_id(0).unwrap();
        assert!(!graph.pin(src_out).unwrap().has_edge());
        assert!(!graph.pin(dst_in).unwrap().has_edge());

        // The freed input accepts a new edge.
        assert!(graph.connect_nodes(src, 0, dst, 0).is_ok());
    }

    #[test]
    fn remove_node_detaches_its_edges() {
        let mut graph = NodeGraph::new();
        let src = graph.add_node(UvGradientNode::create());
        let dst = graph.add_node(InvertNode::create());
        graph.connect_nodes(src, 0, dst, 0).unwrap();

        assert!(graph.remove_node(src).is_some());
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.edge_count(), 0);
        let dst_in = graph.node(dst).unwrap().input_pin_id(0).unwrap();
        assert!(!graph.pin(dst_in).unwrap().has_edge());
    }
}
