//! Construction of a topology / signal graph pair.

#[cfg(not(feature = "std"))]
use alloc::{boxed::Box, sync::Arc, vec::Vec};
#[cfg(feature = "std")]
use std::sync::Arc;

use crate::node::Node;

use super::buffer::BufferPool;
use super::edge::{ChannelRoute, EdgeId};
use super::node::{NodeId, NodeRole, NodeSlot, SlotKind};
use super::route::ChannelMerger;
use super::signal::SignalGraph;
use super::topology::{GraphError, GraphTopology};

/// Buffer slots preallocated when no capacity is given.
pub const DEFAULT_BUFFER_CAPACITY: usize = 8;

/// Builds the two halves of a graph with matching node ids.
///
/// All nodes a session may ever use are added up front. Nodes left
/// unconnected are inactive and can be spliced in later through the
/// returned [`GraphTopology`].
///
/// ```rust
/// use tabfx_core::graph::GraphBuilder;
///
/// let mut builder = GraphBuilder::new(48000.0, 64);
/// let input = builder.add_input();
/// let output = builder.add_output();
/// builder.connect(input, output).unwrap();
/// let (_topology, mut graph) = builder.build().unwrap();
///
/// let input_block = [0.25f32; 64];
/// let (mut l, mut r) = ([0.0f32; 64], [0.0f32; 64]);
/// graph.render(&input_block, &input_block, &mut l, &mut r);
/// assert_eq!(l, input_block);
/// ```
pub struct GraphBuilder {
    topology: GraphTopology,
    slots: Vec<NodeSlot>,
    sample_rate: f32,
    block_size: usize,
}

impl GraphBuilder {
    /// Starts a graph rendering `block_size` frames per block.
    pub fn new(sample_rate: f32, block_size: usize) -> Self {
        Self {
            topology: GraphTopology::new(DEFAULT_BUFFER_CAPACITY),
            slots: Vec::new(),
            sample_rate,
            block_size: block_size.max(1),
        }
    }

    /// Sets how many buffer slots the pool preallocates.
    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.topology.set_buffer_capacity(capacity.max(1));
        self
    }

    fn push(&mut self, role: NodeRole, name: &'static str, kind: SlotKind) -> NodeId {
        let id = self.topology.add_node(role, name);
        self.slots.push(NodeSlot::new(kind, self.sample_rate));
        id
    }

    /// Adds the external input.
    pub fn add_input(&mut self) -> NodeId {
        self.push(NodeRole::Input, "input", SlotKind::Passive)
    }

    /// Adds the external output.
    pub fn add_output(&mut self) -> NodeId {
        self.push(NodeRole::Output, "output", SlotKind::Passive)
    }

    /// Adds a processor.
    pub fn add_node(&mut self, node: Box<dyn Node + Send>) -> NodeId {
        let name = node.name();
        self.push(NodeRole::Processor, name, SlotKind::Processor(node))
    }

    /// Adds a channel splitter.
    pub fn add_splitter(&mut self) -> NodeId {
        self.push(NodeRole::Splitter, "splitter", SlotKind::Passive)
    }

    /// Adds a channel merger whose routing changes ramp over `ramp_ms`.
    pub fn add_merger(&mut self, ramp_ms: f32) -> NodeId {
        let merger = ChannelMerger::new(self.sample_rate, ramp_ms);
        self.push(NodeRole::Merger, "merger", SlotKind::Merger(merger))
    }

    /// Stereo edge, see [`GraphTopology::connect`].
    pub fn connect(&mut self, from: NodeId, to: NodeId) -> Result<EdgeId, GraphError> {
        self.topology.connect(from, to)
    }

    /// Channel route, see [`GraphTopology::connect_route`].
    pub fn connect_route(
        &mut self,
        splitter: NodeId,
        merger: NodeId,
        route: ChannelRoute,
    ) -> Result<EdgeId, GraphError> {
        self.topology.connect_route(splitter, merger, route)
    }

    /// Direct access to the topology under construction.
    pub fn topology_mut(&mut self) -> &mut GraphTopology {
        &mut self.topology
    }

    /// Compiles the topology and builds the render side around it.
    ///
    /// Wet/dry fades start at their compiled targets, so a freshly built
    /// graph renders without any fade-in.
    pub fn build(self) -> Result<(GraphTopology, SignalGraph), GraphError> {
        let schedule = self.topology.compile()?;
        let pool = BufferPool::new(self.topology.buffer_capacity(), self.block_size);
        let graph = SignalGraph::new(self.slots, Arc::new(schedule), pool, self.sample_rate);
        #[cfg(feature = "tracing")]
        tracing::debug!(
            "graph_build: {} nodes, {} edges, block {}",
            self.topology.node_count(),
            self.topology.edge_count(),
            self.block_size
        );
        Ok((self.topology, graph))
    }
}
