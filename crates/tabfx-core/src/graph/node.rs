//! Graph node identifiers, roles and per-node bookkeeping.
//!
//! A node exists twice: once in the [`GraphTopology`](super::GraphTopology)
//! as a [`NodeRole`] with adjacency lists, and once in the
//! [`SignalGraph`](super::SignalGraph) arena as a slot holding the DSP state.
//! Both are indexed by the same [`NodeId`].

#[cfg(not(feature = "std"))]
use alloc::boxed::Box;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use crate::node::Node;
use crate::param::SmoothedParam;

use super::edge::EdgeId;
use super::route::ChannelMerger;

/// Unique identifier for a node.
///
/// Node IDs are assigned sequentially and never reused. They stay valid
/// across every patch and compile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Raw numeric identifier.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }

    /// Sentinel for node references that point nowhere.
    #[inline]
    pub fn sentinel() -> Self {
        Self(u32::MAX)
    }

    #[inline]
    pub(crate) fn slot(self) -> usize {
        self.0 as usize
    }
}

impl core::fmt::Display for NodeId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

/// The role a node plays in the topology.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeRole {
    /// External input. Exactly one per graph.
    Input,
    /// External output. Exactly one per graph.
    Output,
    /// A [`Node`] implementation: one stereo edge in, one out.
    Processor,
    /// Fans one stereo input out into channel routes.
    Splitter,
    /// Sums the channel routes of one splitter back into a stereo signal.
    Merger,
}

/// Control-side view of a node.
#[derive(Debug, Clone)]
pub(crate) struct TopoNode {
    pub role: NodeRole,
    pub name: &'static str,
    pub incoming: Vec<EdgeId>,
    pub outgoing: Vec<EdgeId>,
    /// Whether the node's output is wet (processed) or dry (input copied through).
    pub wet: bool,
}

impl TopoNode {
    pub fn new(role: NodeRole, name: &'static str) -> Self {
        Self {
            role,
            name,
            incoming: Vec::new(),
            outgoing: Vec::new(),
            wet: true,
        }
    }

    #[inline]
    pub fn has_edges(&self) -> bool {
        !self.incoming.is_empty() || !self.outgoing.is_empty()
    }
}

/// What a render-side slot holds.
pub(crate) enum SlotKind {
    /// Input, output and splitter nodes carry no state.
    Passive,
    Processor(Box<dyn Node + Send>),
    Merger(ChannelMerger),
}

/// Render-side state for one node.
pub(crate) struct NodeSlot {
    pub kind: SlotKind,
    /// Dry/wet envelope: 1.0 = wet, 0.0 = dry.
    pub fade: SmoothedParam,
    /// Epoch of the last schedule that contained this node.
    pub scheduled_epoch: u64,
}

impl NodeSlot {
    pub fn new(kind: SlotKind, sample_rate: f32) -> Self {
        let mut fade = SmoothedParam::fast(1.0, sample_rate);
        fade.snap_to_target();
        Self {
            kind,
            fade,
            scheduled_epoch: 0,
        }
    }
}
