//! Graph edge types.
//!
//! Most edges carry a full stereo signal from one node to the next. Edges
//! leaving a splitter instead carry a single [`ChannelRoute`]: one source
//! channel, one destination channel, and a gain. The merger at the other end
//! sums its routes into a 2×2 matrix.

/// Unique identifier for an edge.
///
/// Edge IDs are assigned sequentially and never reused within a topology.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EdgeId(pub(crate) u32);

impl EdgeId {
    /// Raw numeric identifier.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

impl core::fmt::Display for EdgeId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "EdgeId({})", self.0)
    }
}

/// One side of a stereo signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Left channel.
    Left,
    /// Right channel.
    Right,
}

impl Channel {
    /// 0 for left, 1 for right.
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Self::Left => 0,
            Self::Right => 1,
        }
    }
}

/// A splitter → merger connection carrying one channel at a fixed gain.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChannelRoute {
    /// Channel read from the splitter's input.
    pub from: Channel,
    /// Channel the merger writes.
    pub to: Channel,
    /// Linear gain applied along the route.
    pub gain: f32,
}

impl ChannelRoute {
    /// Creates a route.
    pub const fn new(from: Channel, to: Channel, gain: f32) -> Self {
        Self { from, to, gain }
    }

    /// True if both routes join the same channel pair, whatever their gains.
    #[inline]
    pub fn same_path(&self, other: &ChannelRoute) -> bool {
        self.from == other.from && self.to == other.to
    }
}

/// What an edge carries.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EdgeKind {
    /// Full stereo signal.
    Stereo,
    /// One channel routed from a splitter to a merger.
    Route(ChannelRoute),
}

/// A directed connection between two nodes.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Edge {
    pub from: super::node::NodeId,
    pub to: super::node::NodeId,
    pub kind: EdgeKind,
}

impl Edge {
    #[inline]
    pub fn is_stereo(&self) -> bool {
        matches!(self.kind, EdgeKind::Stereo)
    }
}
