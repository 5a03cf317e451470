//! Control-side graph: connection map, validation and schedule compilation.
//!
//! [`GraphTopology`] never touches audio. It is patched on the control thread
//! (connect, disconnect, splice) and compiled into a [`CompiledSchedule`] that
//! the render side installs between blocks.
//!
//! Compilation runs in four phases:
//!
//! 1. **Validation**: exactly one input and one output; every node that has
//!    an edge must be reachable from the input and must reach the output.
//! 2. **Topological sort** (Kahn's algorithm) over the live nodes.
//! 3. **Emission** of raw steps over virtual buffers, one per stereo edge.
//!    Route edges do not get buffers of their own: the merger reads the
//!    buffer feeding its splitter directly.
//! 4. **Buffer assignment** by liveness analysis. A slot is live from the
//!    step that writes it to the last step that reads it, then returns to the
//!    free list. A linear chain of any length needs two slots.

#[cfg(not(feature = "std"))]
use alloc::{format, string::String, vec, vec::Vec};

use super::edge::{ChannelRoute, Edge, EdgeId, EdgeKind};
use super::node::{NodeId, NodeRole, TopoNode};
use super::route::RoutingMatrix;
use super::schedule::{CompiledSchedule, ProcessStep};

/// Errors from topology patches and compilation.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphError {
    /// The specified node was not found.
    NodeNotFound(NodeId),
    /// The specified edge was not found.
    EdgeNotFound(EdgeId),
    /// Adding this edge would create a cycle.
    CycleDetected,
    /// The graph must have exactly one input node.
    InvalidInputCount(usize),
    /// The graph must have exactly one output node.
    InvalidOutputCount(usize),
    /// A connection breaks a structural rule (e.g. an edge into the input).
    InvalidConnection(String),
    /// No edges at all.
    EmptyGraph,
    /// An identical edge already exists between these nodes.
    DuplicateEdge(NodeId, NodeId),
    /// A connected node is cut off from the input or the output.
    DanglingBranch(NodeId),
    /// The schedule needs more buffer slots than the pool provides.
    BufferBudgetExceeded {
        /// Slots the schedule needs.
        needed: usize,
        /// Slots available.
        capacity: usize,
    },
}

impl core::fmt::Display for GraphError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NodeNotFound(id) => write!(f, "node {id} not found"),
            Self::EdgeNotFound(id) => write!(f, "edge {id} not found"),
            Self::CycleDetected => write!(f, "adding this edge would create a cycle"),
            Self::InvalidInputCount(n) => write!(f, "expected 1 input node, found {n}"),
            Self::InvalidOutputCount(n) => write!(f, "expected 1 output node, found {n}"),
            Self::InvalidConnection(msg) => write!(f, "invalid connection: {msg}"),
            Self::EmptyGraph => write!(f, "graph has no edges"),
            Self::DuplicateEdge(a, b) => write!(f, "edge from {a} to {b} already exists"),
            Self::DanglingBranch(id) => {
                write!(f, "node {id} is not on a path from input to output")
            }
            Self::BufferBudgetExceeded { needed, capacity } => {
                write!(f, "schedule needs {needed} buffers, pool holds {capacity}")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for GraphError {}

/// Control-side topology of a signal graph.
#[derive(Debug, Clone)]
pub struct GraphTopology {
    nodes: Vec<TopoNode>,
    edges: Vec<Option<Edge>>,
    buffer_capacity: usize,
}

impl GraphTopology {
    /// Creates an empty topology whose schedules may use at most
    /// `buffer_capacity` buffer slots.
    pub fn new(buffer_capacity: usize) -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            buffer_capacity,
        }
    }

    pub(crate) fn set_buffer_capacity(&mut self, capacity: usize) {
        self.buffer_capacity = capacity;
    }

    pub(crate) fn add_node(&mut self, role: NodeRole, name: &'static str) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(TopoNode::new(role, name));
        #[cfg(feature = "tracing")]
        tracing::debug!("graph_add: {role:?} node {id} ({name})");
        id
    }

    // --- Queries ---

    /// Number of nodes, connected or not.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of live edges.
    pub fn edge_count(&self) -> usize {
        self.edges.iter().flatten().count()
    }

    /// Buffer slots available to compiled schedules.
    pub fn buffer_capacity(&self) -> usize {
        self.buffer_capacity
    }

    /// Role of `id`.
    pub fn role(&self, id: NodeId) -> Result<NodeRole, GraphError> {
        Ok(self.node(id)?.role)
    }

    /// Name given to `id` when it was added.
    pub fn name(&self, id: NodeId) -> Result<&'static str, GraphError> {
        Ok(self.node(id)?.name)
    }

    /// True if `id` has at least one edge.
    pub fn is_connected(&self, id: NodeId) -> bool {
        self.node(id).is_ok_and(TopoNode::has_edges)
    }

    /// The node fed by `id`'s stereo output, if any.
    pub fn successor(&self, id: NodeId) -> Option<NodeId> {
        let node = self.node(id).ok()?;
        node.outgoing
            .iter()
            .filter_map(|e| self.edge(*e))
            .find(|e| e.is_stereo())
            .map(|e| e.to)
    }

    /// The node feeding `id`'s stereo input, if any.
    pub fn predecessor(&self, id: NodeId) -> Option<NodeId> {
        let node = self.node(id).ok()?;
        node.incoming
            .iter()
            .filter_map(|e| self.edge(*e))
            .find(|e| e.is_stereo())
            .map(|e| e.from)
    }

    /// The stereo edge from `from` to `to`, if one exists.
    pub fn find_edge(&self, from: NodeId, to: NodeId) -> Option<EdgeId> {
        let node = self.node(from).ok()?;
        node.outgoing.iter().copied().find(|e| {
            self.edge(*e)
                .is_some_and(|edge| edge.to == to && edge.is_stereo())
        })
    }

    /// Every channel route from `splitter` to `merger`.
    pub fn routes_between(&self, splitter: NodeId, merger: NodeId) -> Vec<ChannelRoute> {
        let Ok(node) = self.node(splitter) else {
            return Vec::new();
        };
        node.outgoing
            .iter()
            .filter_map(|e| self.edge(*e))
            .filter(|e| e.to == merger)
            .filter_map(|e| match e.kind {
                EdgeKind::Route(r) => Some(r),
                EdgeKind::Stereo => None,
            })
            .collect()
    }

    /// Whether the node's compiled step is wet.
    pub fn is_wet(&self, id: NodeId) -> Result<bool, GraphError> {
        Ok(self.node(id)?.wet)
    }

    // --- Mutations ---

    /// Marks a processor wet (processed) or dry (input copied through).
    ///
    /// Takes effect at the next compile. The render side fades between the
    /// two states.
    pub fn set_wet(&mut self, id: NodeId, wet: bool) -> Result<(), GraphError> {
        let node = self.node_mut(id)?;
        if node.role != NodeRole::Processor {
            return Err(GraphError::InvalidConnection(format!(
                "{id} is not a processor and has no wet/dry state"
            )));
        }
        node.wet = wet;
        Ok(())
    }

    /// Connects `from` to `to` with a stereo edge.
    ///
    /// Fails if either node is missing, the edge would break a role rule,
    /// duplicate an existing edge, or close a cycle.
    pub fn connect(&mut self, from: NodeId, to: NodeId) -> Result<EdgeId, GraphError> {
        self.node(from)?;
        self.node(to)?;
        if self.find_edge(from, to).is_some() {
            return Err(GraphError::DuplicateEdge(from, to));
        }
        self.validate_stereo(from, to)?;
        if self.can_reach(to, from) {
            return Err(GraphError::CycleDetected);
        }
        let id = self.insert_edge(Edge {
            from,
            to,
            kind: EdgeKind::Stereo,
        });
        #[cfg(feature = "tracing")]
        tracing::debug!("graph_connect: {from} → {to}");
        Ok(id)
    }

    /// Connects a splitter to a merger with a single channel route.
    pub fn connect_route(
        &mut self,
        splitter: NodeId,
        merger: NodeId,
        route: ChannelRoute,
    ) -> Result<EdgeId, GraphError> {
        let from = self.node(splitter)?;
        let to = self.node(merger)?;
        if from.role != NodeRole::Splitter || to.role != NodeRole::Merger {
            return Err(GraphError::InvalidConnection(format!(
                "channel routes run from a splitter to a merger, not {:?} {splitter} → {:?} {merger}",
                from.role, to.role
            )));
        }
        if !route.gain.is_finite() {
            return Err(GraphError::InvalidConnection(format!(
                "route gain {} is not finite",
                route.gain
            )));
        }
        for edge in to.incoming.iter().filter_map(|e| self.edge(*e)) {
            if edge.from != splitter {
                return Err(GraphError::InvalidConnection(format!(
                    "merger {merger} is already fed by {}",
                    edge.from
                )));
            }
            if let EdgeKind::Route(existing) = edge.kind
                && existing.same_path(&route)
            {
                return Err(GraphError::DuplicateEdge(splitter, merger));
            }
        }
        if self.can_reach(merger, splitter) {
            return Err(GraphError::CycleDetected);
        }
        let id = self.insert_edge(Edge {
            from: splitter,
            to: merger,
            kind: EdgeKind::Route(route),
        });
        #[cfg(feature = "tracing")]
        tracing::debug!(
            "graph_route: {splitter} ⇉ {merger} {:?}→{:?} gain={:.3}",
            route.from,
            route.to,
            route.gain
        );
        Ok(id)
    }

    /// Removes an edge.
    pub fn disconnect(&mut self, id: EdgeId) -> Result<(), GraphError> {
        let edge = self
            .edges
            .get_mut(id.0 as usize)
            .and_then(Option::take)
            .ok_or(GraphError::EdgeNotFound(id))?;
        self.nodes[edge.from.slot()].outgoing.retain(|e| *e != id);
        self.nodes[edge.to.slot()].incoming.retain(|e| *e != id);
        #[cfg(feature = "tracing")]
        tracing::debug!("graph_disconnect: edge {id} ({} → {})", edge.from, edge.to);
        Ok(())
    }

    /// Removes every edge, stereo or route, from `from` to `to`.
    /// Returns how many were removed.
    pub fn disconnect_between(&mut self, from: NodeId, to: NodeId) -> Result<usize, GraphError> {
        let ids: Vec<EdgeId> = self
            .node(from)?
            .outgoing
            .iter()
            .copied()
            .filter(|e| self.edge(*e).is_some_and(|edge| edge.to == to))
            .collect();
        for id in &ids {
            self.disconnect(*id)?;
        }
        Ok(ids.len())
    }

    /// Splices an unconnected processor into the stereo edge `from → to`.
    ///
    /// On failure the topology is left as it was.
    pub fn insert_between(
        &mut self,
        from: NodeId,
        to: NodeId,
        node: NodeId,
    ) -> Result<(), GraphError> {
        let n = self.node(node)?;
        if n.role != NodeRole::Processor || n.has_edges() {
            return Err(GraphError::InvalidConnection(format!(
                "{node} must be an unconnected processor to be spliced in"
            )));
        }
        let edge = self.find_edge(from, to).ok_or_else(|| {
            GraphError::InvalidConnection(format!("no stereo edge {from} → {to} to splice into"))
        })?;
        self.disconnect(edge)?;

        if let Err(e) = self.connect(from, node) {
            self.restore(from, to);
            return Err(e);
        }
        if let Err(e) = self.connect(node, to) {
            self.disconnect_between(from, node)?;
            self.restore(from, to);
            return Err(e);
        }
        Ok(())
    }

    /// Unsplices a processor, reconnecting its predecessor to its successor.
    pub fn remove_from_chain(&mut self, node: NodeId) -> Result<(), GraphError> {
        let (Some(pred), Some(succ)) = (self.predecessor(node), self.successor(node)) else {
            return Err(GraphError::InvalidConnection(format!(
                "{node} is not spliced into a chain"
            )));
        };
        self.disconnect_between(pred, node)?;
        self.disconnect_between(node, succ)?;
        self.connect(pred, succ)?;
        Ok(())
    }

    // Reconnects an edge that was valid before a failed splice.
    fn restore(&mut self, from: NodeId, to: NodeId) {
        let edge = Edge {
            from,
            to,
            kind: EdgeKind::Stereo,
        };
        self.insert_edge(edge);
    }

    // --- Compilation ---

    /// Compiles the topology into a schedule.
    ///
    /// # Errors
    ///
    /// - [`GraphError::InvalidInputCount`] / [`GraphError::InvalidOutputCount`]
    /// - [`GraphError::EmptyGraph`] if there are no edges
    /// - [`GraphError::DanglingBranch`] for a connected node off the input→output paths
    /// - [`GraphError::CycleDetected`] (`connect` already refuses cycles)
    /// - [`GraphError::BufferBudgetExceeded`] if liveness needs more slots than the pool has
    pub fn compile(&self) -> Result<CompiledSchedule, GraphError> {
        let (input, output) = self.io_nodes()?;
        if self.edge_count() == 0 {
            return Err(GraphError::EmptyGraph);
        }

        let live: Vec<bool> = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| n.has_edges() || i == input.slot() || i == output.slot())
            .collect();
        let from_input = self.reachable(input, true);
        let to_output = self.reachable(output, false);
        for (i, &is_live) in live.iter().enumerate() {
            if is_live && !(from_input[i] && to_output[i]) {
                return Err(GraphError::DanglingBranch(NodeId(i as u32)));
            }
        }

        let sorted = self.kahn_sort(&live)?;
        #[cfg(feature = "tracing")]
        tracing::debug!("graph_sort: {} nodes in topo order", sorted.len());

        let (raw_steps, intervals) = self.emit_raw_schedule(&sorted);
        let (steps, buffer_count) = Self::assign_buffers(raw_steps, &intervals);

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "graph_buffers: {} steps, {} physical buffers (capacity {})",
            steps.len(),
            buffer_count,
            self.buffer_capacity
        );
        #[cfg(feature = "tracing")]
        for (i, step) in steps.iter().enumerate() {
            tracing::debug!("  step[{i}]: {step}");
        }

        if buffer_count > self.buffer_capacity {
            return Err(GraphError::BufferBudgetExceeded {
                needed: buffer_count,
                capacity: self.buffer_capacity,
            });
        }

        Ok(CompiledSchedule {
            steps,
            buffer_count,
        })
    }

    fn io_nodes(&self) -> Result<(NodeId, NodeId), GraphError> {
        let find = |role: NodeRole| -> Vec<NodeId> {
            self.nodes
                .iter()
                .enumerate()
                .filter(|(_, n)| n.role == role)
                .map(|(i, _)| NodeId(i as u32))
                .collect()
        };
        let inputs = find(NodeRole::Input);
        let outputs = find(NodeRole::Output);
        match (inputs.as_slice(), outputs.as_slice()) {
            ([i], [o]) => Ok((*i, *o)),
            ([_], outs) => Err(GraphError::InvalidOutputCount(outs.len())),
            (ins, _) => Err(GraphError::InvalidInputCount(ins.len())),
        }
    }

    // Nodes reachable from `start` following edges forward (or backward).
    fn reachable(&self, start: NodeId, forward: bool) -> Vec<bool> {
        let mut seen = vec![false; self.nodes.len()];
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            let idx = current.slot();
            if seen[idx] {
                continue;
            }
            seen[idx] = true;
            let node = &self.nodes[idx];
            let adjacent = if forward {
                &node.outgoing
            } else {
                &node.incoming
            };
            for edge in adjacent.iter().filter_map(|e| self.edge(*e)) {
                stack.push(if forward { edge.to } else { edge.from });
            }
        }
        seen
    }

    /// Kahn's algorithm over the live nodes. Ties resolve to the lowest id.
    fn kahn_sort(&self, live: &[bool]) -> Result<Vec<usize>, GraphError> {
        let n = self.nodes.len();
        let mut in_degree = vec![0u32; n];
        let live_count = live.iter().filter(|l| **l).count();

        for (i, node) in self.nodes.iter().enumerate() {
            if live[i] {
                in_degree[i] = node.incoming.len() as u32;
            }
        }

        let mut queue: Vec<usize> = (0..n).rev().filter(|&i| live[i] && in_degree[i] == 0).collect();
        let mut sorted = Vec::with_capacity(live_count);

        while let Some(idx) = queue.pop() {
            sorted.push(idx);
            for edge in self.nodes[idx].outgoing.iter().filter_map(|e| self.edge(*e)) {
                let to = edge.to.slot();
                in_degree[to] -= 1;
                if in_degree[to] == 0 {
                    queue.push(to);
                }
            }
        }

        if sorted.len() != live_count {
            return Err(GraphError::CycleDetected);
        }
        Ok(sorted)
    }

    /// Emits steps over virtual buffers (one per stereo edge) and returns the
    /// liveness interval `(first_write, last_read)` of each virtual buffer.
    fn emit_raw_schedule(&self, sorted: &[usize]) -> (Vec<RawStep>, Vec<(usize, usize)>) {
        let mut edge_to_vbuf: Vec<Option<usize>> = vec![None; self.edges.len()];
        let mut vbuf_count = 0usize;
        for (i, edge) in self.edges.iter().enumerate() {
            if edge.is_some_and(|e| e.is_stereo()) {
                edge_to_vbuf[i] = Some(vbuf_count);
                vbuf_count += 1;
            }
        }

        let mut first_write = vec![usize::MAX; vbuf_count];
        let mut last_read = vec![0usize; vbuf_count];
        let mut steps = Vec::new();

        let stereo_in = |node: &TopoNode| {
            node.incoming
                .iter()
                .find_map(|e| edge_to_vbuf[e.0 as usize])
        };
        let stereo_out = |node: &TopoNode| {
            node.outgoing
                .iter()
                .find_map(|e| edge_to_vbuf[e.0 as usize])
        };

        for &node_idx in sorted {
            let node = &self.nodes[node_idx];
            let s = steps.len();
            match node.role {
                NodeRole::Input => {
                    if let Some(ov) = stereo_out(node) {
                        steps.push(RawStep::WriteInput { vbuf: ov });
                        first_write[ov] = first_write[ov].min(s);
                    }
                }
                NodeRole::Output => {
                    if let Some(iv) = stereo_in(node) {
                        steps.push(RawStep::ReadOutput { vbuf: iv });
                        last_read[iv] = last_read[iv].max(s);
                    }
                }
                NodeRole::Processor => {
                    if let (Some(iv), Some(ov)) = (stereo_in(node), stereo_out(node)) {
                        steps.push(RawStep::ProcessNode {
                            node_idx,
                            input_vbuf: iv,
                            output_vbuf: ov,
                            wet: node.wet,
                        });
                        last_read[iv] = last_read[iv].max(s);
                        first_write[ov] = first_write[ov].min(s);
                    }
                }
                // The splitter's input is read by the merger's RouteChannels step.
                NodeRole::Splitter => {}
                NodeRole::Merger => {
                    let routes: Vec<(NodeId, ChannelRoute)> = node
                        .incoming
                        .iter()
                        .filter_map(|e| self.edge(*e))
                        .filter_map(|e| match e.kind {
                            EdgeKind::Route(r) => Some((e.from, r)),
                            EdgeKind::Stereo => None,
                        })
                        .collect();
                    let splitter_in = routes
                        .first()
                        .and_then(|(splitter, _)| stereo_in(&self.nodes[splitter.slot()]));
                    if let (Some(iv), Some(ov)) = (splitter_in, stereo_out(node)) {
                        let matrix = RoutingMatrix::from_routes(routes.iter().map(|(_, r)| r));
                        steps.push(RawStep::RouteChannels {
                            node_idx,
                            input_vbuf: iv,
                            output_vbuf: ov,
                            matrix,
                        });
                        last_read[iv] = last_read[iv].max(s);
                        first_write[ov] = first_write[ov].min(s);
                    }
                }
            }
        }

        let intervals = first_write.into_iter().zip(last_read).collect();
        (steps, intervals)
    }

    /// Assigns physical slots to virtual buffers by liveness.
    ///
    /// Register allocation for audio buffers: a slot is busy from first write
    /// to last read and free again on the following step, so a step never
    /// writes the slot it reads.
    fn assign_buffers(
        raw_steps: Vec<RawStep>,
        intervals: &[(usize, usize)],
    ) -> (Vec<ProcessStep>, usize) {
        let mut vbuf_to_phys: Vec<usize> = vec![0; intervals.len()];
        let mut phys_count = 0usize;
        // (step at which the slot becomes free, slot)
        let mut free_at: Vec<(usize, usize)> = Vec::new();

        let mut order: Vec<usize> = (0..intervals.len()).collect();
        order.sort_by_key(|&v| intervals[v].0);

        for vbuf in order {
            let (fw, lr) = intervals[vbuf];
            if fw == usize::MAX {
                continue;
            }
            let lr = lr.max(fw);
            let phys = if let Some(pos) = free_at.iter().position(|&(free, _)| free <= fw) {
                free_at.remove(pos).1
            } else {
                phys_count += 1;
                phys_count - 1
            };
            vbuf_to_phys[vbuf] = phys;
            free_at.push((lr + 1, phys));
        }

        let buffer_count = phys_count.max(1);
        let phys = |v: usize| vbuf_to_phys[v];
        let steps = raw_steps
            .into_iter()
            .map(|raw| match raw {
                RawStep::WriteInput { vbuf } => ProcessStep::WriteInput {
                    buffer_idx: phys(vbuf),
                },
                RawStep::ProcessNode {
                    node_idx,
                    input_vbuf,
                    output_vbuf,
                    wet,
                } => ProcessStep::ProcessNode {
                    node_idx,
                    input_buf: phys(input_vbuf),
                    output_buf: phys(output_vbuf),
                    wet,
                },
                RawStep::RouteChannels {
                    node_idx,
                    input_vbuf,
                    output_vbuf,
                    matrix,
                } => ProcessStep::RouteChannels {
                    node_idx,
                    input_buf: phys(input_vbuf),
                    output_buf: phys(output_vbuf),
                    matrix,
                },
                RawStep::ReadOutput { vbuf } => ProcessStep::ReadOutput {
                    buffer_idx: phys(vbuf),
                },
            })
            .collect();

        (steps, buffer_count)
    }

    // --- Internal helpers ---

    fn node(&self, id: NodeId) -> Result<&TopoNode, GraphError> {
        self.nodes.get(id.slot()).ok_or(GraphError::NodeNotFound(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut TopoNode, GraphError> {
        self.nodes
            .get_mut(id.slot())
            .ok_or(GraphError::NodeNotFound(id))
    }

    fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id.0 as usize).and_then(Option::as_ref)
    }

    fn insert_edge(&mut self, edge: Edge) -> EdgeId {
        let id = EdgeId(self.edges.len() as u32);
        self.edges.push(Some(edge));
        self.nodes[edge.from.slot()].outgoing.push(id);
        self.nodes[edge.to.slot()].incoming.push(id);
        id
    }

    fn stereo_out_count(&self, node: &TopoNode) -> usize {
        node.outgoing
            .iter()
            .filter(|e| self.edge(**e).is_some_and(Edge::is_stereo))
            .count()
    }

    /// DFS reachability: can `from` reach `to` along existing edges?
    fn can_reach(&self, from: NodeId, to: NodeId) -> bool {
        self.reachable(from, true)
            .get(to.slot())
            .copied()
            .unwrap_or(false)
    }

    /// Role rules for a stereo edge.
    fn validate_stereo(&self, from: NodeId, to: NodeId) -> Result<(), GraphError> {
        let src = self.node(from)?;
        let dst = self.node(to)?;

        if from == to {
            return Err(GraphError::CycleDetected);
        }
        if dst.role == NodeRole::Input {
            return Err(GraphError::InvalidConnection(format!(
                "cannot connect into input node {from}→{to}"
            )));
        }
        if src.role == NodeRole::Output {
            return Err(GraphError::InvalidConnection(format!(
                "cannot connect from output node {from}→{to}"
            )));
        }
        if src.role == NodeRole::Splitter {
            return Err(GraphError::InvalidConnection(format!(
                "splitter {from} only feeds channel routes"
            )));
        }
        if dst.role == NodeRole::Merger {
            return Err(GraphError::InvalidConnection(format!(
                "merger {to} only accepts channel routes"
            )));
        }
        if self.stereo_out_count(src) > 0 {
            return Err(GraphError::InvalidConnection(format!(
                "{:?} node {from} already has an outgoing edge",
                src.role
            )));
        }
        if !dst.incoming.is_empty() {
            return Err(GraphError::InvalidConnection(format!(
                "{:?} node {to} already has an incoming edge",
                dst.role
            )));
        }
        Ok(())
    }
}

/// Step over virtual buffers, before physical assignment.
#[derive(Debug)]
enum RawStep {
    WriteInput {
        vbuf: usize,
    },
    ProcessNode {
        node_idx: usize,
        input_vbuf: usize,
        output_vbuf: usize,
        wet: bool,
    },
    RouteChannels {
        node_idx: usize,
        input_vbuf: usize,
        output_vbuf: usize,
        matrix: RoutingMatrix,
    },
    ReadOutput {
        vbuf: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::edge::Channel;

    fn chain(len: usize) -> (GraphTopology, NodeId, NodeId, Vec<NodeId>) {
        let mut t = GraphTopology::new(8);
        let input = t.add_node(NodeRole::Input, "in");
        let output = t.add_node(NodeRole::Output, "out");
        let procs: Vec<NodeId> = (0..len)
            .map(|_| t.add_node(NodeRole::Processor, "p"))
            .collect();
        let mut prev = input;
        for &p in &procs {
            t.connect(prev, p).unwrap();
            prev = p;
        }
        t.connect(prev, output).unwrap();
        (t, input, output, procs)
    }

    #[test]
    fn test_linear_chain_uses_two_buffers() {
        let (t, _, _, _) = chain(20);
        let schedule = t.compile().unwrap();
        assert_eq!(schedule.buffer_count(), 2);
        assert_eq!(schedule.step_count(), 22);
        for step in schedule.steps() {
            if let ProcessStep::ProcessNode {
                input_buf,
                output_buf,
                ..
            } = step
            {
                assert_ne!(input_buf, output_buf);
            }
        }
    }

    #[test]
    fn test_direct_passthrough_uses_one_buffer() {
        let (t, _, _, _) = chain(0);
        let schedule = t.compile().unwrap();
        assert_eq!(schedule.buffer_count(), 1);
        assert_eq!(
            schedule.steps(),
            &[
                ProcessStep::WriteInput { buffer_idx: 0 },
                ProcessStep::ReadOutput { buffer_idx: 0 }
            ]
        );
    }

    #[test]
    fn test_cycle_rejected() {
        let (mut t, input, output, procs) = chain(3);
        t.disconnect_between(procs[2], output).unwrap();
        t.disconnect_between(input, procs[0]).unwrap();
        assert_eq!(t.connect(procs[2], procs[0]), Err(GraphError::CycleDetected));
    }

    #[test]
    fn test_io_rules() {
        let (mut t, input, output, procs) = chain(1);
        assert!(matches!(
            t.connect(procs[0], input),
            Err(GraphError::InvalidConnection(_))
        ));
        assert!(matches!(
            t.connect(output, procs[0]),
            Err(GraphError::InvalidConnection(_))
        ));
        assert_eq!(
            t.connect(input, procs[0]),
            Err(GraphError::DuplicateEdge(input, procs[0]))
        );
    }

    #[test]
    fn test_dangling_branch_rejected() {
        let (mut t, _, _, procs) = chain(2);
        let stray = t.add_node(NodeRole::Processor, "stray");
        let stray2 = t.add_node(NodeRole::Processor, "stray2");
        t.connect(stray, stray2).unwrap();
        assert_eq!(t.compile().unwrap_err(), GraphError::DanglingBranch(stray));

        // Unconnected nodes are simply inactive.
        t.disconnect_between(stray, stray2).unwrap();
        assert!(t.compile().is_ok());
        assert!(!t.is_connected(stray));
        assert!(t.is_connected(procs[0]));
    }

    #[test]
    fn test_io_count_checked() {
        let mut t = GraphTopology::new(8);
        t.add_node(NodeRole::Output, "out");
        assert_eq!(t.compile().unwrap_err(), GraphError::InvalidInputCount(0));
        t.add_node(NodeRole::Input, "in");
        t.add_node(NodeRole::Output, "out2");
        assert_eq!(t.compile().unwrap_err(), GraphError::InvalidOutputCount(2));
    }

    #[test]
    fn test_empty_graph() {
        let mut t = GraphTopology::new(8);
        t.add_node(NodeRole::Input, "in");
        t.add_node(NodeRole::Output, "out");
        assert_eq!(t.compile().unwrap_err(), GraphError::EmptyGraph);
    }

    #[test]
    fn test_insert_and_remove_from_chain() {
        let (mut t, input, output, procs) = chain(1);
        let extra = t.add_node(NodeRole::Processor, "extra");
        t.insert_between(input, procs[0], extra).unwrap();
        assert_eq!(t.successor(input), Some(extra));
        assert_eq!(t.successor(extra), Some(procs[0]));
        assert_eq!(t.compile().unwrap().step_count(), 4);

        t.remove_from_chain(extra).unwrap();
        assert_eq!(t.successor(input), Some(procs[0]));
        assert!(!t.is_connected(extra));
        assert_eq!(t.predecessor(output), Some(procs[0]));
    }

    #[test]
    fn test_failed_splice_restores_edge() {
        let (mut t, input, _, procs) = chain(1);
        // A connected processor cannot be spliced.
        let err = t.insert_between(input, procs[0], procs[0]);
        assert!(matches!(err, Err(GraphError::InvalidConnection(_))));
        assert!(t.find_edge(input, procs[0]).is_some());
    }

    #[test]
    fn test_split_merge_routes_compile() {
        let mut t = GraphTopology::new(8);
        let input = t.add_node(NodeRole::Input, "in");
        let split = t.add_node(NodeRole::Splitter, "split");
        let merge = t.add_node(NodeRole::Merger, "merge");
        let output = t.add_node(NodeRole::Output, "out");
        t.connect(input, split).unwrap();
        t.connect_route(split, merge, ChannelRoute::new(Channel::Left, Channel::Right, 1.0))
            .unwrap();
        t.connect_route(split, merge, ChannelRoute::new(Channel::Right, Channel::Left, 1.0))
            .unwrap();
        t.connect(merge, output).unwrap();

        let schedule = t.compile().unwrap();
        let matrix = schedule.routing_matrix(merge.index() as usize).unwrap();
        assert_eq!(matrix.gains, [[0.0, 1.0], [1.0, 0.0]]);
        assert_eq!(schedule.buffer_count(), 2);

        assert_eq!(
            t.connect_route(split, merge, ChannelRoute::new(Channel::Left, Channel::Right, 0.5)),
            Err(GraphError::DuplicateEdge(split, merge))
        );
        assert!(matches!(
            t.connect(split, output),
            Err(GraphError::InvalidConnection(_))
        ));
        assert_eq!(t.routes_between(split, merge).len(), 2);
        assert_eq!(t.disconnect_between(split, merge).unwrap(), 2);
        assert_eq!(t.compile().unwrap_err(), GraphError::DanglingBranch(split));
    }

    #[test]
    fn test_buffer_budget_enforced() {
        let (t, _, _, _) = chain(3);
        let mut tight = t.clone();
        tight.buffer_capacity = 1;
        assert_eq!(
            tight.compile().unwrap_err(),
            GraphError::BufferBudgetExceeded {
                needed: 2,
                capacity: 1
            }
        );
    }

    #[test]
    fn test_wet_flag_compiles_into_step() {
        let (mut t, _, _, procs) = chain(2);
        t.set_wet(procs[1], false).unwrap();
        let schedule = t.compile().unwrap();
        assert_eq!(schedule.is_wet(procs[0].index() as usize), Some(true));
        assert_eq!(schedule.is_wet(procs[1].index() as usize), Some(false));
        assert!(t.set_wet(NodeId(0), false).is_err());
    }
}
