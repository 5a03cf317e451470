//! Compiled schedule types.
//!
//! A [`CompiledSchedule`] is an immutable snapshot produced by
//! [`GraphTopology::compile()`](super::GraphTopology::compile): a flat list of
//! [`ProcessStep`]s that the render side executes in order against its
//! [`BufferPool`](super::BufferPool). Schedules are shared through `Arc`, so
//! the render side only ever sees a complete one.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use super::route::RoutingMatrix;

/// One instruction of a compiled schedule.
///
/// All variants are plain data: executing a step never allocates.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessStep {
    /// Copy the external input into a buffer slot.
    WriteInput {
        /// Destination slot.
        buffer_idx: usize,
    },

    /// Run a processor node from one slot into another.
    ProcessNode {
        /// Arena index of the node.
        node_idx: usize,
        /// Slot holding the node's input.
        input_buf: usize,
        /// Slot receiving the node's output.
        output_buf: usize,
        /// False fades the node out to a dry copy of its input.
        wet: bool,
    },

    /// Route channels from a splitter's input into a merger's output.
    RouteChannels {
        /// Arena index of the merger node.
        node_idx: usize,
        /// Slot feeding the splitter.
        input_buf: usize,
        /// Slot receiving the merged signal.
        output_buf: usize,
        /// Sum of all route edges into the merger.
        matrix: RoutingMatrix,
    },

    /// Copy a buffer slot to the external output.
    ReadOutput {
        /// Source slot.
        buffer_idx: usize,
    },
}

impl core::fmt::Display for ProcessStep {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::WriteInput { buffer_idx } => write!(f, "WriteInput → buf[{buffer_idx}]"),
            Self::ProcessNode {
                node_idx,
                input_buf,
                output_buf,
                wet,
            } => write!(
                f,
                "ProcessNode node[{node_idx}] buf[{input_buf}] → buf[{output_buf}]{}",
                if *wet { "" } else { " (dry)" }
            ),
            Self::RouteChannels {
                node_idx,
                input_buf,
                output_buf,
                matrix,
            } => write!(
                f,
                "RouteChannels node[{node_idx}] buf[{input_buf}] → buf[{output_buf}] {:?}",
                matrix.gains
            ),
            Self::ReadOutput { buffer_idx } => write!(f, "ReadOutput ← buf[{buffer_idx}]"),
        }
    }
}

/// Immutable compiled snapshot of a topology.
#[derive(Debug, Clone)]
pub struct CompiledSchedule {
    pub(crate) steps: Vec<ProcessStep>,
    pub(crate) buffer_count: usize,
}

impl CompiledSchedule {
    /// Steps in execution order.
    pub fn steps(&self) -> &[ProcessStep] {
        &self.steps
    }

    /// Number of processing steps.
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Number of buffer slots the schedule uses.
    pub fn buffer_count(&self) -> usize {
        self.buffer_count
    }

    /// True if the node at `node_idx` is processed or routed by this schedule.
    pub fn contains_node(&self, node_idx: usize) -> bool {
        self.steps.iter().any(|s| match s {
            ProcessStep::ProcessNode { node_idx: n, .. }
            | ProcessStep::RouteChannels { node_idx: n, .. } => *n == node_idx,
            _ => false,
        })
    }

    /// The `wet` flag of the node's step, if the node is scheduled as a processor.
    pub fn is_wet(&self, node_idx: usize) -> Option<bool> {
        self.steps.iter().find_map(|s| match s {
            ProcessStep::ProcessNode {
                node_idx: n, wet, ..
            } if *n == node_idx => Some(*wet),
            _ => None,
        })
    }

    /// The routing matrix applied by the merger at `node_idx`.
    pub fn routing_matrix(&self, node_idx: usize) -> Option<RoutingMatrix> {
        self.steps.iter().find_map(|s| match s {
            ProcessStep::RouteChannels {
                node_idx: n,
                matrix,
                ..
            } if *n == node_idx => Some(*matrix),
            _ => None,
        })
    }

    // Largest node index and buffer index referenced.
    pub(crate) fn max_indices(&self) -> (Option<usize>, Option<usize>) {
        let mut node = None;
        let mut buf = None;
        let mut see_buf = |b: usize| buf = Some(buf.map_or(b, |m: usize| m.max(b)));
        for step in &self.steps {
            match step {
                ProcessStep::WriteInput { buffer_idx } | ProcessStep::ReadOutput { buffer_idx } => {
                    see_buf(*buffer_idx);
                }
                ProcessStep::ProcessNode {
                    node_idx,
                    input_buf,
                    output_buf,
                    ..
                }
                | ProcessStep::RouteChannels {
                    node_idx,
                    input_buf,
                    output_buf,
                    ..
                } => {
                    node = Some(node.map_or(*node_idx, |m: usize| m.max(*node_idx)));
                    see_buf(*input_buf);
                    see_buf(*output_buf);
                }
            }
        }
        (node, buf)
    }
}
