//! Render-side graph: node arena, buffer pool and schedule execution.
//!
//! [`SignalGraph`] owns every node's DSP state and runs whatever
//! [`CompiledSchedule`] it was last given. It never compiles and never
//! allocates while rendering; new schedules arrive fully built through
//! [`swap_schedule`](SignalGraph::swap_schedule).
//!
//! Faults are contained here. When a processor returns an error or writes a
//! non-finite sample, its output block is replaced with silence, the node is
//! reset, and the fault is counted and reported to the caller.

#[cfg(not(feature = "std"))]
use alloc::{sync::Arc, vec::Vec};
#[cfg(feature = "std")]
use std::sync::Arc;

use crate::math::wet_dry_mix;
use crate::node::Node;

use super::buffer::BufferPool;
use super::node::{NodeId, NodeSlot, SlotKind};
use super::route::ChannelMerger;
use super::schedule::{CompiledSchedule, ProcessStep};

/// Time a wet/dry fade needs to settle completely.
///
/// The fade is a 5 ms one-pole; it snaps to its target once within 1e-6,
/// which takes just under 70 ms.
pub const WET_FADE_SETTLE_SECONDS: f32 = 0.1;

/// Description of a contained node fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultRecord {
    /// Faulting node.
    pub node: NodeId,
    /// The node's [`Node::name`].
    pub name: &'static str,
    /// What went wrong.
    pub reason: &'static str,
}

/// Outcome of one [`SignalGraph::render`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderReport {
    /// Frames rendered.
    pub frames: usize,
    /// Faults contained during this call.
    pub faults: u32,
    /// The first of those faults.
    pub first_fault: Option<FaultRecord>,
}

impl RenderReport {
    fn record(&mut self, fault: FaultRecord) {
        self.faults += 1;
        if self.first_fault.is_none() {
            self.first_fault = Some(fault);
        }
    }
}

/// Node arena plus the schedule currently being rendered.
pub struct SignalGraph {
    slots: Vec<NodeSlot>,
    schedule: Arc<CompiledSchedule>,
    pool: BufferPool,
    sample_rate: f32,
    block_size: usize,
    epoch: u64,
    fault_count: u64,
}

impl SignalGraph {
    pub(crate) fn new(
        slots: Vec<NodeSlot>,
        schedule: Arc<CompiledSchedule>,
        pool: BufferPool,
        sample_rate: f32,
    ) -> Self {
        let block_size = pool.block_size();
        let mut graph = Self {
            slots,
            schedule,
            pool,
            sample_rate,
            block_size,
            epoch: 1,
            fault_count: 0,
        };
        // The first schedule starts settled: wet nodes wet, dry nodes dry.
        let schedule = Arc::clone(&graph.schedule);
        for step in schedule.steps() {
            match step {
                ProcessStep::ProcessNode { node_idx, wet, .. } => {
                    let slot = &mut graph.slots[*node_idx];
                    slot.fade.set_immediate(if *wet { 1.0 } else { 0.0 });
                    slot.scheduled_epoch = graph.epoch;
                }
                ProcessStep::RouteChannels { node_idx, .. } => {
                    graph.slots[*node_idx].scheduled_epoch = graph.epoch;
                }
                _ => {}
            }
        }
        graph
    }

    /// Sample rate the nodes were built for.
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Frames per internal block.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Schedule currently rendered.
    pub fn schedule(&self) -> &Arc<CompiledSchedule> {
        &self.schedule
    }

    /// Total faults contained since the graph was built.
    pub fn fault_count(&self) -> u64 {
        self.fault_count
    }

    /// Installs `next` and returns whichever schedule is no longer in use.
    ///
    /// Normally that is the previous schedule. A schedule that refers to
    /// nodes or buffer slots this graph does not have is refused and handed
    /// straight back. Call between blocks only; dropping the returned `Arc`
    /// is the caller's business, so deallocation can stay off the render path.
    ///
    /// Processors that were not in the previous schedule start fully dry,
    /// with cleared state, and fade in.
    pub fn swap_schedule(&mut self, next: Arc<CompiledSchedule>) -> Arc<CompiledSchedule> {
        if !self.accepts(&next) {
            #[cfg(feature = "tracing")]
            tracing::warn!("graph_swap: refused schedule that exceeds this graph");
            return next;
        }

        self.mark_scheduled(&next);
        core::mem::replace(&mut self.schedule, next)
    }

    fn accepts(&self, schedule: &CompiledSchedule) -> bool {
        let (max_node, max_buf) = schedule.max_indices();
        max_node.is_none_or(|n| n < self.slots.len())
            && max_buf.is_none_or(|b| b < self.pool.count())
            && schedule.buffer_count() <= self.pool.count()
    }

    fn mark_scheduled(&mut self, schedule: &CompiledSchedule) {
        let previous = self.epoch;
        self.epoch += 1;
        for step in schedule.steps() {
            let node_idx = match step {
                ProcessStep::ProcessNode { node_idx, .. }
                | ProcessStep::RouteChannels { node_idx, .. } => *node_idx,
                _ => continue,
            };
            let slot = &mut self.slots[node_idx];
            if slot.scheduled_epoch != previous {
                if let SlotKind::Processor(node) = &mut slot.kind {
                    node.reset();
                }
                slot.fade.set_immediate(0.0);
            }
            slot.scheduled_epoch = self.epoch;
        }
    }

    /// Renders `left_in`/`right_in` into `left_out`/`right_out`.
    ///
    /// Input longer than the block size is processed in block-sized chunks.
    /// Output slices must be at least as long as the input.
    pub fn render(
        &mut self,
        left_in: &[f32],
        right_in: &[f32],
        left_out: &mut [f32],
        right_out: &mut [f32],
    ) -> RenderReport {
        let frames = left_in.len().min(right_in.len());
        debug_assert!(left_out.len() >= frames && right_out.len() >= frames);
        let mut report = RenderReport {
            frames,
            ..RenderReport::default()
        };

        let mut start = 0;
        while start < frames {
            let end = (start + self.block_size).min(frames);
            run_schedule(
                &mut self.slots,
                &self.schedule,
                &mut self.pool,
                &left_in[start..end],
                &right_in[start..end],
                &mut left_out[start..end],
                &mut right_out[start..end],
                &mut report,
            );
            start = end;
        }

        self.fault_count += u64::from(report.faults);
        report
    }

    /// Sets a processor parameter. Returns false if `id` is not a processor.
    pub fn set_param(&mut self, id: NodeId, index: usize, value: f32) -> bool {
        match self.node_mut(id) {
            Some(node) => {
                node.set_param(index, value);
                true
            }
            None => false,
        }
    }

    /// Reads a processor parameter.
    pub fn get_param(&self, id: NodeId, index: usize) -> Option<f32> {
        match &self.slots.get(id.slot())?.kind {
            SlotKind::Processor(node) => Some(node.get_param(index)),
            _ => None,
        }
    }

    /// Mutable access to a processor.
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut (dyn Node + Send + 'static)> {
        match &mut self.slots.get_mut(id.slot())?.kind {
            SlotKind::Processor(node) => Some(node.as_mut()),
            _ => None,
        }
    }

    /// Shared access to a processor.
    pub fn node_ref(&self, id: NodeId) -> Option<&(dyn Node + Send + 'static)> {
        match &self.slots.get(id.slot())?.kind {
            SlotKind::Processor(node) => Some(node.as_ref()),
            _ => None,
        }
    }

    /// The merger state at `id`.
    pub fn merger(&self, id: NodeId) -> Option<&ChannelMerger> {
        match &self.slots.get(id.slot())?.kind {
            SlotKind::Merger(m) => Some(m),
            _ => None,
        }
    }

    /// Current wet level (0 = dry, 1 = wet) of a processor.
    pub fn wet_level(&self, id: NodeId) -> Option<f32> {
        let slot = self.slots.get(id.slot())?;
        matches!(slot.kind, SlotKind::Processor(_)).then(|| slot.fade.get())
    }

    /// Resets every node and finishes all fades and ramps.
    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            match &mut slot.kind {
                SlotKind::Processor(node) => node.reset(),
                SlotKind::Merger(m) => m.reset(),
                SlotKind::Passive => {}
            }
            slot.fade.snap_to_target();
        }
        self.pool.clear_all();
    }
}

/// Executes one chunk of at most `block_size` frames.
///
/// A free function so the slot arena, the schedule and the pool can be
/// borrowed disjointly.
#[allow(clippy::too_many_arguments)]
fn run_schedule(
    slots: &mut [NodeSlot],
    schedule: &CompiledSchedule,
    pool: &mut BufferPool,
    left_in: &[f32],
    right_in: &[f32],
    left_out: &mut [f32],
    right_out: &mut [f32],
    report: &mut RenderReport,
) {
    let len = left_in.len();

    for step in schedule.steps() {
        match *step {
            ProcessStep::WriteInput { buffer_idx } => {
                let buf = pool.get_mut(buffer_idx);
                buf.left[..len].copy_from_slice(left_in);
                buf.right[..len].copy_from_slice(right_in);
            }

            ProcessStep::ProcessNode {
                node_idx,
                input_buf,
                output_buf,
                wet,
            } => {
                if input_buf == output_buf {
                    continue;
                }
                let slot = &mut slots[node_idx];
                let (src, dst) = pool.pair_mut(input_buf, output_buf);
                let SlotKind::Processor(node) = &mut slot.kind else {
                    dst.copy_from(src, len);
                    continue;
                };

                slot.fade.set_target(if wet { 1.0 } else { 0.0 });
                let fading = !slot.fade.is_settled();
                if !wet && !fading {
                    dst.copy_from(src, len);
                    continue;
                }

                let result = node.process_block(
                    &src.left[..len],
                    &src.right[..len],
                    &mut dst.left[..len],
                    &mut dst.right[..len],
                );
                let failure = match result {
                    Err(fault) => Some(fault.reason),
                    Ok(()) if !dst.is_finite(len) => Some("non-finite output"),
                    Ok(()) => None,
                };
                if let Some(reason) = failure {
                    dst.clear_frames(len);
                    node.reset();
                    report.record(FaultRecord {
                        node: NodeId(node_idx as u32),
                        name: node.name(),
                        reason,
                    });
                }

                if fading {
                    for i in 0..len {
                        let mix = slot.fade.advance();
                        dst.left[i] = wet_dry_mix(src.left[i], dst.left[i], mix);
                        dst.right[i] = wet_dry_mix(src.right[i], dst.right[i], mix);
                    }
                }
            }

            ProcessStep::RouteChannels {
                node_idx,
                input_buf,
                output_buf,
                ref matrix,
            } => {
                if input_buf == output_buf {
                    continue;
                }
                let (src, dst) = pool.pair_mut(input_buf, output_buf);
                match &mut slots[node_idx].kind {
                    SlotKind::Merger(merger) => {
                        merger.set_matrix(matrix);
                        merger.route(
                            &src.left[..len],
                            &src.right[..len],
                            &mut dst.left[..len],
                            &mut dst.right[..len],
                        );
                    }
                    _ => dst.copy_from(src, len),
                }
            }

            ProcessStep::ReadOutput { buffer_idx } => {
                let buf = pool.get(buffer_idx);
                left_out.copy_from_slice(&buf.left[..len]);
                right_out.copy_from_slice(&buf.right[..len]);
            }
        }
    }
}
