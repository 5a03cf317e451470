//! Session identity and the render side of a session.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::Sender;

use tabfx_config::{EngineConfig, ParamId};
use tabfx_core::graph::{RenderReport, SignalGraph};
use tabfx_effects::pan_gains;

use crate::bus::{BusReader, ParameterBus};
use crate::io::{CaptureSource, CaptureStatus, OutputSink};
use crate::topology::{
    RenderProgress, SessionNodes, StagedSlot, TopologyManager, build_session_graph,
};

/// Identifier of a session. Assigned in increasing order, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    /// Wraps a raw id.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw id.
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session #{}", self.0)
    }
}

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Rendering.
    Active,
    /// Its capture ended or failed; waiting to be reaped.
    TearingDown,
    /// Gone. Every control call on it fails with `SessionClosed`.
    Closed,
}

/// Lifecycle notifications, each delivered once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The capture source reported end of stream.
    Ended(SessionId),
    /// The capture source failed.
    CaptureFault {
        /// Affected session.
        id: SessionId,
        /// The capture error, rendered.
        reason: String,
    },
    /// The output sink refused a block.
    SinkFault {
        /// Affected session.
        id: SessionId,
        /// The sink error, rendered.
        reason: String,
    },
}

/// Render side of a session: the node arena plus what it needs to follow
/// the control side.
///
/// Every [`render`](Self::render) call first installs a staged schedule,
/// if any, and applies parameters committed since the last call. Neither
/// allocates nor blocks.
///
/// Dropping the renderer marks the session finished, so the manager reaps
/// it and frees its slot.
pub struct SessionRenderer {
    id: SessionId,
    graph: SignalGraph,
    nodes: SessionNodes,
    params: BusReader,
    staged: StagedSlot,
    progress: Arc<RenderProgress>,
    stop: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
    fault_logged: bool,
}

impl std::fmt::Debug for SessionRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRenderer")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// Both halves of a freshly built session.
pub(crate) struct SessionParts {
    pub topology: TopologyManager,
    pub renderer: SessionRenderer,
    pub stop: Arc<AtomicBool>,
    pub finished: Arc<AtomicBool>,
    pub progress: Arc<RenderProgress>,
}

pub(crate) fn build_session(
    id: SessionId,
    config: &EngineConfig,
    bus: &ParameterBus,
) -> Result<SessionParts, tabfx_core::graph::GraphError> {
    let (topology, graph, nodes) = build_session_graph(config)?;
    let topology = TopologyManager::new(topology, nodes, &graph, config);
    let stop = Arc::new(AtomicBool::new(false));
    let finished = Arc::new(AtomicBool::new(false));
    let progress = topology.progress();
    let renderer = SessionRenderer {
        id,
        graph,
        nodes,
        params: bus.reader(),
        staged: topology.staged_slot(),
        progress: Arc::clone(&progress),
        stop: Arc::clone(&stop),
        finished: Arc::clone(&finished),
        fault_logged: false,
    };
    Ok(SessionParts {
        topology,
        renderer,
        stop,
        finished,
        progress,
    })
}

impl SessionRenderer {
    /// Session this renderer belongs to.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Frames per internal block.
    pub fn block_size(&self) -> usize {
        self.graph.block_size()
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> f32 {
        self.graph.sample_rate()
    }

    /// True once the session has been closed. A host driving the renderer
    /// should stop calling [`render`](Self::render) and drop it.
    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Contained node faults so far.
    pub fn fault_count(&self) -> u64 {
        self.graph.fault_count()
    }

    /// The underlying graph.
    pub fn graph(&self) -> &SignalGraph {
        &self.graph
    }

    /// Renders one block of input. Output slices must be at least as long
    /// as the input.
    pub fn render(
        &mut self,
        left_in: &[f32],
        right_in: &[f32],
        left_out: &mut [f32],
        right_out: &mut [f32],
    ) -> RenderReport {
        self.install_staged();
        if self.params.poll() {
            self.apply_params();
        }

        let report = self.graph.render(left_in, right_in, left_out, right_out);

        self.progress
            .frames
            .fetch_add(report.frames as u64, Ordering::Release);
        if report.faults > 0 {
            self.progress
                .faults
                .store(self.graph.fault_count(), Ordering::Release);
            if let Some(fault) = report.first_fault
                && !self.fault_logged
            {
                self.fault_logged = true;
                tracing::warn!(
                    session = %self.id,
                    node = fault.name,
                    reason = fault.reason,
                    "node fault contained, block silenced"
                );
            }
        }
        report
    }

    fn install_staged(&mut self) {
        let Some(staged) = self.staged.swap(None) else {
            return;
        };
        // The control side still holds both Arcs; dropping ours frees nothing.
        let previous = self.graph.swap_schedule(Arc::clone(&staged.schedule));
        drop(previous);
        self.progress
            .installed
            .store(staged.seq, Ordering::Release);
    }

    fn apply_params(&mut self) {
        let (left, right) = pan_gains(self.params.value(ParamId::Pan));
        self.graph.set_param(self.nodes.pan, 0, left);
        self.graph.set_param(self.nodes.pan, 1, right);

        for id in ParamId::all() {
            if let Some((node, index)) = self.nodes.param_target(id) {
                self.graph.set_param(node, index, self.params.value(id));
            }
        }
    }
}

impl Drop for SessionRenderer {
    fn drop(&mut self) {
        self.finished.store(true, Ordering::Release);
    }
}

/// A session's render thread body.
pub(crate) struct Worker {
    pub renderer: SessionRenderer,
    pub source: Box<dyn CaptureSource + Send>,
    pub sink: Box<dyn OutputSink + Send>,
    pub events: Sender<SessionEvent>,
}

impl Worker {
    /// Pulls, renders and pushes blocks until the source ends, something
    /// fails, or the stop flag is raised. A block that was read is always
    /// rendered and written in full. The session counts as finished once
    /// the renderer is dropped on return.
    pub fn run(mut self) {
        let id = self.renderer.id();
        let block = self.renderer.block_size();
        let (mut in_l, mut in_r) = (vec![0.0f32; block], vec![0.0f32; block]);
        let (mut out_l, mut out_r) = (vec![0.0f32; block], vec![0.0f32; block]);

        tracing::debug!(session = %id, block, "render worker started");
        while !self.renderer.is_stopped() {
            let frames = match self.source.read_block(&mut in_l, &mut in_r) {
                Ok(CaptureStatus::Frames(n)) => n.min(block),
                Ok(CaptureStatus::Ended) => {
                    tracing::info!(session = %id, "capture ended");
                    let _ = self.events.send(SessionEvent::Ended(id));
                    break;
                }
                Err(e) => {
                    tracing::warn!(session = %id, error = %e, "capture failed");
                    let _ = self.events.send(SessionEvent::CaptureFault {
                        id,
                        reason: e.to_string(),
                    });
                    break;
                }
            };

            self.renderer.render(
                &in_l[..frames],
                &in_r[..frames],
                &mut out_l[..frames],
                &mut out_r[..frames],
            );
            if let Err(e) = self.sink.write_block(&out_l[..frames], &out_r[..frames]) {
                tracing::warn!(session = %id, error = %e, "output failed");
                let _ = self.events.send(SessionEvent::SinkFault {
                    id,
                    reason: e.to_string(),
                });
                break;
            }
        }

        tracing::debug!(session = %id, "render worker stopped");
    }
}
