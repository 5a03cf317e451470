//! Session graph layout and live patching.
//!
//! Every session renders the same chain:
//!
//! ```text
//! input → [pitch] → [chorus] → [convolver] → eq0 … eq9 → compressor
//!       → pan → splitter ⇉ merger → volume → output
//! ```
//!
//! All nodes are created up front. The bracketed effects start unconnected
//! and are spliced in on demand. Mono and invert never touch a node: they
//! only swap the channel routes between the splitter and the merger, whose
//! routing matrix ramps to the new value.
//!
//! [`TopologyManager`] owns the control-side [`GraphTopology`]. After each
//! patch it compiles a schedule and stages it in an `ArcSwapOption` that the
//! renderer drains at its next block. Every published schedule is also kept
//! in a retire list and only dropped once nothing else references it, so the
//! render thread never frees schedule memory.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwapOption;

use tabfx_config::{EffectFlags, EngineConfig, ParamId};
use tabfx_core::graph::{
    Channel, ChannelRoute, CompiledSchedule, GraphBuilder, GraphError, GraphTopology, NodeId,
    SignalGraph, WET_FADE_SETTLE_SECONDS,
};
use tabfx_effects::{
    BiquadFilter, Chorus, Compressor, Convolver, EQ_BAND_COUNT, Gain, PitchShifter, pan_gains,
};

/// Buffer slots preallocated per session graph.
///
/// A linear chain needs two; the remainder is headroom for splices.
const SESSION_BUFFER_CAPACITY: usize = 6;

/// Handles of every node in a session graph.
#[derive(Debug, Clone, Copy)]
pub struct SessionNodes {
    /// External input.
    pub input: NodeId,
    /// Pitch shifter (optional).
    pub pitch: NodeId,
    /// Chorus (optional).
    pub chorus: NodeId,
    /// Convolver (optional).
    pub convolver: NodeId,
    /// The ten EQ bands, lowest first.
    pub eq: [NodeId; EQ_BAND_COUNT],
    /// Dynamics.
    pub compressor: NodeId,
    /// Per-channel balance gain.
    pub pan: NodeId,
    /// Channel splitter feeding the routes.
    pub splitter: NodeId,
    /// Channel merger summing the routes.
    pub merger: NodeId,
    /// Output gain.
    pub volume: NodeId,
    /// External output.
    pub output: NodeId,
}

impl SessionNodes {
    /// The node and parameter index a bus slot drives.
    ///
    /// `None` for parameters that are not a single node parameter: pan
    /// fans out to two gains, mono and invert are routing.
    pub fn param_target(&self, id: ParamId) -> Option<(NodeId, usize)> {
        let target = match id {
            ParamId::Volume => (self.volume, 2),
            ParamId::Pan | ParamId::Mono | ParamId::Invert => return None,
            ParamId::PitchOffset => (self.pitch, 0),
            ParamId::EqGain(band) => (*self.eq.get(band)?, 0),
            ParamId::CompressorThreshold => (self.compressor, 0),
            ParamId::CompressorKnee => (self.compressor, 1),
            ParamId::CompressorRatio => (self.compressor, 2),
            ParamId::CompressorAttack => (self.compressor, 3),
            ParamId::CompressorRelease => (self.compressor, 4),
            ParamId::CompressorMakeup => (self.compressor, 5),
            ParamId::ChorusRate => (self.chorus, 0),
            ParamId::ChorusDepth => (self.chorus, 1),
            ParamId::ChorusFeedback => (self.chorus, 2),
            ParamId::ChorusDelay => (self.chorus, 3),
            ParamId::ConvolverLowCut => (self.convolver, 0),
            ParamId::ConvolverHighCut => (self.convolver, 1),
            ParamId::ConvolverDry => (self.convolver, 2),
            ParamId::ConvolverWet => (self.convolver, 3),
            ParamId::ConvolverLevel => (self.convolver, 4),
        };
        Some(target)
    }

    fn effect(&self, effect: Effect) -> NodeId {
        match effect {
            Effect::Pitch => self.pitch,
            Effect::Chorus => self.chorus,
            Effect::Convolver => self.convolver,
        }
    }
}

/// Optional effects, in chain order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Effect {
    Pitch,
    Chorus,
    Convolver,
}

impl Effect {
    const ALL: [Effect; 3] = [Effect::Pitch, Effect::Chorus, Effect::Convolver];

    fn enabled(self, flags: EffectFlags) -> bool {
        match self {
            Effect::Pitch => flags.pitch,
            Effect::Chorus => flags.chorus,
            Effect::Convolver => flags.convolver,
        }
    }
}

/// Channel routing between splitter and merger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoutingMode {
    /// Both outputs carry `(L + R) · downmix_gain`.
    pub mono: bool,
    /// Left and right swapped.
    pub invert: bool,
}

impl RoutingMode {
    /// The splitter → merger routes realizing this mode.
    ///
    /// Invert applies after the downmix, where swapping two equal channels
    /// changes nothing, so mono alone decides the routes when it is on.
    pub fn routes(self, downmix_gain: f32) -> Vec<ChannelRoute> {
        use Channel::{Left, Right};
        if self.mono {
            vec![
                ChannelRoute::new(Left, Left, downmix_gain),
                ChannelRoute::new(Right, Left, downmix_gain),
                ChannelRoute::new(Left, Right, downmix_gain),
                ChannelRoute::new(Right, Right, downmix_gain),
            ]
        } else if self.invert {
            vec![
                ChannelRoute::new(Left, Right, 1.0),
                ChannelRoute::new(Right, Left, 1.0),
            ]
        } else {
            vec![
                ChannelRoute::new(Left, Left, 1.0),
                ChannelRoute::new(Right, Right, 1.0),
            ]
        }
    }
}

/// A schedule waiting to be installed, tagged with its publish sequence.
pub(crate) struct Staged {
    pub seq: u64,
    pub schedule: Arc<CompiledSchedule>,
}

/// The slot the control side publishes into and the renderer drains.
pub(crate) type StagedSlot = Arc<ArcSwapOption<Staged>>;

/// Counters the renderer updates and the control side reads.
#[derive(Debug, Default)]
pub(crate) struct RenderProgress {
    /// Frames rendered so far.
    pub frames: AtomicU64,
    /// Sequence of the last installed schedule.
    pub installed: AtomicU64,
    /// Contained node faults so far.
    pub faults: AtomicU64,
}

// An effect switched off whose fade-out has to finish before it is unspliced.
#[derive(Debug, Clone, Copy)]
struct PendingUnsplice {
    node: NodeId,
    // Publish sequence of the schedule that marked it dry.
    seq: u64,
    // Frame count after which the fade has settled; known once installed.
    due: Option<u64>,
}

/// Builds the graph of one session with every parameter at its default.
pub fn build_session_graph(
    config: &EngineConfig,
) -> Result<(GraphTopology, SignalGraph, SessionNodes), GraphError> {
    let sr = config.sample_rate_hz();
    let mut builder =
        GraphBuilder::new(sr, config.block_size).with_buffer_capacity(SESSION_BUFFER_CAPACITY);

    let input = builder.add_input();
    let output = builder.add_output();
    let pitch = builder.add_node(Box::new(PitchShifter::with_timing(
        sr,
        config.pitch.buffer_time,
        config.pitch.fade_time,
    )));
    let chorus = builder.add_node(Box::new(Chorus::new(sr)));
    let convolver = builder.add_node(Box::new(Convolver::new(sr)));
    let eq: [NodeId; EQ_BAND_COUNT] =
        core::array::from_fn(|band| builder.add_node(Box::new(BiquadFilter::eq_band(band, sr))));
    let compressor = builder.add_node(Box::new(Compressor::new(sr)));

    let (pan_l, pan_r) = pan_gains(0.0);
    let mut pan_gain = Gain::new(sr, 1.0).with_name("pan");
    pan_gain.set_channel_gains(pan_l, pan_r);
    pan_gain.snap();
    let pan = builder.add_node(Box::new(pan_gain));
    let splitter = builder.add_splitter();
    let merger = builder.add_merger(config.routing_ramp_ms);
    let volume = builder.add_node(Box::new(Gain::new(sr, 1.0).with_name("volume")));

    builder.connect(input, eq[0])?;
    for pair in eq.windows(2) {
        builder.connect(pair[0], pair[1])?;
    }
    builder.connect(eq[EQ_BAND_COUNT - 1], compressor)?;
    builder.connect(compressor, pan)?;
    builder.connect(pan, splitter)?;
    for route in RoutingMode::default().routes(config.downmix_gain) {
        builder.connect_route(splitter, merger, route)?;
    }
    builder.connect(merger, volume)?;
    builder.connect(volume, output)?;

    let (topology, graph) = builder.build()?;
    let nodes = SessionNodes {
        input,
        pitch,
        chorus,
        convolver,
        eq,
        compressor,
        pan,
        splitter,
        merger,
        volume,
        output,
    };
    Ok((topology, graph, nodes))
}

/// Control-side owner of a session's topology.
pub struct TopologyManager {
    topology: GraphTopology,
    nodes: SessionNodes,
    routing: RoutingMode,
    effects: EffectFlags,
    downmix_gain: f32,
    settle_frames: u64,
    staged: StagedSlot,
    progress: Arc<RenderProgress>,
    retired: Vec<Arc<Staged>>,
    pending: Vec<PendingUnsplice>,
    seq: u64,
}

impl TopologyManager {
    /// Takes over `topology`, whose compiled schedule `graph` is rendering.
    pub(crate) fn new(
        topology: GraphTopology,
        nodes: SessionNodes,
        graph: &SignalGraph,
        config: &EngineConfig,
    ) -> Self {
        let initial = Arc::new(Staged {
            seq: 0,
            schedule: Arc::clone(graph.schedule()),
        });
        let settle_frames = (WET_FADE_SETTLE_SECONDS * config.sample_rate_hz()).ceil() as u64;
        Self {
            topology,
            nodes,
            routing: RoutingMode::default(),
            effects: EffectFlags::default(),
            downmix_gain: config.downmix_gain,
            settle_frames,
            staged: Arc::new(ArcSwapOption::empty()),
            progress: Arc::new(RenderProgress::default()),
            retired: vec![initial],
            pending: Vec::new(),
            seq: 0,
        }
    }

    pub(crate) fn staged_slot(&self) -> StagedSlot {
        Arc::clone(&self.staged)
    }

    pub(crate) fn progress(&self) -> Arc<RenderProgress> {
        Arc::clone(&self.progress)
    }

    /// Node handles.
    pub fn nodes(&self) -> &SessionNodes {
        &self.nodes
    }

    /// The topology as last patched.
    pub fn topology(&self) -> &GraphTopology {
        &self.topology
    }

    /// Current channel routing.
    pub fn routing(&self) -> RoutingMode {
        self.routing
    }

    /// Current optional effect selection.
    pub fn effects(&self) -> EffectFlags {
        self.effects
    }

    /// Effects switched off but still spliced in while they fade out.
    pub fn pending_unsplices(&self) -> usize {
        self.pending.len()
    }

    /// Published schedules still referenced by the renderer or the stage.
    pub fn retired_schedules(&self) -> usize {
        self.retired.len()
    }

    /// Switches mono/invert by replacing the splitter → merger routes.
    ///
    /// Returns true if a new schedule was published.
    pub fn set_routing(&mut self, mode: RoutingMode) -> Result<bool, GraphError> {
        if mode == self.routing {
            return Ok(false);
        }
        let routes = mode.routes(self.downmix_gain);
        let current = self
            .topology
            .routes_between(self.nodes.splitter, self.nodes.merger);
        self.routing = mode;
        if same_routes(&current, &routes) {
            return Ok(false);
        }

        let (splitter, merger) = (self.nodes.splitter, self.nodes.merger);
        self.topology.disconnect_between(splitter, merger)?;
        for route in routes {
            self.topology.connect_route(splitter, merger, route)?;
        }
        self.publish()?;
        tracing::debug!(mono = mode.mono, invert = mode.invert, "routing patched");
        Ok(true)
    }

    /// Splices optional effects in or fades them out.
    ///
    /// Returns true if a new schedule was published.
    pub fn set_effects(&mut self, flags: EffectFlags) -> Result<bool, GraphError> {
        let mut changed = false;
        for effect in Effect::ALL {
            changed |= if effect.enabled(flags) {
                self.activate(effect)?
            } else {
                self.deactivate(effect)?
            };
        }
        self.effects = flags;
        if changed {
            self.publish()?;
            tracing::debug!(?flags, "effects patched");
        }
        Ok(changed)
    }

    fn activate(&mut self, effect: Effect) -> Result<bool, GraphError> {
        let node = self.nodes.effect(effect);
        if self.topology.is_connected(node) {
            // Still fading out: turn it around in place.
            self.pending.retain(|p| p.node != node);
            if self.topology.is_wet(node)? {
                return Ok(false);
            }
            self.topology.set_wet(node, true)?;
            return Ok(true);
        }

        let before = self.splice_point(effect);
        let after = self.topology.successor(before).ok_or_else(|| {
            GraphError::InvalidConnection(format!("{before} has no successor to splice before"))
        })?;
        self.topology.insert_between(before, after, node)?;
        self.topology.set_wet(node, true)?;
        Ok(true)
    }

    fn deactivate(&mut self, effect: Effect) -> Result<bool, GraphError> {
        let node = self.nodes.effect(effect);
        if !self.topology.is_connected(node) || !self.topology.is_wet(node)? {
            return Ok(false);
        }
        self.topology.set_wet(node, false)?;
        self.pending.push(PendingUnsplice {
            node,
            seq: self.seq + 1,
            due: None,
        });
        Ok(true)
    }

    // The last spliced effect ahead of `effect`, or the input.
    fn splice_point(&self, effect: Effect) -> NodeId {
        Effect::ALL
            .iter()
            .take_while(|e| **e != effect)
            .map(|e| self.nodes.effect(*e))
            .filter(|n| self.topology.is_connected(*n))
            .last()
            .unwrap_or(self.nodes.input)
    }

    /// Unsplices effects whose fade-out has settled and drops schedules
    /// nothing references any more. Returns the number of effects removed.
    pub fn maintain(&mut self) -> Result<usize, GraphError> {
        let installed = self.progress.installed.load(Ordering::Acquire);
        let frames = self.progress.frames.load(Ordering::Acquire);
        for pending in &mut self.pending {
            if pending.due.is_none() && installed >= pending.seq {
                pending.due = Some(frames + self.settle_frames);
            }
        }

        let ready: Vec<NodeId> = self
            .pending
            .iter()
            .filter(|p| p.due.is_some_and(|due| frames >= due))
            .map(|p| p.node)
            .collect();
        if !ready.is_empty() {
            self.pending.retain(|p| !ready.contains(&p.node));
            for node in &ready {
                self.topology.remove_from_chain(*node)?;
            }
            self.publish()?;
            tracing::debug!(removed = ready.len(), "faded effects unspliced");
        }

        self.collect_retired();
        Ok(ready.len())
    }

    fn publish(&mut self) -> Result<(), GraphError> {
        let schedule = Arc::new(self.topology.compile()?);
        self.seq += 1;
        let staged = Arc::new(Staged {
            seq: self.seq,
            schedule,
        });
        self.retired.push(Arc::clone(&staged));
        self.staged.store(Some(staged));
        self.collect_retired();
        Ok(())
    }

    // The last reference to a schedule must be ours before it is dropped.
    fn collect_retired(&mut self) {
        self.retired
            .retain(|s| Arc::strong_count(s) > 1 || Arc::strong_count(&s.schedule) > 1);
    }
}

fn same_routes(a: &[ChannelRoute], b: &[ChannelRoute]) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .all(|r| b.iter().any(|o| o.same_path(r) && o.gain == r.gain))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> (TopologyManager, SignalGraph) {
        let config = EngineConfig::default();
        let (topology, graph, nodes) = build_session_graph(&config).unwrap();
        let manager = TopologyManager::new(topology, nodes, &graph, &config);
        (manager, graph)
    }

    // Stands in for the renderer: install whatever is staged.
    fn install(manager: &TopologyManager, graph: &mut SignalGraph) {
        if let Some(staged) = manager.staged.swap(None) {
            drop(graph.swap_schedule(Arc::clone(&staged.schedule)));
            manager
                .progress
                .installed
                .store(staged.seq, Ordering::Release);
        }
    }

    fn render_frames(manager: &TopologyManager, graph: &mut SignalGraph, frames: usize) {
        let input = vec![0.1f32; frames];
        let (mut l, mut r) = (vec![0.0; frames], vec![0.0; frames]);
        let report = graph.render(&input, &input, &mut l, &mut r);
        manager
            .progress
            .frames
            .fetch_add(report.frames as u64, Ordering::Release);
    }

    #[test]
    fn test_default_chain() {
        let (manager, _graph) = manager();
        let nodes = *manager.nodes();
        let topo = manager.topology();
        assert_eq!(topo.successor(nodes.input), Some(nodes.eq[0]));
        assert_eq!(topo.successor(nodes.eq[9]), Some(nodes.compressor));
        assert_eq!(topo.successor(nodes.compressor), Some(nodes.pan));
        assert_eq!(topo.successor(nodes.volume), Some(nodes.output));
        assert!(!topo.is_connected(nodes.pitch));
        assert!(!topo.is_connected(nodes.chorus));
        assert!(!topo.is_connected(nodes.convolver));
        assert_eq!(topo.routes_between(nodes.splitter, nodes.merger).len(), 2);
    }

    #[test]
    fn test_routing_modes() {
        let g = 0.6;
        assert_eq!(RoutingMode { mono: true, invert: false }.routes(g).len(), 4);
        assert!(same_routes(
            &RoutingMode { mono: true, invert: true }.routes(g),
            &RoutingMode { mono: true, invert: false }.routes(g),
        ));
        let inverted = RoutingMode { mono: false, invert: true }.routes(g);
        assert!(inverted.iter().all(|r| r.from != r.to && r.gain == 1.0));
    }

    #[test]
    fn test_set_routing_only_touches_routes() {
        let (mut manager, _graph) = manager();
        let nodes = *manager.nodes();
        let edges_before = manager.topology().edge_count();

        assert!(manager.set_routing(RoutingMode { mono: true, invert: false }).unwrap());
        assert_eq!(manager.topology().edge_count(), edges_before + 2);
        assert_eq!(manager.topology().successor(nodes.eq[0]), Some(nodes.eq[1]));

        // Invert under mono is stored but changes no route.
        assert!(!manager.set_routing(RoutingMode { mono: true, invert: true }).unwrap());
        assert!(manager.routing().invert);

        assert!(manager.set_routing(RoutingMode::default()).unwrap());
        assert_eq!(manager.topology().edge_count(), edges_before);
        assert!(!manager.set_routing(RoutingMode::default()).unwrap());
    }

    #[test]
    fn test_effects_splice_in_chain_order() {
        let (mut manager, _graph) = manager();
        let nodes = *manager.nodes();

        let flags = EffectFlags {
            pitch: false,
            chorus: false,
            convolver: true,
        };
        assert!(manager.set_effects(flags).unwrap());
        assert_eq!(manager.topology().successor(nodes.input), Some(nodes.convolver));

        let flags = EffectFlags {
            pitch: true,
            chorus: true,
            convolver: true,
        };
        assert!(manager.set_effects(flags).unwrap());
        let topo = manager.topology();
        assert_eq!(topo.successor(nodes.input), Some(nodes.pitch));
        assert_eq!(topo.successor(nodes.pitch), Some(nodes.chorus));
        assert_eq!(topo.successor(nodes.chorus), Some(nodes.convolver));
        assert_eq!(topo.successor(nodes.convolver), Some(nodes.eq[0]));

        assert!(!manager.set_effects(flags).unwrap());
    }

    #[test]
    fn test_deactivated_effect_unspliced_after_fade() {
        let (mut manager, mut graph) = manager();
        let nodes = *manager.nodes();
        let on = EffectFlags {
            chorus: true,
            ..EffectFlags::default()
        };

        manager.set_effects(on).unwrap();
        install(&manager, &mut graph);
        render_frames(&manager, &mut graph, 4800);

        manager.set_effects(EffectFlags::default()).unwrap();
        assert!(manager.topology().is_connected(nodes.chorus));
        assert!(!manager.topology().is_wet(nodes.chorus).unwrap());

        // Not installed yet: nothing can be due.
        render_frames(&manager, &mut graph, 9600);
        assert_eq!(manager.maintain().unwrap(), 0);

        install(&manager, &mut graph);
        assert_eq!(manager.maintain().unwrap(), 0);
        render_frames(&manager, &mut graph, 4799);
        assert_eq!(manager.maintain().unwrap(), 0);
        render_frames(&manager, &mut graph, 1);
        assert_eq!(manager.maintain().unwrap(), 1);

        assert!(!manager.topology().is_connected(nodes.chorus));
        assert_eq!(manager.topology().successor(nodes.input), Some(nodes.eq[0]));
        assert_eq!(manager.pending_unsplices(), 0);
    }

    #[test]
    fn test_reactivation_cancels_unsplice() {
        let (mut manager, _graph) = manager();
        let on = EffectFlags {
            pitch: true,
            ..EffectFlags::default()
        };
        manager.set_effects(on).unwrap();
        manager.set_effects(EffectFlags::default()).unwrap();
        assert_eq!(manager.pending_unsplices(), 1);

        assert!(manager.set_effects(on).unwrap());
        assert_eq!(manager.pending_unsplices(), 0);
        assert!(manager.topology().is_wet(manager.nodes().pitch).unwrap());
    }

    #[test]
    fn test_retire_list_drops_unreferenced_schedules() {
        let (mut manager, mut graph) = manager();
        for mono in [true, false, true, false] {
            manager
                .set_routing(RoutingMode {
                    mono,
                    invert: false,
                })
                .unwrap();
        }
        // Staged but never taken: the one in the slot, plus the one rendering.
        assert_eq!(manager.retired_schedules(), 2);

        install(&manager, &mut graph);
        manager.maintain().unwrap();
        assert_eq!(manager.retired_schedules(), 1);
        assert!(Arc::strong_count(graph.schedule()) >= 2);
    }

    #[test]
    fn test_param_targets() {
        let (manager, graph) = manager();
        let nodes = manager.nodes();
        assert_eq!(nodes.param_target(ParamId::Pan), None);
        assert_eq!(nodes.param_target(ParamId::EqGain(10)), None);
        for id in ParamId::all() {
            if let Some((node, index)) = nodes.param_target(id) {
                let count = graph.node_ref(node).unwrap().param_count();
                assert!(index < count, "{id} → index {index} of {count}");
            }
        }
    }
}
