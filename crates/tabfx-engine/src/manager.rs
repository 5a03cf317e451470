//! The session table and the control API.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

use tabfx_config::{
    Checked, ConfigError, EffectFlags, EngineConfig, ParamId, ParamValue, ParameterSnapshot,
};

use crate::bus::ParameterBus;
use crate::error::{EngineError, Result};
use crate::io::{CaptureSource, OutputSink};
use crate::session::{
    SessionEvent, SessionId, SessionParts, SessionRenderer, SessionState, Worker, build_session,
};
use crate::topology::{RenderProgress, RoutingMode, TopologyManager};

struct SessionEntry {
    bus: ParameterBus,
    topology: TopologyManager,
    progress: Arc<RenderProgress>,
    stop: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl SessionEntry {
    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    fn apply_routing(&mut self) -> Result<()> {
        let mode = RoutingMode {
            mono: self.bus.flag(ParamId::Mono),
            invert: self.bus.flag(ParamId::Invert),
        };
        self.topology.set_routing(mode)?;
        Ok(())
    }

    fn shut_down(self, id: SessionId) {
        self.stop.store(true, Ordering::Release);
        if let Some(worker) = self.worker
            && worker.join().is_err()
        {
            tracing::warn!(session = %id, "render worker panicked");
        }
    }
}

// Ids are handed out in order under the table lock, so every id below
// `next_id` that is not live has been closed.
struct SessionTable {
    live: HashMap<SessionId, SessionEntry>,
    next_id: u64,
}

fn missing(next_id: u64, id: SessionId) -> EngineError {
    if (1..next_id).contains(&id.raw()) {
        EngineError::SessionClosed(id)
    } else {
        EngineError::SessionNotFound(id)
    }
}

impl SessionTable {
    fn new() -> Self {
        Self {
            live: HashMap::new(),
            next_id: 1,
        }
    }

    fn is_closed(&self, id: SessionId) -> bool {
        !self.live.contains_key(&id) && (1..self.next_id).contains(&id.raw())
    }

    // Drops sessions whose worker exited or whose renderer was dropped.
    fn reap(&mut self) -> usize {
        let done: Vec<SessionId> = self
            .live
            .iter()
            .filter(|(_, e)| e.is_finished())
            .map(|(id, _)| *id)
            .collect();
        for id in &done {
            if let Some(entry) = self.live.remove(id) {
                entry.shut_down(*id);
                tracing::info!(session = %id, "session reaped");
            }
        }
        done.len()
    }
}

/// Owns every session and exposes the control API.
///
/// All methods are safe to call from any thread. The table lock is only
/// ever taken on the control path; render workers never touch it.
///
/// ```rust
/// use tabfx_config::{EngineConfig, ParamId, ParamValue};
/// use tabfx_engine::SessionManager;
///
/// let manager = SessionManager::new(EngineConfig::default()).unwrap();
/// let (id, mut renderer) = manager.create_detached().unwrap();
/// manager.set_parameter(id, ParamId::Volume, ParamValue::Float(0.5)).unwrap();
///
/// let input = [0.5f32; 128];
/// let (mut l, mut r) = ([0.0f32; 128], [0.0f32; 128]);
/// for _ in 0..8 {
///     renderer.render(&input, &input, &mut l, &mut r);
/// }
/// assert!((l[127] - 0.5 * 0.5 * std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-4);
///
/// manager.close_session(id).unwrap();
/// assert!(renderer.is_stopped());
/// ```
pub struct SessionManager {
    config: EngineConfig,
    table: Mutex<SessionTable>,
    events_tx: Sender<SessionEvent>,
    events_rx: Receiver<SessionEvent>,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::with_valid_config(EngineConfig::default())
    }
}

impl SessionManager {
    /// Creates a manager after validating `config`.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate().map_err(ConfigError::from)?;
        Ok(Self::with_valid_config(config))
    }

    fn with_valid_config(config: EngineConfig) -> Self {
        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        tracing::info!(
            sample_rate = config.sample_rate,
            block_size = config.block_size,
            max_sessions = config.max_sessions,
            "session manager ready"
        );
        Self {
            config,
            table: Mutex::new(SessionTable::new()),
            events_tx,
            events_rx,
        }
    }

    /// Engine configuration in use.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Receiver of lifecycle events for every session.
    pub fn events(&self) -> Receiver<SessionEvent> {
        self.events_rx.clone()
    }

    // Builds a session under the table lock so the limit check holds.
    fn open(&self, table: &mut SessionTable) -> Result<(SessionId, SessionParts, ParameterBus)> {
        table.reap();
        let limit = self.config.max_sessions;
        if table.live.len() >= limit {
            tracing::warn!(limit, "session limit reached");
            return Err(EngineError::ResourceExhausted { limit });
        }
        let id = SessionId::from_raw(table.next_id);
        let bus = ParameterBus::new();
        let parts = build_session(id, &self.config, &bus)?;
        table.next_id += 1;
        Ok((id, parts, bus))
    }

    /// Starts a session rendering `source` into `sink` on its own thread.
    pub fn create_session<S, K>(&self, source: S, sink: K) -> Result<SessionId>
    where
        S: CaptureSource + Send + 'static,
        K: OutputSink + Send + 'static,
    {
        let mut table = self.table.lock();
        let (id, parts, bus) = self.open(&mut table)?;
        let worker = Worker {
            renderer: parts.renderer,
            source: Box::new(source),
            sink: Box::new(sink),
            events: self.events_tx.clone(),
        };
        let handle = thread::Builder::new()
            .name(format!("tabfx-render-{}", id.raw()))
            .spawn(move || worker.run())
            .map_err(EngineError::Spawn)?;

        table.live.insert(
            id,
            SessionEntry {
                bus,
                topology: parts.topology,
                progress: parts.progress,
                stop: parts.stop,
                finished: parts.finished,
                worker: Some(handle),
            },
        );
        tracing::info!(session = %id, "session created");
        Ok(id)
    }

    /// Creates a session whose renderer the caller drives.
    ///
    /// Dropping the renderer ends the session; the next reap frees its slot.
    pub fn create_detached(&self) -> Result<(SessionId, SessionRenderer)> {
        let mut table = self.table.lock();
        let (id, parts, bus) = self.open(&mut table)?;
        table.live.insert(
            id,
            SessionEntry {
                bus,
                topology: parts.topology,
                progress: parts.progress,
                stop: parts.stop,
                finished: parts.finished,
                worker: None,
            },
        );
        tracing::info!(session = %id, "detached session created");
        Ok((id, parts.renderer))
    }

    /// Stops and removes a session.
    ///
    /// A running worker finishes the block in flight, sink write included,
    /// before this returns.
    pub fn close_session(&self, id: SessionId) -> Result<()> {
        let entry = {
            let mut table = self.table.lock();
            let next_id = table.next_id;
            table.live.remove(&id).ok_or_else(|| missing(next_id, id))?
        };
        // Joined outside the lock.
        entry.shut_down(id);
        tracing::info!(session = %id, "session closed");
        Ok(())
    }

    fn with_session<T>(
        &self,
        id: SessionId,
        f: impl FnOnce(&mut SessionEntry) -> Result<T>,
    ) -> Result<T> {
        let mut table = self.table.lock();
        let next_id = table.next_id;
        let entry = match table.live.get_mut(&id) {
            Some(entry) if entry.is_finished() => return Err(EngineError::SessionClosed(id)),
            Some(entry) => entry,
            None => return Err(missing(next_id, id)),
        };
        f(entry)
    }

    /// Validates, clamps and commits one parameter.
    ///
    /// Mono and invert also patch the routing; the render side picks both
    /// up at its next block.
    pub fn set_parameter(&self, id: SessionId, param: ParamId, value: ParamValue) -> Result<Checked> {
        self.with_session(id, |entry| {
            let checked = entry.bus.set(param, value)?;
            if matches!(param, ParamId::Mono | ParamId::Invert) {
                entry.apply_routing()?;
            }
            entry.topology.maintain()?;
            Ok(checked)
        })
    }

    /// Every committed parameter plus the effect selection.
    pub fn get_parameters(&self, id: SessionId) -> Result<ParameterSnapshot> {
        self.with_session(id, |entry| {
            let mut snapshot = entry.bus.snapshot();
            snapshot.effects = entry.topology.effects();
            Ok(snapshot)
        })
    }

    /// Same as [`get_parameters`](Self::get_parameters); persisting the
    /// snapshot is up to the caller.
    pub fn save_parameters(&self, id: SessionId) -> Result<ParameterSnapshot> {
        self.get_parameters(id)
    }

    /// Commits a whole snapshot, routing and effect selection included.
    pub fn load_parameters(&self, id: SessionId, snapshot: &ParameterSnapshot) -> Result<()> {
        self.with_session(id, |entry| {
            entry.bus.load(snapshot);
            entry.apply_routing()?;
            entry.topology.set_effects(snapshot.effects)?;
            tracing::info!(session = %id, "parameters loaded");
            Ok(())
        })
    }

    /// Restores every default and switches all optional effects off.
    pub fn reset_to_defaults(&self, id: SessionId) -> Result<()> {
        self.load_parameters(id, &ParameterSnapshot::default())
    }

    /// Selects the optional effects.
    pub fn reconfigure(&self, id: SessionId, effects: EffectFlags) -> Result<()> {
        self.with_session(id, |entry| {
            if entry.topology.set_effects(effects)? {
                tracing::info!(session = %id, ?effects, "effects reconfigured");
            }
            entry.topology.maintain()?;
            Ok(())
        })
    }

    /// Lifecycle state of a session.
    pub fn session_state(&self, id: SessionId) -> Result<SessionState> {
        let table = self.table.lock();
        match table.live.get(&id) {
            Some(entry) if entry.is_finished() || entry.stop.load(Ordering::Acquire) => {
                Ok(SessionState::TearingDown)
            }
            Some(_) => Ok(SessionState::Active),
            None if table.is_closed(id) => Ok(SessionState::Closed),
            None => Err(EngineError::SessionNotFound(id)),
        }
    }

    /// Contained node faults of a session so far.
    pub fn fault_count(&self, id: SessionId) -> Result<u64> {
        let table = self.table.lock();
        let entry = table
            .live
            .get(&id)
            .ok_or_else(|| missing(table.next_id, id))?;
        Ok(entry.progress.faults.load(Ordering::Acquire))
    }

    /// Housekeeping: reaps sessions whose capture ended, unsplices faded
    /// effects and releases schedules nothing renders any more.
    ///
    /// Returns the number of sessions reaped.
    pub fn maintain(&self) -> Result<usize> {
        let mut table = self.table.lock();
        let reaped = table.reap();
        for entry in table.live.values_mut() {
            entry.topology.maintain()?;
        }
        Ok(reaped)
    }

    /// Ids of all sessions not yet closed, ascending.
    pub fn active_sessions(&self) -> Vec<SessionId> {
        let table = self.table.lock();
        let mut ids: Vec<SessionId> = table.live.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        let entries: Vec<(SessionId, SessionEntry)> = self.table.get_mut().live.drain().collect();
        for (id, entry) in entries {
            entry.shut_down(id);
        }
    }
}
