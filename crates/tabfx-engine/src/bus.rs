//! Lock-free parameter exchange between the control and render paths.
//!
//! Each [`ParamId`] owns one `AtomicU32` slot holding the committed value as
//! `f32` bits (flags are stored as 0.0 / 1.0). Writers validate and clamp
//! before storing, then bump a generation counter. The render side polls the
//! generation once per block through a [`BusReader`] and only copies the
//! slots when it moved, so updates land at block boundaries.
//!
//! There is no cross-parameter atomicity: a reader may observe half of a
//! burst of writes, then the rest one block later.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use tabfx_config::{Checked, PARAM_COUNT, ParamId, ParamKind, ParamValue, ParameterSnapshot};

use crate::error::{EngineError, Result};

struct BusSlots {
    values: [AtomicU32; PARAM_COUNT],
    generation: AtomicU64,
}

/// Shared, atomically updated parameter values of one session.
///
/// Cloning is cheap and yields another handle to the same slots.
///
/// ```rust
/// use tabfx_config::{ParamId, ParamValue};
/// use tabfx_engine::ParameterBus;
///
/// let bus = ParameterBus::new();
/// let checked = bus.set(ParamId::Pan, ParamValue::Float(9.0)).unwrap();
/// assert!(checked.clamped);
/// assert_eq!(bus.get(ParamId::Pan), Some(ParamValue::Float(1.0)));
///
/// bus.set(ParamId::Volume, ParamValue::Float(9.0)).unwrap();
/// assert_eq!(bus.get(ParamId::Volume), Some(ParamValue::Float(9.0)));
/// ```
#[derive(Clone)]
pub struct ParameterBus {
    inner: Arc<BusSlots>,
}

impl Default for ParameterBus {
    fn default() -> Self {
        Self::new()
    }
}

fn encode(value: ParamValue) -> u32 {
    match value {
        ParamValue::Float(v) => v.to_bits(),
        ParamValue::Bool(b) => if b { 1.0f32 } else { 0.0f32 }.to_bits(),
    }
}

fn decode(id: ParamId, bits: u32) -> ParamValue {
    let v = f32::from_bits(bits);
    match id.kind() {
        ParamKind::Float { .. } => ParamValue::Float(v),
        ParamKind::Bool { .. } => ParamValue::Bool(v >= 0.5),
    }
}

impl ParameterBus {
    /// A bus holding every parameter's default.
    pub fn new() -> Self {
        let values = core::array::from_fn(|slot| {
            let bits = ParamId::from_slot(slot).map_or(0, |id| encode(id.default_value()));
            AtomicU32::new(bits)
        });
        Self {
            inner: Arc::new(BusSlots {
                values,
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// A bus initialized from `snapshot`.
    pub fn from_snapshot(snapshot: &ParameterSnapshot) -> Self {
        let bus = Self::new();
        bus.load(snapshot);
        bus
    }

    /// Validates, clamps and commits one value.
    pub fn set(&self, id: ParamId, value: ParamValue) -> Result<Checked> {
        let checked = id
            .check(value)
            .map_err(|reason| EngineError::InvalidParameter { param: id, reason })?;
        if checked.clamped {
            tracing::debug!(param = %id, requested = %value, committed = %checked.value, "parameter clamped");
        }
        // check() has already refused unknown bands
        if let Some(slot) = id.slot() {
            self.inner.values[slot].store(encode(checked.value), Ordering::Release);
            self.inner.generation.fetch_add(1, Ordering::AcqRel);
        }
        Ok(checked)
    }

    /// The last committed value, or `None` for an unknown EQ band.
    pub fn get(&self, id: ParamId) -> Option<ParamValue> {
        let slot = id.slot()?;
        Some(decode(id, self.inner.values[slot].load(Ordering::Acquire)))
    }

    /// A committed flag; false for float parameters.
    pub fn flag(&self, id: ParamId) -> bool {
        self.get(id).and_then(ParamValue::as_bool).unwrap_or(false)
    }

    /// Number of commits so far.
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::Acquire)
    }

    /// Every committed value. `effects` is left at its default; effect
    /// selection is topology state, not a bus slot.
    pub fn snapshot(&self) -> ParameterSnapshot {
        let mut snapshot = ParameterSnapshot::default();
        for id in ParamId::all() {
            if let Some(value) = self.get(id) {
                // Committed values are always in their domain.
                let _ = snapshot.set(id, value);
            }
        }
        snapshot
    }

    /// Commits every field of `snapshot`, then bumps the generation once.
    ///
    /// Values outside their domain are clamped; non-finite ones fall back
    /// to the parameter default.
    pub fn load(&self, snapshot: &ParameterSnapshot) {
        for id in ParamId::all() {
            let value = snapshot
                .get(id)
                .and_then(|v| id.check(v).ok())
                .map_or_else(|| id.default_value(), |checked| checked.value);
            if let Some(slot) = id.slot() {
                self.inner.values[slot].store(encode(value), Ordering::Release);
            }
        }
        self.inner.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Restores every default.
    pub fn reset_to_defaults(&self) {
        self.load(&ParameterSnapshot::default());
    }

    /// A render-side reader that sees the current values on its first poll.
    pub fn reader(&self) -> BusReader {
        BusReader {
            bus: self.clone(),
            seen: None,
            values: [0.0; PARAM_COUNT],
        }
    }
}

/// Render-side view of a [`ParameterBus`].
///
/// Holds a local copy of every slot, refreshed by [`poll`](Self::poll).
/// Polling never allocates or blocks.
pub struct BusReader {
    bus: ParameterBus,
    seen: Option<u64>,
    values: [f32; PARAM_COUNT],
}

impl BusReader {
    /// Refreshes the local copy if anything was committed since the last
    /// poll. Returns true if it did.
    pub fn poll(&mut self) -> bool {
        let generation = self.bus.inner.generation.load(Ordering::Acquire);
        if self.seen == Some(generation) {
            return false;
        }
        for (local, slot) in self.values.iter_mut().zip(&self.bus.inner.values) {
            *local = f32::from_bits(slot.load(Ordering::Acquire));
        }
        self.seen = Some(generation);
        true
    }

    /// Locally held value of a parameter; flags read as 0.0 / 1.0.
    pub fn value(&self, id: ParamId) -> f32 {
        id.slot().map_or(0.0, |slot| self.values[slot])
    }
}
