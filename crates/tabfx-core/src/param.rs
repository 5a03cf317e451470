//! Parameter smoothing for click-free changes.
//!
//! Two shapes are provided:
//!
//! - [`ParamRamp`]: linear ramp reaching its target in a fixed number of
//!   samples. Used for gains and routing matrices, where a bounded per-sample
//!   step is what keeps patches free of discontinuities.
//! - [`SmoothedParam`]: one-pole exponential approach. Used for filter gains
//!   and the wet/dry fade of graph nodes.
//!
//! ```rust
//! use tabfx_core::ParamRamp;
//!
//! let mut gain = ParamRamp::with_time(1.0, 48000.0, 10.0);
//! gain.set_target(0.0);
//! for _ in 0..480 {
//!     gain.advance();
//! }
//! assert!(gain.is_settled());
//! assert_eq!(gain.get(), 0.0);
//! ```

use libm::expf;

/// Linear parameter ramp.
///
/// Retargeting mid-ramp restarts the ramp from the current value, so the
/// output is continuous no matter how often the target changes.
#[derive(Debug, Clone)]
pub struct ParamRamp {
    current: f32,
    target: f32,
    step: f32,
    remaining: u32,
    ramp_samples: u32,
}

impl ParamRamp {
    /// Creates a ramp resting at `initial` that takes `ramp_samples` samples per move.
    pub fn new(initial: f32, ramp_samples: u32) -> Self {
        Self {
            current: initial,
            target: initial,
            step: 0.0,
            remaining: 0,
            ramp_samples,
        }
    }

    /// Creates a ramp whose moves last `ramp_ms` milliseconds at `sample_rate`.
    pub fn with_time(initial: f32, sample_rate: f32, ramp_ms: f32) -> Self {
        Self::new(initial, Self::samples_for(sample_rate, ramp_ms))
    }

    fn samples_for(sample_rate: f32, ramp_ms: f32) -> u32 {
        let samples = sample_rate * ramp_ms / 1000.0;
        if samples.is_finite() && samples >= 1.0 {
            samples as u32
        } else {
            0
        }
    }

    /// Starts a ramp toward `target`. Setting the current target is a no-op.
    #[inline]
    pub fn set_target(&mut self, target: f32) {
        if target == self.target {
            return;
        }
        self.target = target;
        if self.ramp_samples == 0 {
            self.current = target;
            self.remaining = 0;
        } else {
            self.step = (target - self.current) / self.ramp_samples as f32;
            self.remaining = self.ramp_samples;
        }
    }

    /// Jumps to `value` with no ramp.
    #[inline]
    pub fn set_immediate(&mut self, value: f32) {
        self.current = value;
        self.target = value;
        self.remaining = 0;
    }

    /// Advances one sample and returns the new value.
    #[inline]
    pub fn advance(&mut self) -> f32 {
        if self.remaining > 0 {
            self.remaining -= 1;
            if self.remaining == 0 {
                self.current = self.target;
            } else {
                self.current += self.step;
            }
        }
        self.current
    }

    /// Current value.
    #[inline]
    pub fn get(&self) -> f32 {
        self.current
    }

    /// Value being ramped toward.
    #[inline]
    pub fn target(&self) -> f32 {
        self.target
    }

    /// True once the target has been reached.
    #[inline]
    pub fn is_settled(&self) -> bool {
        self.remaining == 0
    }

    /// Finishes any ramp in progress.
    #[inline]
    pub fn snap_to_target(&mut self) {
        self.current = self.target;
        self.remaining = 0;
    }

    /// Length of each ramp in samples.
    pub fn ramp_samples(&self) -> u32 {
        self.ramp_samples
    }
}

/// Exponentially smoothed parameter (one-pole lowpass toward a target).
#[derive(Debug, Clone)]
pub struct SmoothedParam {
    current: f32,
    target: f32,
    /// Fraction of the remaining distance covered per sample (1 = instant).
    coeff: f32,
    sample_rate: f32,
    smoothing_time_ms: f32,
}

/// Distance to target below which a [`SmoothedParam`] snaps and reports settled.
const SETTLE_EPSILON: f32 = 1e-6;

impl SmoothedParam {
    /// Creates an unsmoothed parameter (changes apply instantly).
    pub fn new(initial: f32) -> Self {
        Self {
            current: initial,
            target: initial,
            coeff: 1.0,
            sample_rate: 48000.0,
            smoothing_time_ms: 0.0,
        }
    }

    /// Creates a parameter with the given time constant.
    pub fn with_config(initial: f32, sample_rate: f32, smoothing_time_ms: f32) -> Self {
        let mut param = Self::new(initial);
        param.sample_rate = sample_rate;
        param.smoothing_time_ms = smoothing_time_ms;
        param.recalculate_coeff();
        param
    }

    /// 5 ms time constant, for fades and gains.
    pub fn fast(initial: f32, sample_rate: f32) -> Self {
        Self::with_config(initial, sample_rate, 5.0)
    }

    /// 10 ms time constant, for filter gains.
    pub fn standard(initial: f32, sample_rate: f32) -> Self {
        Self::with_config(initial, sample_rate, 10.0)
    }

    /// Sets the value to approach.
    #[inline]
    pub fn set_target(&mut self, target: f32) {
        self.target = target;
    }

    /// Sets target and current value together.
    #[inline]
    pub fn set_immediate(&mut self, value: f32) {
        self.target = value;
        self.current = value;
    }

    /// Changes the time constant.
    pub fn set_smoothing_time_ms(&mut self, time_ms: f32) {
        self.smoothing_time_ms = time_ms;
        self.recalculate_coeff();
    }

    /// Advances one sample and returns the new value.
    #[inline]
    pub fn advance(&mut self) -> f32 {
        let delta = self.target - self.current;
        if delta.abs() < SETTLE_EPSILON {
            self.current = self.target;
        } else {
            self.current += self.coeff * delta;
        }
        self.current
    }

    /// Current value.
    #[inline]
    pub fn get(&self) -> f32 {
        self.current
    }

    /// Value being approached.
    #[inline]
    pub fn target(&self) -> f32 {
        self.target
    }

    /// True when the current value equals the target (within epsilon).
    #[inline]
    pub fn is_settled(&self) -> bool {
        (self.current - self.target).abs() < SETTLE_EPSILON
    }

    /// Jumps to the target.
    #[inline]
    pub fn snap_to_target(&mut self) {
        self.current = self.target;
    }

    // coeff = 1 - exp(-1 / (tau * sr)); tau = 0 means instant.
    fn recalculate_coeff(&mut self) {
        if self.smoothing_time_ms <= 0.0 || self.sample_rate <= 0.0 {
            self.coeff = 1.0;
        } else {
            let samples = self.smoothing_time_ms / 1000.0 * self.sample_rate;
            self.coeff = 1.0 - expf(-1.0 / samples);
        }
    }
}

impl Default for SmoothedParam {
    fn default() -> Self {
        Self::new(0.0)
    }
}
