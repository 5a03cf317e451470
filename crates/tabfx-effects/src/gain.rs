//! Per-channel gain stage.
//!
//! One node type covers both the pan stage and the output volume: pan sets
//! the two channel gains independently, volume sets both at once. Changes
//! ramp linearly so automation never steps.

use libm::{cosf, sinf};
use tabfx_core::{Node, ParamRamp};

/// Ramp length for gain changes.
pub const GAIN_RAMP_MS: f32 = 10.0;

/// Constant-power pan law.
///
/// Returns `(left, right)` gains for a balance in `[-1, 1]`; values outside
/// are clamped. `left² + right² = 1` for every balance.
///
/// ```rust
/// use tabfx_effects::pan_gains;
///
/// let (l, r) = pan_gains(0.0);
/// assert!((l - core::f32::consts::FRAC_1_SQRT_2).abs() < 1e-6);
/// assert!((l - r).abs() < 1e-6);
/// ```
pub fn pan_gains(balance: f32) -> (f32, f32) {
    let b = if balance.is_finite() {
        balance.clamp(-1.0, 1.0)
    } else {
        0.0
    };
    let angle = core::f32::consts::FRAC_PI_4 * (1.0 + b);
    (cosf(angle), sinf(angle))
}

/// Stereo gain node with independent, ramped channel gains.
///
/// ## Parameter Indices
///
/// | Index | Name | Range | Default |
/// |-------|------|-------|---------|
/// | 0 | Left gain | 0.0–∞ (linear) | initial |
/// | 1 | Right gain | 0.0–∞ (linear) | initial |
/// | 2 | Both | 0.0–∞ (linear) | initial |
///
/// Reading index 2 returns the left target.
///
/// # Example
///
/// ```rust
/// use tabfx_core::Node;
/// use tabfx_effects::{Gain, pan_gains};
///
/// let mut pan = Gain::new(48000.0, 1.0).with_name("pan");
/// let (l, r) = pan_gains(1.0);
/// pan.set_channel_gains(l, r);
/// for _ in 0..480 {
///     pan.process_frame(1.0, 1.0);
/// }
/// let (out_l, out_r) = pan.process_frame(1.0, 1.0);
/// assert!(out_l.abs() < 1e-6);
/// assert!((out_r - 1.0).abs() < 1e-6);
/// ```
#[derive(Debug, Clone)]
pub struct Gain {
    name: &'static str,
    left: ParamRamp,
    right: ParamRamp,
}

impl Gain {
    /// Creates a gain node resting at `initial` on both channels.
    pub fn new(sample_rate: f32, initial: f32) -> Self {
        Self::with_ramp_ms(sample_rate, initial, GAIN_RAMP_MS)
    }

    /// Creates a gain node with a custom ramp length.
    pub fn with_ramp_ms(sample_rate: f32, initial: f32, ramp_ms: f32) -> Self {
        let initial = sanitize(initial);
        Self {
            name: "gain",
            left: ParamRamp::with_time(initial, sample_rate, ramp_ms),
            right: ParamRamp::with_time(initial, sample_rate, ramp_ms),
        }
    }

    /// Renames the node for logs.
    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Ramps both channels to `gain`.
    pub fn set_gain(&mut self, gain: f32) {
        let gain = sanitize(gain);
        self.left.set_target(gain);
        self.right.set_target(gain);
    }

    /// Ramps each channel to its own gain.
    pub fn set_channel_gains(&mut self, left: f32, right: f32) {
        self.left.set_target(sanitize(left));
        self.right.set_target(sanitize(right));
    }

    /// Target gains `(left, right)`.
    pub fn gains(&self) -> (f32, f32) {
        (self.left.target(), self.right.target())
    }

    /// Jumps to the target gains.
    pub fn snap(&mut self) {
        self.left.snap_to_target();
        self.right.snap_to_target();
    }
}

fn sanitize(gain: f32) -> f32 {
    if gain.is_finite() { gain.max(0.0) } else { 0.0 }
}

impl Node for Gain {
    fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    fn process_frame(&mut self, left: f32, right: f32) -> (f32, f32) {
        (left * self.left.advance(), right * self.right.advance())
    }

    fn reset(&mut self) {
        self.snap();
    }

    fn param_count(&self) -> usize {
        3
    }

    fn get_param(&self, index: usize) -> f32 {
        match index {
            0 | 2 => self.left.target(),
            1 => self.right.target(),
            _ => 0.0,
        }
    }

    fn set_param(&mut self, index: usize, value: f32) {
        match index {
            0 => self.left.set_target(sanitize(value)),
            1 => self.right.set_target(sanitize(value)),
            2 => self.set_gain(value),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pan_law_is_constant_power() {
        for i in -20..=20 {
            let b = i as f32 / 20.0;
            let (l, r) = pan_gains(b);
            assert!((l * l + r * r - 1.0).abs() < 1e-6, "b={b}");
        }
    }

    #[test]
    fn test_pan_extremes() {
        let (l, r) = pan_gains(-1.0);
        assert!((l - 1.0).abs() < 1e-6 && r.abs() < 1e-6);
        let (l, r) = pan_gains(5.0);
        assert!(l.abs() < 1e-6 && (r - 1.0).abs() < 1e-6);
        assert_eq!(pan_gains(f32::NAN), pan_gains(0.0));
    }

    #[test]
    fn test_unity_gain_is_exact() {
        let mut g = Gain::new(48000.0, 1.0);
        assert_eq!(g.process_frame(0.3, -0.7), (0.3, -0.7));
    }

    #[test]
    fn test_gain_ramps_without_steps() {
        let mut g = Gain::new(48000.0, 1.0);
        g.set_gain(0.0);
        let mut prev = 1.0;
        for _ in 0..480 {
            let (l, _) = g.process_frame(1.0, 1.0);
            assert!((prev - l).abs() < 0.01);
            prev = l;
        }
        assert_eq!(prev, 0.0);
    }

    #[test]
    fn test_params_by_index() {
        let mut g = Gain::new(48000.0, 1.0);
        g.set_param(0, 0.25);
        g.set_param(1, 0.75);
        assert_eq!(g.gains(), (0.25, 0.75));
        g.set_param(2, 2.0);
        assert_eq!(g.gains(), (2.0, 2.0));
        assert_eq!(g.get_param(2), 2.0);
        g.set_param(2, -1.0);
        assert_eq!(g.get_param(0), 0.0);
        g.set_param(2, f32::INFINITY);
        assert_eq!(g.get_param(1), 0.0);
    }

    #[test]
    fn test_reset_snaps_ramp() {
        let mut g = Gain::new(48000.0, 1.0);
        g.set_gain(0.5);
        g.reset();
        assert_eq!(g.process_frame(1.0, 1.0), (0.5, 0.5));
    }
}
