//! Dynamics compressor with soft-knee characteristics.
//!
//! A feed-forward compressor with a linked peak detector: both channels
//! receive the same gain, so the stereo image never shifts.
//!
//! # Signal Flow
//!
//! ```text
//! max(|L|, |R|) → dB → Gain Computer → Attack/Release Smoother → × Makeup → Output
//! ```
//!
//! # Parameters
//!
//! | Parameter | Range | Description |
//! |-----------|-------|-------------|
//! | Threshold | -100 to 0 dB | Level where compression begins |
//! | Knee | 0 to 40 dB | Width of the soft transition around the threshold |
//! | Ratio | 1:1 to 20:1 | Compression strength, 1:1 is transparent |
//! | Attack | 0-1 s | How fast gain reduction engages, 0 is instant |
//! | Release | 0-1 s | How fast gain reduction recovers, 0 is instant |
//! | Makeup | 0-16 (linear) | Output level compensation |

use tabfx_core::{Node, SmoothedParam, db_to_linear, linear_to_db, one_pole_coefficient};

/// Static soft-knee curve.
#[derive(Debug, Clone)]
struct GainComputer {
    threshold_db: f32,
    ratio: f32,
    knee_db: f32,
}

impl GainComputer {
    fn new() -> Self {
        Self {
            threshold_db: -20.0,
            ratio: 1.0,
            knee_db: 5.0,
        }
    }

    /// Gain reduction `y - x` in dB for an input level `x`. Never positive.
    #[inline]
    fn compute_gain_db(&self, input_db: f32) -> f32 {
        if self.ratio <= 1.0 {
            return 0.0;
        }
        let overshoot = input_db - self.threshold_db;
        let slope = 1.0 / self.ratio - 1.0;
        let knee = self.knee_db;

        let reduction = if 2.0 * overshoot < -knee {
            0.0
        } else if knee > 0.0 && (2.0 * overshoot).abs() <= knee {
            let x = overshoot + knee / 2.0;
            slope * x * x / (2.0 * knee)
        } else {
            slope * overshoot
        };
        reduction.min(0.0)
    }
}

/// Dynamics compressor node.
///
/// ## Parameter Indices
///
/// | Index | Name | Range | Default |
/// |-------|------|-------|---------|
/// | 0 | Threshold | -100.0–0.0 dB | -20.0 |
/// | 1 | Knee | 0.0–40.0 dB | 5.0 |
/// | 2 | Ratio | 1.0–20.0 | 1.0 |
/// | 3 | Attack | 0.0–1.0 s | 0.0 |
/// | 4 | Release | 0.0–1.0 s | 0.25 |
/// | 5 | Makeup Gain | 0.0–16.0 (linear) | 1.0 |
///
/// # Example
///
/// ```rust
/// use tabfx_core::Node;
/// use tabfx_effects::Compressor;
///
/// let mut comp = Compressor::new(48000.0);
/// comp.set_threshold_db(-30.0);
/// comp.set_ratio(4.0);
/// comp.set_attack(0.005);
/// comp.set_release(0.1);
///
/// let (l, r) = comp.process_frame(0.5, 0.5);
/// assert!(l <= 0.5 && r <= 0.5);
/// ```
#[derive(Debug, Clone)]
pub struct Compressor {
    gain_computer: GainComputer,
    attack: f32,
    release: f32,
    attack_coeff: f32,
    release_coeff: f32,
    makeup_gain: SmoothedParam,
    sample_rate: f32,
    /// Smoothed gain reduction in dB (always non-positive).
    gain_reduction_db: f32,
}

impl Compressor {
    /// Create a compressor with transparent defaults (ratio 1).
    pub fn new(sample_rate: f32) -> Self {
        let mut comp = Self {
            gain_computer: GainComputer::new(),
            attack: 0.0,
            release: 0.25,
            attack_coeff: 0.0,
            release_coeff: 0.0,
            makeup_gain: SmoothedParam::standard(1.0, sample_rate),
            sample_rate,
            gain_reduction_db: 0.0,
        };
        comp.attack_coeff = one_pole_coefficient(comp.attack, sample_rate);
        comp.release_coeff = one_pole_coefficient(comp.release, sample_rate);
        comp
    }

    /// Set threshold in dB.
    pub fn set_threshold_db(&mut self, threshold_db: f32) {
        if threshold_db.is_finite() {
            self.gain_computer.threshold_db = threshold_db.clamp(-100.0, 0.0);
        }
    }

    /// Set knee width in dB.
    pub fn set_knee_db(&mut self, knee_db: f32) {
        if knee_db.is_finite() {
            self.gain_computer.knee_db = knee_db.clamp(0.0, 40.0);
        }
    }

    /// Set compression ratio.
    pub fn set_ratio(&mut self, ratio: f32) {
        if ratio.is_finite() {
            self.gain_computer.ratio = ratio.clamp(1.0, 20.0);
        }
    }

    /// Set attack time in seconds.
    pub fn set_attack(&mut self, seconds: f32) {
        if seconds.is_finite() {
            self.attack = seconds.clamp(0.0, 1.0);
            self.attack_coeff = one_pole_coefficient(self.attack, self.sample_rate);
        }
    }

    /// Set release time in seconds.
    pub fn set_release(&mut self, seconds: f32) {
        if seconds.is_finite() {
            self.release = seconds.clamp(0.0, 1.0);
            self.release_coeff = one_pole_coefficient(self.release, self.sample_rate);
        }
    }

    /// Set linear makeup gain.
    pub fn set_makeup_gain(&mut self, gain: f32) {
        if gain.is_finite() {
            self.makeup_gain.set_target(gain.clamp(0.0, 16.0));
        }
    }

    /// Returns the current smoothed gain reduction in dB (always non-positive).
    ///
    /// A value of 0.0 means no compression is occurring.
    pub fn gain_reduction_db(&self) -> f32 {
        self.gain_reduction_db
    }
}

impl Node for Compressor {
    fn name(&self) -> &'static str {
        "compressor"
    }

    #[inline]
    fn process_frame(&mut self, left: f32, right: f32) -> (f32, f32) {
        let peak_db = linear_to_db(left.abs().max(right.abs()));
        let target = self.gain_computer.compute_gain_db(peak_db);

        let coeff = if target < self.gain_reduction_db {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        self.gain_reduction_db = coeff * self.gain_reduction_db + (1.0 - coeff) * target;

        let gain = db_to_linear(self.gain_reduction_db) * self.makeup_gain.advance();
        (left * gain, right * gain)
    }

    fn reset(&mut self) {
        self.gain_reduction_db = 0.0;
        self.makeup_gain.snap_to_target();
    }

    fn param_count(&self) -> usize {
        6
    }

    fn get_param(&self, index: usize) -> f32 {
        match index {
            0 => self.gain_computer.threshold_db,
            1 => self.gain_computer.knee_db,
            2 => self.gain_computer.ratio,
            3 => self.attack,
            4 => self.release,
            5 => self.makeup_gain.target(),
            _ => 0.0,
        }
    }

    fn set_param(&mut self, index: usize, value: f32) {
        match index {
            0 => self.set_threshold_db(value),
            1 => self.set_knee_db(value),
            2 => self.set_ratio(value),
            3 => self.set_attack(value),
            4 => self.set_release(value),
            5 => self.set_makeup_gain(value),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gain_computer_regions() {
        let gc = GainComputer {
            threshold_db: -20.0,
            ratio: 4.0,
            knee_db: 10.0,
        };
        // Below the knee
        assert_eq!(gc.compute_gain_db(-40.0), 0.0);
        // Above the knee: T + (x - T)/R - x
        let x = -5.0;
        let expected = -20.0 + (x + 20.0) / 4.0 - x;
        assert!((gc.compute_gain_db(x) - expected).abs() < 1e-5);
        // At the threshold, inside the knee
        let knee = (0.25 - 1.0) * 25.0 / 20.0;
        assert!((gc.compute_gain_db(-20.0) - knee).abs() < 1e-5);
    }

    #[test]
    fn test_knee_is_continuous() {
        let gc = GainComputer {
            threshold_db: -20.0,
            ratio: 8.0,
            knee_db: 6.0,
        };
        for edge in [-23.0f32, -17.0] {
            let below = gc.compute_gain_db(edge - 1e-3);
            let above = gc.compute_gain_db(edge + 1e-3);
            assert!((below - above).abs() < 1e-2, "edge {edge}");
        }
    }

    #[test]
    fn test_ratio_one_is_transparent() {
        let mut comp = Compressor::new(48000.0);
        comp.set_threshold_db(-60.0);
        for i in 0..1000 {
            let x = (i as f32 * 0.05).sin() * 0.9;
            assert_eq!(comp.process_frame(x, -x), (x, -x));
        }
        assert_eq!(comp.gain_reduction_db(), 0.0);
    }

    #[test]
    fn test_instant_attack() {
        let mut comp = Compressor::new(48000.0);
        comp.set_threshold_db(-100.0);
        comp.set_ratio(20.0);
        comp.set_knee_db(0.0);
        let (l, _) = comp.process_frame(0.5, 0.1);
        let out_db = linear_to_db(l.abs());
        let expected = -100.0 + (linear_to_db(0.5) + 100.0) / 20.0;
        assert!((out_db - expected).abs() < 0.01, "{out_db} vs {expected}");
    }

    #[test]
    fn test_linked_detection() {
        let mut comp = Compressor::new(48000.0);
        comp.set_threshold_db(-20.0);
        comp.set_ratio(10.0);
        let (l, r) = comp.process_frame(1.0, 0.01);
        assert!((l / 1.0 - r / 0.01).abs() < 1e-4);
    }

    #[test]
    fn test_release_recovers() {
        let mut comp = Compressor::new(48000.0);
        comp.set_threshold_db(-20.0);
        comp.set_ratio(4.0);
        comp.set_release(0.01);
        comp.process_frame(1.0, 1.0);
        let deep = comp.gain_reduction_db();
        assert!(deep < -10.0);
        for _ in 0..4800 {
            comp.process_frame(0.0, 0.0);
        }
        assert!(comp.gain_reduction_db() > -0.01);
    }

    #[test]
    fn test_makeup_and_clamping() {
        let mut comp = Compressor::new(48000.0);
        comp.set_makeup_gain(2.0);
        comp.reset();
        assert_eq!(comp.process_frame(0.25, 0.25), (0.5, 0.5));

        comp.set_param(2, 100.0);
        assert_eq!(comp.get_param(2), 20.0);
        comp.set_param(0, -500.0);
        assert_eq!(comp.get_param(0), -100.0);
        comp.set_param(3, f32::NAN);
        assert_eq!(comp.get_param(3), 0.0);
        assert_eq!(comp.get_param(4), 0.25);
    }
}
