//! Short FIR room.
//!
//! Direct-form convolution of each channel with a fixed impulse response.
//! The default response is a synthetic decaying-noise burst generated from a
//! fixed-seed LCG, so every instance sounds the same.
//!
//! # Signal Flow
//!
//! ```text
//!         ┌→ FIR → High-pass (low cut) → Low-pass (high cut) → × wet ─┐
//! Input ──┤                                                          (+) → × level → Output
//!         └──────────────────────────────────────────────────→ × dry ─┘
//! ```

#[cfg(not(feature = "std"))]
use alloc::{vec, vec::Vec};

use libm::{expf, roundf, sqrtf};
use tabfx_core::{Node, SmoothedParam};

use crate::BiquadFilter;

/// Length of the default room response in seconds.
pub const DEFAULT_IR_SECONDS: f32 = 0.02;

const LCG_SEED: u32 = 0x1234_5678;

/// Generates the default decaying-noise impulse response.
///
/// The tail falls by 60 dB across its length and the response is normalized
/// to unit energy.
pub fn default_impulse_response(sample_rate: f32) -> Vec<f32> {
    let len = (roundf(DEFAULT_IR_SECONDS * sample_rate) as usize).max(1);
    let mut state = LCG_SEED;
    let mut ir: Vec<f32> = (0..len)
        .map(|i| {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            let noise = (state >> 8) as f32 / (1u32 << 24) as f32 * 2.0 - 1.0;
            // ln(1000) ≈ 6.9: -60 dB at the end.
            noise * expf(-6.9 * i as f32 / len as f32)
        })
        .collect();

    let energy: f32 = ir.iter().map(|h| h * h).sum();
    if energy > 0.0 {
        let scale = 1.0 / sqrtf(energy);
        ir.iter_mut().for_each(|h| *h *= scale);
    }
    ir
}

/// One channel of FIR history.
///
/// Every sample is stored twice, `len` apart, so the newest `len` samples
/// are always one contiguous slice.
#[derive(Debug, Clone)]
struct FirHistory {
    samples: Vec<f32>,
    pos: usize,
}

impl FirHistory {
    fn new(len: usize) -> Self {
        Self {
            samples: vec![0.0; 2 * len],
            pos: 0,
        }
    }

    #[inline]
    fn push_convolve(&mut self, x: f32, ir: &[f32]) -> f32 {
        let len = ir.len();
        self.samples[self.pos] = x;
        self.samples[self.pos + len] = x;
        let window = &self.samples[self.pos + 1..=self.pos + len];
        self.pos += 1;
        if self.pos == len {
            self.pos = 0;
        }
        ir.iter().zip(window.iter().rev()).map(|(h, s)| h * s).sum()
    }

    fn clear(&mut self) {
        self.samples.fill(0.0);
        self.pos = 0;
    }
}

/// Convolution reverb node.
///
/// ## Parameter Indices
///
/// | Index | Name | Range | Default |
/// |-------|------|-------|---------|
/// | 0 | Low Cut | 20.0–22050.0 Hz | 20.0 |
/// | 1 | High Cut | 20.0–22050.0 Hz | 22050.0 |
/// | 2 | Dry | 0.0–1.0 | 1.0 |
/// | 3 | Wet | 0.0–1.0 | 1.0 |
/// | 4 | Level | 0.0–4.0 | 1.0 |
///
/// # Example
///
/// ```rust
/// use tabfx_core::Node;
/// use tabfx_effects::Convolver;
///
/// let mut room = Convolver::with_impulse_response(48000.0, vec![1.0, 0.5]);
/// room.set_wet(0.0);
/// room.reset();
/// assert_eq!(room.process_frame(0.5, 0.5), (0.5, 0.5));
/// ```
#[derive(Debug, Clone)]
pub struct Convolver {
    ir: Vec<f32>,
    left: FirHistory,
    right: FirHistory,
    low_cut: BiquadFilter,
    high_cut: BiquadFilter,
    dry: SmoothedParam,
    wet: SmoothedParam,
    level: SmoothedParam,
}

impl Convolver {
    /// Creates a convolver with the default room response.
    pub fn new(sample_rate: f32) -> Self {
        Self::with_impulse_response(sample_rate, default_impulse_response(sample_rate))
    }

    /// Creates a convolver around `ir`. An empty response is treated as silence.
    pub fn with_impulse_response(sample_rate: f32, mut ir: Vec<f32>) -> Self {
        if ir.is_empty() {
            ir.push(0.0);
        }
        let len = ir.len();
        let mut dry = SmoothedParam::fast(1.0, sample_rate);
        let mut wet = SmoothedParam::fast(1.0, sample_rate);
        let mut level = SmoothedParam::fast(1.0, sample_rate);
        dry.snap_to_target();
        wet.snap_to_target();
        level.snap_to_target();
        Self {
            ir,
            left: FirHistory::new(len),
            right: FirHistory::new(len),
            low_cut: BiquadFilter::highpass(20.0, sample_rate),
            high_cut: BiquadFilter::lowpass(22050.0, sample_rate),
            dry,
            wet,
            level,
        }
    }

    /// Impulse response taps.
    pub fn impulse_response(&self) -> &[f32] {
        &self.ir
    }

    /// Set the wet path's high-pass corner in Hz.
    pub fn set_low_cut(&mut self, hz: f32) {
        if hz.is_finite() {
            self.low_cut.set_frequency(hz.clamp(20.0, 22050.0));
        }
    }

    /// Set the wet path's low-pass corner in Hz.
    pub fn set_high_cut(&mut self, hz: f32) {
        if hz.is_finite() {
            self.high_cut.set_frequency(hz.clamp(20.0, 22050.0));
        }
    }

    /// Set the dry level (0–1).
    pub fn set_dry(&mut self, dry: f32) {
        if dry.is_finite() {
            self.dry.set_target(dry.clamp(0.0, 1.0));
        }
    }

    /// Set the wet level (0–1).
    pub fn set_wet(&mut self, wet: f32) {
        if wet.is_finite() {
            self.wet.set_target(wet.clamp(0.0, 1.0));
        }
    }

    /// Set the output level (0–4).
    pub fn set_level(&mut self, level: f32) {
        if level.is_finite() {
            self.level.set_target(level.clamp(0.0, 4.0));
        }
    }
}

impl Node for Convolver {
    fn name(&self) -> &'static str {
        "convolver"
    }

    #[inline]
    fn process_frame(&mut self, left: f32, right: f32) -> (f32, f32) {
        let conv_l = self.left.push_convolve(left, &self.ir);
        let conv_r = self.right.push_convolve(right, &self.ir);
        let (hp_l, hp_r) = self.low_cut.process_frame(conv_l, conv_r);
        let (wet_l, wet_r) = self.high_cut.process_frame(hp_l, hp_r);

        let dry = self.dry.advance();
        let wet = self.wet.advance();
        let level = self.level.advance();
        (
            level * (dry * left + wet * wet_l),
            level * (dry * right + wet * wet_r),
        )
    }

    fn reset(&mut self) {
        self.left.clear();
        self.right.clear();
        self.low_cut.reset();
        self.high_cut.reset();
        self.dry.snap_to_target();
        self.wet.snap_to_target();
        self.level.snap_to_target();
    }

    fn param_count(&self) -> usize {
        5
    }

    fn get_param(&self, index: usize) -> f32 {
        match index {
            0 => self.low_cut.frequency(),
            1 => self.high_cut.frequency(),
            2 => self.dry.target(),
            3 => self.wet.target(),
            4 => self.level.target(),
            _ => 0.0,
        }
    }

    fn set_param(&mut self, index: usize, value: f32) {
        match index {
            0 => self.set_low_cut(value),
            1 => self.set_high_cut(value),
            2 => self.set_dry(value),
            3 => self.set_wet(value),
            4 => self.set_level(value),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ir_is_deterministic() {
        let a = default_impulse_response(48000.0);
        let b = default_impulse_response(48000.0);
        assert_eq!(a, b);
        assert_eq!(a.len(), 960);
        let energy: f32 = a.iter().map(|h| h * h).sum();
        assert!((energy - 1.0).abs() < 1e-3);
        let head: f32 = a[..96].iter().map(|h| h.abs()).sum();
        let tail: f32 = a[a.len() - 96..].iter().map(|h| h.abs()).sum();
        assert!(tail < head * 0.01);
    }

    #[test]
    fn test_fir_matches_direct_convolution() {
        let ir = vec![0.5, -0.25, 0.125];
        let mut history = FirHistory::new(ir.len());
        let input = [1.0, 2.0, 0.0, -1.0, 3.0, 0.5, 0.0];
        for n in 0..input.len() {
            let expected: f32 = (0..ir.len())
                .filter(|&k| k <= n)
                .map(|k| ir[k] * input[n - k])
                .sum();
            let got = history.push_convolve(input[n], &ir);
            assert!((got - expected).abs() < 1e-6, "n={n}: {got} vs {expected}");
        }
    }

    #[test]
    fn test_dry_only() {
        let mut room = Convolver::new(48000.0);
        room.set_wet(0.0);
        room.reset();
        for i in 0..256 {
            let x = (i as f32 * 0.1).sin();
            let (l, r) = room.process_frame(x, -x);
            assert!((l - x).abs() < 1e-6 && (r + x).abs() < 1e-6);
        }
    }

    #[test]
    fn test_output_is_bounded() {
        let mut room = Convolver::new(48000.0);
        room.set_level(4.0);
        room.set_low_cut(200.0);
        room.set_high_cut(4000.0);
        for i in 0..48000 {
            let x = if i % 2 == 0 { 1.0 } else { -1.0 };
            let (l, r) = room.process_frame(x, x);
            assert!(l.is_finite() && r.is_finite());
        }
    }

    #[test]
    fn test_params_round_trip_with_clamping() {
        let mut room = Convolver::new(48000.0);
        room.set_param(0, 5.0);
        room.set_param(4, 10.0);
        room.set_param(2, 0.25);
        assert_eq!(room.get_param(0), 20.0);
        assert_eq!(room.get_param(4), 4.0);
        assert_eq!(room.get_param(2), 0.25);
        let empty = Convolver::with_impulse_response(48000.0, Vec::new());
        assert_eq!(empty.impulse_response(), &[0.0]);
    }
}
