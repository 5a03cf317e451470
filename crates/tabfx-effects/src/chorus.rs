//! Quadrature chorus with feedback.
//!
//! Each channel reads the shared [`DelayLine`] through its own tap. The two
//! taps are swept by one LFO, 90° apart, around a short base delay. Rate 0
//! freezes the LFO at its start phase, which leaves a static, depth-scaled
//! short delay on each side.

use core::f32::consts::TAU;

use libm::{cosf, sinf};
use tabfx_core::{Node, SmoothedParam, flush_denormal};

use crate::DelayLine;

const MAX_BASE_DELAY: f32 = 0.05;

/// Chorus node.
///
/// ## Parameter Indices
///
/// | Index | Name | Range | Default |
/// |-------|------|-------|---------|
/// | 0 | Rate | 0.0–8.0 Hz | 0.0 |
/// | 1 | Depth | 0.0–1.0 | 0.7 |
/// | 2 | Feedback | 0.0–0.95 | 0.4 |
/// | 3 | Delay | 0.0002–0.05 s | 0.0045 |
///
/// # Example
///
/// ```rust
/// use tabfx_core::Node;
/// use tabfx_effects::Chorus;
///
/// let mut chorus = Chorus::new(48000.0);
/// chorus.set_rate(1.5);
/// let (l, r) = chorus.process_frame(0.5, 0.5);
/// assert_eq!((l, r), (0.5, 0.5));
/// ```
#[derive(Debug, Clone)]
pub struct Chorus {
    delay: DelayLine,
    rate: f32,
    depth: SmoothedParam,
    feedback: f32,
    base_delay: SmoothedParam,
    phase: f32,
    feedback_state: (f32, f32),
    sample_rate: f32,
}

impl Chorus {
    /// Creates a chorus with default settings.
    pub fn new(sample_rate: f32) -> Self {
        let mut chorus = Self {
            // Base delay plus full depth.
            delay: DelayLine::new(sample_rate, 2.0 * MAX_BASE_DELAY),
            rate: 0.0,
            depth: SmoothedParam::standard(0.7, sample_rate),
            feedback: 0.4,
            base_delay: SmoothedParam::standard(0.0045, sample_rate),
            phase: 0.0,
            feedback_state: (0.0, 0.0),
            sample_rate,
        };
        chorus.depth.snap_to_target();
        chorus.base_delay.snap_to_target();
        chorus
    }

    /// Set LFO rate in Hz.
    pub fn set_rate(&mut self, rate_hz: f32) {
        if rate_hz.is_finite() {
            self.rate = rate_hz.clamp(0.0, 8.0);
        }
    }

    /// Set modulation depth (0–1).
    pub fn set_depth(&mut self, depth: f32) {
        if depth.is_finite() {
            self.depth.set_target(depth.clamp(0.0, 1.0));
        }
    }

    /// Set feedback amount.
    pub fn set_feedback(&mut self, feedback: f32) {
        if feedback.is_finite() {
            self.feedback = feedback.clamp(0.0, 0.95);
        }
    }

    /// Set base delay in seconds.
    pub fn set_delay(&mut self, seconds: f32) {
        if seconds.is_finite() {
            self.base_delay.set_target(seconds.clamp(0.0002, MAX_BASE_DELAY));
        }
    }
}

impl Node for Chorus {
    fn name(&self) -> &'static str {
        "chorus"
    }

    #[inline]
    fn process_frame(&mut self, left: f32, right: f32) -> (f32, f32) {
        let depth = self.depth.advance();
        let base = self.base_delay.advance() * self.sample_rate;

        let angle = TAU * self.phase;
        let lfo_l = 0.5 * (1.0 + sinf(angle));
        let lfo_r = 0.5 * (1.0 + cosf(angle));
        self.phase += self.rate / self.sample_rate;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }

        let (fb_l, fb_r) = self.feedback_state;
        self.delay
            .write(left + fb_l * self.feedback, right + fb_r * self.feedback);
        let (wet_l, wet_r) = self
            .delay
            .read_channels(base * (1.0 + depth * lfo_l), base * (1.0 + depth * lfo_r));
        self.feedback_state = (flush_denormal(wet_l), flush_denormal(wet_r));

        (left + wet_l * 0.5, right + wet_r * 0.5)
    }

    fn reset(&mut self) {
        self.delay.clear();
        self.feedback_state = (0.0, 0.0);
        self.phase = 0.0;
        self.depth.snap_to_target();
        self.base_delay.snap_to_target();
    }

    fn param_count(&self) -> usize {
        4
    }

    fn get_param(&self, index: usize) -> f32 {
        match index {
            0 => self.rate,
            1 => self.depth.target(),
            2 => self.feedback,
            3 => self.base_delay.target(),
            _ => 0.0,
        }
    }

    fn set_param(&mut self, index: usize, value: f32) {
        match index {
            0 => self.set_rate(value),
            1 => self.set_depth(value),
            2 => self.set_feedback(value),
            3 => self.set_delay(value),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn impulse_response(chorus: &mut Chorus, len: usize) -> Vec<(f32, f32)> {
        (0..len)
            .map(|i| {
                let x = if i == 0 { 1.0 } else { 0.0 };
                chorus.process_frame(x, x)
            })
            .collect()
    }

    #[test]
    fn test_static_delay_at_rate_zero() {
        let mut chorus = Chorus::new(48000.0);
        chorus.set_feedback(0.0);
        chorus.set_depth(0.0);
        chorus.reset();
        let ir = impulse_response(&mut chorus, 400);
        // Base delay 4.5 ms = 216 samples.
        assert_eq!(ir[0], (1.0, 1.0));
        assert!((ir[216].0 - 0.5).abs() < 1e-4);
        assert!((ir[216].1 - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_depth_scales_static_taps() {
        let mut chorus = Chorus::new(48000.0);
        chorus.set_feedback(0.0);
        chorus.reset();
        let ir = impulse_response(&mut chorus, 600);
        // Phase 0: left LFO at 0.5, right at 1.0.
        let left_tap = (216.0 * (1.0 + 0.7 * 0.5)) as usize;
        let right_tap = (216.0 * (1.0 + 0.7)) as usize;
        let peak = |ch: fn(&(f32, f32)) -> f32| {
            ir.iter()
                .enumerate()
                .skip(1)
                .max_by(|a, b| ch(a.1).abs().total_cmp(&ch(b.1).abs()))
                .map(|(i, _)| i)
        };
        let l = peak(|f| f.0).unwrap();
        let r = peak(|f| f.1).unwrap();
        assert!(l.abs_diff(left_tap) <= 1, "left tap {l}");
        assert!(r.abs_diff(right_tap) <= 1, "right tap {r}");
    }

    #[test]
    fn test_feedback_decays() {
        let mut chorus = Chorus::new(48000.0);
        chorus.set_feedback(0.95);
        chorus.set_rate(3.0);
        chorus.reset();
        let ir = impulse_response(&mut chorus, 48000 * 4);
        let tail = ir[ir.len() - 1000..]
            .iter()
            .map(|f| f.0.abs().max(f.1.abs()))
            .fold(0.0f32, f32::max);
        assert!(tail < 0.05, "tail {tail}");
        assert!(ir.iter().all(|f| f.0.is_finite() && f.1.is_finite()));
    }

    #[test]
    fn test_param_clamping() {
        let mut chorus = Chorus::new(48000.0);
        chorus.set_param(0, 100.0);
        chorus.set_param(2, 2.0);
        chorus.set_param(3, 1.0);
        assert_eq!(chorus.get_param(0), 8.0);
        assert_eq!(chorus.get_param(2), 0.95);
        assert_eq!(chorus.get_param(3), 0.05);
        assert_eq!(chorus.get_param(1), 0.7);
    }
}
