//! Delay-modulation pitch shifter.
//!
//! Two voices read the same delay buffer. Each voice's delay time follows a
//! sawtooth across one period: a shrinking delay plays faster (pitch up), a
//! growing delay plays slower (pitch down). The sawtooth's reset is hidden
//! under a square-root crossfade envelope, and the two voices run half a
//! period apart so one is always audible while the other jumps.
//!
//! # Signal Flow
//!
//! ```text
//!          ┌→ tap(delay₁) × fade₁ ─┐
//! Input → Delay                     (+) → wet ─┐
//!   │      └→ tap(delay₂) × fade₂ ─┘           ├→ engage crossfade → Output
//!   └──────────────────────────────────────────┘
//! ```
//!
//! # Parameters
//!
//! | Parameter | Range | Description |
//! |-----------|-------|-------------|
//! | Offset | -1 to 1 | Sign picks the direction, magnitude the depth; 0 bypasses |
//!
//! With `buffer_time = 2 · fade_time` the envelopes are power complementary:
//! `fade₁² + fade₂² = 1` at every sample.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use libm::{roundf, sqrtf};
use tabfx_core::{Node, ParamRamp, SmoothedParam, wet_dry_mix};

use crate::DelayLine;

/// Length of one voice period in seconds.
pub const BUFFER_TIME: f32 = 0.1;

/// Length of each crossfade edge in seconds.
pub const FADE_TIME: f32 = 0.05;

const SEMITONE_OFFSETS: [f32; 13] = [
    0.0, 0.15, 0.2396498, 0.3392416, 0.5240613, 0.6938444, 0.8531708, 1.0062309, 1.1572898,
    1.3572898, 1.5356231, 1.7056231, 2.0,
];

/// Maps a semitone shift to a pitch offset.
///
/// Upward shifts follow a tuned table (fractional semitones interpolate
/// between entries); downward shifts are linear, `semitones / 12`. The
/// result for large upward shifts exceeds the offset range, so callers
/// clamp it.
///
/// ```rust
/// use tabfx_effects::semitones_to_offset;
///
/// assert_eq!(semitones_to_offset(0.0), 0.0);
/// assert!((semitones_to_offset(7.0) - 1.0062309).abs() < 1e-6);
/// assert_eq!(semitones_to_offset(-6.0), -0.5);
/// ```
pub fn semitones_to_offset(semitones: f32) -> f32 {
    if !semitones.is_finite() {
        return 0.0;
    }
    if semitones < 0.0 {
        return semitones.max(-12.0) / 12.0;
    }
    let s = semitones.min(12.0);
    let lower = s as usize;
    let upper = (lower + 1).min(SEMITONE_OFFSETS.len() - 1);
    let frac = s - lower as f32;
    SEMITONE_OFFSETS[lower] + (SEMITONE_OFFSETS[upper] - SEMITONE_OFFSETS[lower]) * frac
}

/// Two-voice pitch shifter node.
///
/// ## Parameter Indices
///
/// | Index | Name | Range | Default |
/// |-------|------|-------|---------|
/// | 0 | Offset | -1.0–1.0 | 0.0 |
///
/// # Example
///
/// ```rust
/// use tabfx_core::Node;
/// use tabfx_effects::PitchShifter;
///
/// let mut shifter = PitchShifter::new(48000.0);
/// // Offset 0 is an exact passthrough.
/// assert_eq!(shifter.process_frame(0.3, -0.2), (0.3, -0.2));
///
/// shifter.set_pitch_offset(0.5);
/// let (l, _) = shifter.process_frame(0.3, -0.2);
/// assert!(l.is_finite());
/// ```
#[derive(Debug, Clone)]
pub struct PitchShifter {
    delay: DelayLine,
    fade_table: Vec<f32>,
    phases: [usize; 2],
    buffer_time: f32,
    offset: f32,
    depth: SmoothedParam,
    up: ParamRamp,
    down: ParamRamp,
    engage: ParamRamp,
    sample_rate: f32,
}

impl PitchShifter {
    /// Creates a shifter with the default 100 ms period and 50 ms fades.
    pub fn new(sample_rate: f32) -> Self {
        Self::with_timing(sample_rate, BUFFER_TIME, FADE_TIME)
    }

    /// Creates a shifter with a custom period and fade length, in seconds.
    ///
    /// The fade is limited to half the period.
    pub fn with_timing(sample_rate: f32, buffer_time: f32, fade_time: f32) -> Self {
        let buffer_time = if buffer_time.is_finite() && buffer_time * sample_rate >= 2.0 {
            buffer_time
        } else {
            BUFFER_TIME
        };
        let period = (roundf(buffer_time * sample_rate) as usize).max(2);
        let fade_len = if fade_time.is_finite() {
            (roundf(fade_time * sample_rate) as usize).clamp(1, period / 2)
        } else {
            period / 2
        };
        let fade_table = build_fade_table(period, fade_len);

        let phases = [0, period / 2];
        assert_eq!(
            (phases[1] + period - phases[0]) % period,
            period / 2,
            "voices must run half a period apart"
        );

        let ramp_ms = fade_len as f32 / sample_rate * 1000.0;
        let mut depth = SmoothedParam::standard(0.0, sample_rate);
        depth.snap_to_target();

        Self {
            delay: DelayLine::new(sample_rate, buffer_time),
            fade_table,
            phases,
            buffer_time,
            offset: 0.0,
            depth,
            up: ParamRamp::with_time(1.0, sample_rate, ramp_ms),
            down: ParamRamp::with_time(0.0, sample_rate, ramp_ms),
            engage: ParamRamp::with_time(0.0, sample_rate, ramp_ms),
            sample_rate,
        }
    }

    /// Sets the pitch offset, clamped to `[-1, 1]`. Non-finite values are ignored.
    pub fn set_pitch_offset(&mut self, offset: f32) {
        if !offset.is_finite() {
            return;
        }
        let offset = offset.clamp(-1.0, 1.0);
        self.offset = offset;
        self.depth.set_target(0.5 * offset.abs());
        if offset > 0.0 {
            self.up.set_target(1.0);
            self.down.set_target(0.0);
        } else if offset < 0.0 {
            self.up.set_target(0.0);
            self.down.set_target(1.0);
        }
        self.engage.set_target(if offset == 0.0 { 0.0 } else { 1.0 });
    }

    /// Current offset.
    pub fn pitch_offset(&self) -> f32 {
        self.offset
    }

    /// Samples per voice period.
    pub fn period(&self) -> usize {
        self.fade_table.len()
    }

    /// Crossfade envelope of one voice at position `p` in its period.
    pub fn fade_at(&self, p: usize) -> f32 {
        self.fade_table[p % self.fade_table.len()]
    }

    #[inline]
    fn advance_phases(&mut self) {
        let period = self.fade_table.len();
        for phase in &mut self.phases {
            *phase += 1;
            if *phase == period {
                *phase = 0;
            }
        }
    }
}

fn build_fade_table(period: usize, fade_len: usize) -> Vec<f32> {
    let edge = period - fade_len;
    let len = fade_len as f32;
    (0..period)
        .map(|p| {
            if p < fade_len {
                sqrtf(p as f32 / len)
            } else if p < edge {
                1.0
            } else {
                sqrtf((1.0 - (p - edge) as f32 / len).max(0.0))
            }
        })
        .collect()
}

impl Node for PitchShifter {
    fn name(&self) -> &'static str {
        "pitch_shifter"
    }

    #[inline]
    fn process_frame(&mut self, left: f32, right: f32) -> (f32, f32) {
        self.delay.write(left, right);
        let depth = self.depth.advance();
        let up = self.up.advance();
        let down = self.down.advance();
        let engage = self.engage.advance();

        if engage == 0.0 && self.engage.is_settled() {
            self.advance_phases();
            return (left, right);
        }

        let period = self.fade_table.len() as f32;
        let max_delay = (self.buffer_time * self.sample_rate).min(self.delay.max_delay_samples());
        let mut wet = (0.0, 0.0);
        for &phase in &self.phases {
            let ramp_down = phase as f32 / period;
            let ramp_up = 1.0 - ramp_down;
            let seconds = depth * self.buffer_time * (down * ramp_down + up * ramp_up);
            let samples = (seconds * self.sample_rate).clamp(0.0, max_delay);
            let (l, r) = self.delay.read(samples);
            let fade = self.fade_table[phase];
            wet.0 += l * fade;
            wet.1 += r * fade;
        }
        self.advance_phases();

        (
            wet_dry_mix(left, wet.0, engage),
            wet_dry_mix(right, wet.1, engage),
        )
    }

    fn reset(&mut self) {
        self.delay.clear();
        let period = self.fade_table.len();
        self.phases = [0, period / 2];
        self.depth.snap_to_target();
        self.up.snap_to_target();
        self.down.snap_to_target();
        self.engage.snap_to_target();
    }

    fn param_count(&self) -> usize {
        1
    }

    fn get_param(&self, index: usize) -> f32 {
        if index == 0 { self.offset } else { 0.0 }
    }

    fn set_param(&mut self, index: usize, value: f32) {
        if index == 0 {
            self.set_pitch_offset(value);
        }
    }

    fn latency_samples(&self) -> usize {
        // Mean tap delay across the sawtooth.
        (0.25 * self.offset.abs() * self.buffer_time * self.sample_rate) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::f32::consts::PI;

    fn zero_crossings(samples: &[f32]) -> usize {
        samples
            .windows(2)
            .filter(|w| (w[0] < 0.0) != (w[1] < 0.0))
            .count()
    }

    fn shifted_crossings(offset: f32) -> (usize, usize) {
        let sr = 48000.0;
        let mut shifter = PitchShifter::new(sr);
        shifter.set_pitch_offset(offset);
        let input: Vec<f32> = (0..48000)
            .map(|i| (2.0 * PI * 500.0 * i as f32 / sr).sin() * 0.5)
            .collect();
        let output: Vec<f32> = input.iter().map(|&x| shifter.process_frame(x, x).0).collect();
        (zero_crossings(&input[24000..]), zero_crossings(&output[24000..]))
    }

    #[test]
    fn test_zero_offset_is_exact_identity() {
        let mut shifter = PitchShifter::new(48000.0);
        for i in 0..10_000 {
            let x = (i as f32 * 0.013).sin();
            assert_eq!(shifter.process_frame(x, -x), (x, -x));
        }
        assert_eq!(shifter.latency_samples(), 0);
    }

    #[test]
    fn test_returning_to_zero_restores_identity() {
        let mut shifter = PitchShifter::new(48000.0);
        shifter.set_pitch_offset(-0.8);
        for i in 0..4800 {
            shifter.process_frame((i as f32 * 0.01).sin(), 0.0);
        }
        shifter.set_pitch_offset(0.0);
        for _ in 0..4800 {
            shifter.process_frame(0.1, 0.1);
        }
        assert_eq!(shifter.process_frame(0.42, -0.42), (0.42, -0.42));
    }

    #[test]
    fn test_fades_are_power_complementary() {
        let shifter = PitchShifter::new(48000.0);
        let period = shifter.period();
        assert_eq!(period, 4800);
        for p in 0..period {
            let a = shifter.fade_at(p);
            let b = shifter.fade_at(p + period / 2);
            assert!((a * a + b * b - 1.0).abs() < 1e-4, "p={p}");
        }
        assert_eq!(shifter.fade_at(0), 0.0);
    }

    #[test]
    fn test_hold_region_with_short_fades() {
        let shifter = PitchShifter::with_timing(1000.0, 0.1, 0.02);
        assert_eq!(shifter.period(), 100);
        assert_eq!(shifter.fade_at(50), 1.0);
        assert!(shifter.fade_at(10) < 1.0);
        assert!(shifter.fade_at(90) < 1.0);
    }

    #[test]
    fn test_positive_offset_raises_pitch() {
        let (dry, wet) = shifted_crossings(1.0);
        assert!(wet as f32 > dry as f32 * 1.2, "dry {dry} wet {wet}");
    }

    #[test]
    fn test_negative_offset_lowers_pitch() {
        let (dry, wet) = shifted_crossings(-1.0);
        assert!((wet as f32) < dry as f32 * 0.8, "dry {dry} wet {wet}");
    }

    #[test]
    fn test_direction_switch_is_continuous() {
        let sr = 48000.0;
        let mut shifter = PitchShifter::new(sr);
        shifter.set_pitch_offset(0.8);
        let input: Vec<f32> = (0..96_000)
            .map(|i| (2.0 * PI * 100.0 * i as f32 / sr).sin())
            .collect();

        let max_step = |out: &[f32]| {
            out.windows(2)
                .map(|w| (w[1] - w[0]).abs())
                .fold(0.0f32, f32::max)
        };

        let mut output = Vec::with_capacity(input.len());
        for &x in &input[..48_000] {
            output.push(shifter.process_frame(x, x).0);
        }
        let steady = max_step(&output[24_000..48_000]);

        shifter.set_pitch_offset(-0.8);
        for &x in &input[48_000..] {
            output.push(shifter.process_frame(x, x).0);
        }
        let around_switch = max_step(&output[47_000..57_600]);

        assert!(steady > 0.0);
        assert!(
            around_switch <= steady * 1.25,
            "steady {steady} around switch {around_switch}"
        );
    }

    #[test]
    fn test_offset_is_clamped() {
        let mut shifter = PitchShifter::new(48000.0);
        shifter.set_param(0, 3.0);
        assert_eq!(shifter.get_param(0), 1.0);
        shifter.set_pitch_offset(f32::NAN);
        assert_eq!(shifter.pitch_offset(), 1.0);
        for _ in 0..48000 {
            let (l, r) = shifter.process_frame(1.0, -1.0);
            assert!(l.abs() <= 1.5 && r.abs() <= 1.5);
        }
    }

    #[test]
    fn test_semitone_table() {
        assert_eq!(semitones_to_offset(1.0), 0.15);
        assert_eq!(semitones_to_offset(2.0), 0.2396498);
        assert_eq!(semitones_to_offset(5.0), 0.6938444);
        assert_eq!(semitones_to_offset(7.0), 1.0062309);
        assert_eq!(semitones_to_offset(11.0), 1.7056231);
        assert_eq!(semitones_to_offset(12.0), 2.0);
        assert_eq!(semitones_to_offset(30.0), 2.0);
        assert_eq!(semitones_to_offset(-12.0), -1.0);
        assert_eq!(semitones_to_offset(-24.0), -1.0);
        assert!((semitones_to_offset(0.5) - 0.075).abs() < 1e-6);
        assert_eq!(semitones_to_offset(f32::NAN), 0.0);
    }
}
