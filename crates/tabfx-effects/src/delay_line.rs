//! Stereo fractional delay.
//!
//! [`DelayLine`] is both a graph node (a fixed, smoothed delay) and the
//! buffer the modulated effects read from: the pitch shifter and the chorus
//! write once per frame and take their own taps with [`DelayLine::read`] and
//! [`DelayLine::read_channels`].

use tabfx_core::{InterpolatedDelay, Node, SmoothedParam};

/// Stereo delay built on two [`InterpolatedDelay`] buffers.
///
/// ## Parameter Indices
///
/// | Index | Name | Range | Default |
/// |-------|------|-------|---------|
/// | 0 | Delay | 0.0–max seconds | 0.0 |
///
/// # Example
///
/// ```rust
/// use tabfx_core::Node;
/// use tabfx_effects::DelayLine;
///
/// let mut delay = DelayLine::new(1000.0, 0.01);
/// delay.set_delay(0.002);
/// delay.snap();
/// let first = delay.process_frame(1.0, -1.0);
/// let _ = delay.process_frame(0.0, 0.0);
/// let third = delay.process_frame(0.0, 0.0);
/// assert_eq!(first, (0.0, 0.0));
/// assert_eq!(third, (1.0, -1.0));
/// ```
#[derive(Debug, Clone)]
pub struct DelayLine {
    left: InterpolatedDelay,
    right: InterpolatedDelay,
    delay: SmoothedParam,
    max_seconds: f32,
    sample_rate: f32,
}

impl DelayLine {
    /// Creates a delay able to reach back `max_seconds`.
    pub fn new(sample_rate: f32, max_seconds: f32) -> Self {
        let max_seconds = if max_seconds.is_finite() {
            max_seconds.max(0.0)
        } else {
            0.0
        };
        Self {
            left: InterpolatedDelay::from_time(sample_rate, max_seconds),
            right: InterpolatedDelay::from_time(sample_rate, max_seconds),
            delay: SmoothedParam::standard(0.0, sample_rate),
            max_seconds,
            sample_rate,
        }
    }

    /// Sets the node's delay time in seconds, clamped to the capacity.
    pub fn set_delay(&mut self, seconds: f32) {
        if seconds.is_finite() {
            self.delay.set_target(seconds.clamp(0.0, self.max_seconds));
        }
    }

    /// Target delay time in seconds.
    pub fn delay(&self) -> f32 {
        self.delay.target()
    }

    /// Jumps to the target delay time.
    pub fn snap(&mut self) {
        self.delay.snap_to_target();
    }

    /// Longest reachable delay in samples.
    pub fn max_delay_samples(&self) -> f32 {
        self.left.max_delay()
    }

    /// Sample rate the buffers were sized for.
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Pushes one frame.
    #[inline]
    pub fn write(&mut self, left: f32, right: f32) {
        self.left.write(left);
        self.right.write(right);
    }

    /// Reads both channels at the same delay, in samples.
    #[inline]
    pub fn read(&self, delay_samples: f32) -> (f32, f32) {
        (self.left.read(delay_samples), self.right.read(delay_samples))
    }

    /// Reads each channel at its own delay, in samples.
    #[inline]
    pub fn read_channels(&self, left_delay: f32, right_delay: f32) -> (f32, f32) {
        (self.left.read(left_delay), self.right.read(right_delay))
    }

    /// Silences the buffers.
    pub fn clear(&mut self) {
        self.left.clear();
        self.right.clear();
    }
}

impl Node for DelayLine {
    fn name(&self) -> &'static str {
        "delay"
    }

    #[inline]
    fn process_frame(&mut self, left: f32, right: f32) -> (f32, f32) {
        self.write(left, right);
        let samples = self.delay.advance() * self.sample_rate;
        self.read(samples)
    }

    fn reset(&mut self) {
        self.clear();
        self.snap();
    }

    fn param_count(&self) -> usize {
        1
    }

    fn get_param(&self, index: usize) -> f32 {
        if index == 0 { self.delay() } else { 0.0 }
    }

    fn set_param(&mut self, index: usize, value: f32) {
        if index == 0 {
            self.set_delay(value);
        }
    }

    fn latency_samples(&self) -> usize {
        (self.delay.target() * self.sample_rate) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_delay_is_passthrough() {
        let mut d = DelayLine::new(48000.0, 0.1);
        for i in 0..100 {
            let x = i as f32 * 0.01;
            assert_eq!(d.process_frame(x, -x), (x, -x));
        }
    }

    #[test]
    fn test_fractional_read_interpolates() {
        let mut d = DelayLine::new(48000.0, 0.01);
        d.write(0.0, 0.0);
        d.write(1.0, 2.0);
        let (l, r) = d.read(0.5);
        assert!((l - 0.5).abs() < 1e-6);
        assert!((r - 1.0).abs() < 1e-6);
        let (l, r) = d.read_channels(0.0, 1.0);
        assert_eq!((l, r), (1.0, 0.0));
    }

    #[test]
    fn test_delay_is_clamped_to_capacity() {
        let mut d = DelayLine::new(48000.0, 0.01);
        d.set_delay(5.0);
        assert_eq!(d.delay(), 0.01);
        d.set_param(0, -1.0);
        assert_eq!(d.get_param(0), 0.0);
        assert!(d.max_delay_samples() >= 480.0);
    }

    #[test]
    fn test_reset_silences() {
        let mut d = DelayLine::new(48000.0, 0.01);
        d.set_delay(0.001);
        d.snap();
        for _ in 0..100 {
            d.process_frame(1.0, 1.0);
        }
        d.reset();
        assert_eq!(d.process_frame(0.0, 0.0), (0.0, 0.0));
        assert_eq!(d.latency_samples(), 48);
    }
}
