//! Fractional delay line.
//!
//! [`InterpolatedDelay`] is a circular buffer read with linear interpolation.
//! The convention throughout tabfx is write-then-read: after `write(x)`, a
//! read at delay `0.0` returns `x`. That makes a zero-depth modulated delay
//! an exact passthrough.

#[cfg(not(feature = "std"))]
use alloc::vec;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

/// Circular delay buffer with linear-interpolated fractional reads.
///
/// The buffer is allocated once at construction; reads and writes never
/// allocate.
#[derive(Debug, Clone)]
pub struct InterpolatedDelay {
    buffer: Vec<f32>,
    write_pos: usize,
}

impl InterpolatedDelay {
    /// Creates a delay able to reach back `max_delay_samples` samples.
    pub fn new(max_delay_samples: usize) -> Self {
        // Two extra slots: the newest sample and the interpolation neighbour.
        Self {
            buffer: vec![0.0; max_delay_samples + 2],
            write_pos: 0,
        }
    }

    /// Creates a delay sized for `max_seconds` at `sample_rate`.
    pub fn from_time(sample_rate: f32, max_seconds: f32) -> Self {
        let samples = (sample_rate * max_seconds.max(0.0)) as usize + 1;
        Self::new(samples)
    }

    /// Longest delay, in samples, that [`read`](Self::read) will honour.
    #[inline]
    pub fn max_delay(&self) -> f32 {
        (self.buffer.len() - 2) as f32
    }

    /// Pushes one sample.
    #[inline]
    pub fn write(&mut self, sample: f32) {
        self.buffer[self.write_pos] = sample;
        self.write_pos += 1;
        if self.write_pos == self.buffer.len() {
            self.write_pos = 0;
        }
    }

    /// Reads `delay_samples` behind the newest sample, clamped to `[0, max_delay]`.
    #[inline]
    pub fn read(&self, delay_samples: f32) -> f32 {
        let len = self.buffer.len();
        let delay = if delay_samples.is_finite() {
            delay_samples.clamp(0.0, self.max_delay())
        } else {
            0.0
        };
        let whole = delay as usize;
        let frac = delay - whole as f32;

        let newest = (self.write_pos + len - 1) % len;
        let a = (newest + len - whole) % len;
        let b = (a + len - 1) % len;
        let s0 = self.buffer[a];
        let s1 = self.buffer[b];
        s0 + (s1 - s0) * frac
    }

    /// Writes `sample` then reads at `delay_samples`.
    #[inline]
    pub fn write_read(&mut self, sample: f32, delay_samples: f32) -> f32 {
        self.write(sample);
        self.read(delay_samples)
    }

    /// Fills the buffer with silence.
    pub fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_delay_returns_newest() {
        let mut d = InterpolatedDelay::new(16);
        for i in 0..40 {
            let x = i as f32;
            assert_eq!(d.write_read(x, 0.0), x);
        }
    }

    #[test]
    fn test_integer_delay() {
        let mut d = InterpolatedDelay::new(8);
        let mut out = Vec::new();
        for i in 0..20 {
            out.push(d.write_read(i as f32, 3.0));
        }
        assert_eq!(out[10], 7.0);
        assert_eq!(out[19], 16.0);
    }

    #[test]
    fn test_fractional_delay_interpolates() {
        let mut d = InterpolatedDelay::new(8);
        for i in 0..10 {
            d.write(i as f32);
        }
        assert!((d.read(1.5) - 7.5).abs() < 1e-6);
    }

    #[test]
    fn test_read_clamps_to_capacity() {
        let mut d = InterpolatedDelay::new(4);
        for i in 0..10 {
            d.write(i as f32);
        }
        assert_eq!(d.read(100.0), d.read(4.0));
        assert_eq!(d.read(-3.0), 9.0);
        assert_eq!(d.read(f32::NAN), 9.0);
    }
}
