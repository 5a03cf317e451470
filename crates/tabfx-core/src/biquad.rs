//! Second-order IIR sections with RBJ cookbook coefficients.
//!
//! [`BiquadCoefficients`] is a plain value computed off the sample loop;
//! [`Biquad`] holds the Direct Form I history. Swapping coefficients never
//! touches the history, so a filter can be retuned while it runs without
//! the click a state reset would cause.
//!
//! Shelf filters use a shelf slope of S = 1, peaking filters take Q directly.

use core::f32::consts::PI;
use libm::{cosf, powf, sinf, sqrtf};

/// Normalized biquad coefficients (`a0` divided out).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoefficients {
    /// Feedforward x\[n\].
    pub b0: f32,
    /// Feedforward x\[n-1\].
    pub b1: f32,
    /// Feedforward x\[n-2\].
    pub b2: f32,
    /// Feedback y\[n-1\].
    pub a1: f32,
    /// Feedback y\[n-2\].
    pub a2: f32,
}

impl BiquadCoefficients {
    /// Passthrough: `y[n] = x[n]`.
    pub const IDENTITY: Self = Self {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    /// Builds coefficients from raw cookbook terms, dividing through by `a0`.
    pub fn normalized(b0: f32, b1: f32, b2: f32, a0: f32, a1: f32, a2: f32) -> Self {
        let inv = 1.0 / a0;
        Self {
            b0: b0 * inv,
            b1: b1 * inv,
            b2: b2 * inv,
            a1: a1 * inv,
            a2: a2 * inv,
        }
    }

    /// Peaking EQ centred on `frequency` with bandwidth set by `q`.
    pub fn peaking(frequency: f32, q: f32, gain_db: f32, sample_rate: f32) -> Self {
        let (cos_w, sin_w) = angular(frequency, sample_rate);
        let a = shelf_amplitude(gain_db);
        let alpha = sin_w / (2.0 * q.max(1e-3));

        Self::normalized(
            1.0 + alpha * a,
            -2.0 * cos_w,
            1.0 - alpha * a,
            1.0 + alpha / a,
            -2.0 * cos_w,
            1.0 - alpha / a,
        )
    }

    /// Low shelf boosting or cutting everything below `frequency`.
    pub fn low_shelf(frequency: f32, gain_db: f32, sample_rate: f32) -> Self {
        let (cos_w, sin_w) = angular(frequency, sample_rate);
        let a = shelf_amplitude(gain_db);
        let two_sqrt_a_alpha = 2.0 * sqrtf(a) * shelf_alpha(sin_w);

        Self::normalized(
            a * ((a + 1.0) - (a - 1.0) * cos_w + two_sqrt_a_alpha),
            2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w),
            a * ((a + 1.0) - (a - 1.0) * cos_w - two_sqrt_a_alpha),
            (a + 1.0) + (a - 1.0) * cos_w + two_sqrt_a_alpha,
            -2.0 * ((a - 1.0) + (a + 1.0) * cos_w),
            (a + 1.0) + (a - 1.0) * cos_w - two_sqrt_a_alpha,
        )
    }

    /// High shelf boosting or cutting everything above `frequency`.
    pub fn high_shelf(frequency: f32, gain_db: f32, sample_rate: f32) -> Self {
        let (cos_w, sin_w) = angular(frequency, sample_rate);
        let a = shelf_amplitude(gain_db);
        let two_sqrt_a_alpha = 2.0 * sqrtf(a) * shelf_alpha(sin_w);

        Self::normalized(
            a * ((a + 1.0) + (a - 1.0) * cos_w + two_sqrt_a_alpha),
            -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w),
            a * ((a + 1.0) + (a - 1.0) * cos_w - two_sqrt_a_alpha),
            (a + 1.0) - (a - 1.0) * cos_w + two_sqrt_a_alpha,
            2.0 * ((a - 1.0) - (a + 1.0) * cos_w),
            (a + 1.0) - (a - 1.0) * cos_w - two_sqrt_a_alpha,
        )
    }

    /// Second-order lowpass.
    pub fn lowpass(frequency: f32, q: f32, sample_rate: f32) -> Self {
        let (cos_w, sin_w) = angular(frequency, sample_rate);
        let alpha = sin_w / (2.0 * q.max(1e-3));
        Self::normalized(
            (1.0 - cos_w) / 2.0,
            1.0 - cos_w,
            (1.0 - cos_w) / 2.0,
            1.0 + alpha,
            -2.0 * cos_w,
            1.0 - alpha,
        )
    }

    /// Second-order highpass.
    pub fn highpass(frequency: f32, q: f32, sample_rate: f32) -> Self {
        let (cos_w, sin_w) = angular(frequency, sample_rate);
        let alpha = sin_w / (2.0 * q.max(1e-3));
        Self::normalized(
            (1.0 + cos_w) / 2.0,
            -(1.0 + cos_w),
            (1.0 + cos_w) / 2.0,
            1.0 + alpha,
            -2.0 * cos_w,
            1.0 - alpha,
        )
    }
}

impl Default for BiquadCoefficients {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// `(cos w0, sin w0)`, with the frequency kept strictly inside (0, Nyquist).
#[inline]
fn angular(frequency: f32, sample_rate: f32) -> (f32, f32) {
    let nyquist_guard = sample_rate * 0.499;
    let f = frequency.clamp(1.0, nyquist_guard);
    let omega = 2.0 * PI * f / sample_rate;
    (cosf(omega), sinf(omega))
}

#[inline]
fn shelf_amplitude(gain_db: f32) -> f32 {
    powf(10.0, gain_db / 40.0)
}

// alpha = sin(w0)/2 * sqrt((A + 1/A)(1/S - 1) + 2) with S = 1.
#[inline]
fn shelf_alpha(sin_w: f32) -> f32 {
    sin_w / 2.0 * core::f32::consts::SQRT_2
}

/// Direct Form I biquad section.
///
/// ```text
/// y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2] - a1*y[n-1] - a2*y[n-2]
/// ```
#[derive(Debug, Clone, Default)]
pub struct Biquad {
    coeffs: BiquadCoefficients,
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl Biquad {
    /// Passthrough section with empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Section with the given coefficients.
    pub fn with_coefficients(coeffs: BiquadCoefficients) -> Self {
        Self {
            coeffs,
            ..Self::default()
        }
    }

    /// Replaces the coefficients. History is kept.
    #[inline]
    pub fn set_coefficients(&mut self, coeffs: BiquadCoefficients) {
        self.coeffs = coeffs;
    }

    /// Current coefficients.
    pub fn coefficients(&self) -> &BiquadCoefficients {
        &self.coeffs
    }

    /// Filters one sample.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let c = &self.coeffs;
        let output = c.b0 * input + c.b1 * self.x1 + c.b2 * self.x2 - c.a1 * self.y1 - c.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = crate::math::flush_denormal(output);

        output
    }

    /// Clears the history without touching the coefficients.
    pub fn clear(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 48000.0;

    fn assert_identity(c: &BiquadCoefficients) {
        assert!((c.b0 - 1.0).abs() < 1e-5, "b0 = {}", c.b0);
        assert!((c.b1 - c.a1).abs() < 1e-5, "b1 {} vs a1 {}", c.b1, c.a1);
        assert!((c.b2 - c.a2).abs() < 1e-5, "b2 {} vs a2 {}", c.b2, c.a2);
    }

    #[test]
    fn test_zero_gain_is_identity() {
        assert_identity(&BiquadCoefficients::peaking(1000.0, 5.0, 0.0, SR));
        assert_identity(&BiquadCoefficients::low_shelf(32.0, 0.0, SR));
        assert_identity(&BiquadCoefficients::high_shelf(16000.0, 0.0, SR));
    }

    #[test]
    fn test_retune_keeps_history() {
        let mut bq = Biquad::with_coefficients(BiquadCoefficients::peaking(1000.0, 5.0, 6.0, SR));
        for i in 0..64 {
            bq.process(if i % 2 == 0 { 0.5 } else { -0.5 });
        }
        let before = bq.clone();
        bq.set_coefficients(BiquadCoefficients::peaking(1000.0, 5.0, 7.0, SR));
        assert_eq!(bq.x1, before.x1);
        assert_eq!(bq.y1, before.y1);
        assert_eq!(bq.y2, before.y2);
    }

    #[test]
    fn test_low_shelf_dc_gain_matches_setting() {
        // At DC the low shelf gain is A^2 = 10^(g/20).
        let c = BiquadCoefficients::low_shelf(100.0, 12.0, SR);
        let dc = (c.b0 + c.b1 + c.b2) / (1.0 + c.a1 + c.a2);
        let expected = powf(10.0, 12.0 / 20.0);
        assert!((dc - expected).abs() / expected < 1e-2, "dc gain {dc}");
    }

    #[test]
    fn test_clear_zeroes_history() {
        let mut bq = Biquad::with_coefficients(BiquadCoefficients::lowpass(500.0, 0.707, SR));
        bq.process(1.0);
        bq.clear();
        assert_eq!(bq.process(0.0), 0.0);
    }
}
