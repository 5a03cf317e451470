//! Level conversions and small sample helpers.
//!
//! Everything here is allocation-free and `no_std` friendly.

use libm::{expf, logf};

/// Floor used when converting silence to decibels.
pub const SILENCE_DB: f32 = -200.0;

/// Convert decibels to linear gain.
///
/// ```rust
/// use tabfx_core::db_to_linear;
///
/// assert!((db_to_linear(0.0) - 1.0).abs() < 1e-6);
/// assert!((db_to_linear(-6.0206) - 0.5).abs() < 1e-4);
/// ```
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    const FACTOR: f32 = core::f32::consts::LN_10 / 20.0;
    expf(db * FACTOR)
}

/// Convert linear gain to decibels, flooring silence at [`SILENCE_DB`].
///
/// ```rust
/// use tabfx_core::linear_to_db;
///
/// assert!(linear_to_db(1.0).abs() < 1e-6);
/// assert_eq!(linear_to_db(0.0), tabfx_core::math::SILENCE_DB);
/// ```
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    const FACTOR: f32 = 20.0 / core::f32::consts::LN_10;
    if linear <= 1e-10 {
        SILENCE_DB
    } else {
        logf(linear) * FACTOR
    }
}

/// One-pole smoothing coefficient for a time constant in seconds.
///
/// A time of zero (or less) yields `0.0`, meaning the follower jumps to its
/// target within one sample. No division happens on that path.
#[inline]
pub fn one_pole_coefficient(time_seconds: f32, sample_rate: f32) -> f32 {
    if time_seconds <= 0.0 || sample_rate <= 0.0 {
        0.0
    } else {
        expf(-1.0 / (time_seconds * sample_rate))
    }
}

/// Flush values in the subnormal neighbourhood to zero.
#[allow(clippy::inline_always)]
#[inline(always)]
pub fn flush_denormal(x: f32) -> f32 {
    if x.abs() < 1e-20 { 0.0 } else { x }
}

/// Crossfade between dry and wet: `mix = 0` is all dry, `mix = 1` all wet.
#[inline]
pub fn wet_dry_mix(dry: f32, wet: f32, mix: f32) -> f32 {
    dry + (wet - dry) * mix
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_linear_roundtrip() {
        for &db in &[-60.0_f32, -20.0, -6.0, 0.0, 6.0, 12.0] {
            let back = linear_to_db(db_to_linear(db));
            assert!((back - db).abs() < 1e-3, "{db} dB came back as {back}");
        }
    }

    #[test]
    fn test_zero_time_coefficient_is_instant() {
        assert_eq!(one_pole_coefficient(0.0, 48000.0), 0.0);
        assert_eq!(one_pole_coefficient(-1.0, 48000.0), 0.0);
        let c = one_pole_coefficient(0.01, 48000.0);
        assert!(c > 0.99 && c < 1.0);
    }

    #[test]
    fn test_wet_dry_endpoints() {
        assert_eq!(wet_dry_mix(0.25, 0.75, 0.0), 0.25);
        assert_eq!(wet_dry_mix(0.25, 0.75, 1.0), 0.75);
    }
}
