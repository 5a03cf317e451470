//! Property-based tests for the tabfx nodes.
//!
//! Uses proptest to check the invariants the tab chain relies on: constant
//! power panning, stable EQ bands, a transparent compressor at ratio 1 and
//! a transparent pitch shifter at offset 0.

use proptest::prelude::*;
use tabfx_core::Node;
use tabfx_effects::{BiquadFilter, Compressor, EQ_BAND_COUNT, PitchShifter, pan_gains};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// leftGain² + rightGain² = 1 for every balance.
    #[test]
    fn pan_is_constant_power(balance in -1.0f32..=1.0) {
        let (l, r) = pan_gains(balance);
        prop_assert!((l * l + r * r - 1.0).abs() < 1e-5);
        prop_assert!(l >= -1e-6 && r >= -1e-6);
    }

    /// Any gain in the band domain leaves the filter bounded and finite.
    #[test]
    fn eq_band_stays_bounded(
        band in 0usize..EQ_BAND_COUNT,
        gain_db in -40.0f32..=40.0,
        input in prop::array::uniform32(-1.0f32..=1.0),
    ) {
        let mut filter = BiquadFilter::eq_band(band, 48000.0);
        filter.set_gain_db(gain_db);
        for _ in 0..64 {
            for &x in &input {
                let (l, r) = filter.process_frame(x, -x);
                prop_assert!(l.is_finite() && r.is_finite());
                // +40 dB is a gain of 100; ringing stays within a small multiple.
                prop_assert!(l.abs() < 1000.0);
            }
        }
    }

    /// Ratio 1 scales by the makeup gain and nothing else.
    #[test]
    fn compressor_ratio_one_is_makeup_only(
        threshold in -100.0f32..=0.0,
        knee in 0.0f32..=40.0,
        makeup in 0.0f32..=16.0,
        input in prop::array::uniform32(-1.0f32..=1.0),
    ) {
        let mut comp = Compressor::new(48000.0);
        comp.set_threshold_db(threshold);
        comp.set_knee_db(knee);
        comp.set_makeup_gain(makeup);
        comp.reset();
        for &x in &input {
            let (l, r) = comp.process_frame(x, x * 0.5);
            prop_assert!((l - x * makeup).abs() <= 1e-6 * makeup.max(1.0));
            prop_assert!((r - x * 0.5 * makeup).abs() <= 1e-6 * makeup.max(1.0));
        }
    }

    /// Above threshold, a hard-knee compressor lands on the threshold line.
    #[test]
    fn compressor_follows_static_curve(
        threshold in -100.0f32..=-10.0,
        ratio in 1.5f32..=20.0,
        level in 0.05f32..=1.0,
    ) {
        let mut comp = Compressor::new(48000.0);
        comp.set_threshold_db(threshold);
        comp.set_ratio(ratio);
        comp.set_knee_db(0.0);
        let (l, _) = comp.process_frame(level, -level);
        let x = tabfx_core::linear_to_db(level);
        let expected = if x > threshold { threshold + (x - threshold) / ratio } else { x };
        prop_assert!((tabfx_core::linear_to_db(l.abs()) - expected).abs() < 0.05);
    }

    /// Offset 0 passes every sample through untouched.
    #[test]
    fn pitch_offset_zero_is_identity(input in prop::collection::vec(-1.0f32..=1.0, 1..512)) {
        let mut shifter = PitchShifter::new(48000.0);
        for &x in &input {
            prop_assert_eq!(shifter.process_frame(x, -x), (x, -x));
        }
    }
}
