//! Signal-level checks for the tab chain nodes.
//!
//! These drive real test tones through the nodes and measure the result,
//! rather than inspecting coefficients.

use tabfx_core::Node;
use tabfx_effects::{BiquadFilter, Compressor, EQ_BAND_COUNT, Gain, PitchShifter, pan_gains};

const SAMPLE_RATE: f32 = 48000.0;

/// Generate a sine wave at the given frequency and duration.
fn generate_sine(sample_rate: f32, freq_hz: f32, duration_s: f32) -> Vec<f32> {
    let num_samples = (sample_rate * duration_s) as usize;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate;
            (2.0 * std::f32::consts::PI * freq_hz * t).sin()
        })
        .collect()
}

/// Compute RMS of a signal.
fn rms(signal: &[f32]) -> f32 {
    if signal.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = signal.iter().map(|s| s * s).sum();
    (sum_sq / signal.len() as f32).sqrt()
}

fn to_db(linear: f32) -> f32 {
    20.0 * linear.max(1e-10).log10()
}

/// Run a mono signal through both channels of a node, returning the left channel.
fn process(node: &mut dyn Node, input: &[f32]) -> Vec<f32> {
    input.iter().map(|&x| node.process_frame(x, x).0).collect()
}

#[test]
fn flat_eq_chain_is_identity() {
    let mut bands: Vec<BiquadFilter> = (0..EQ_BAND_COUNT)
        .map(|b| BiquadFilter::eq_band(b, SAMPLE_RATE))
        .collect();
    let input = generate_sine(SAMPLE_RATE, 997.0, 0.1);
    for &x in &input {
        let mut frame = (x, -x);
        for band in &mut bands {
            frame = band.process_frame(frame.0, frame.1);
        }
        assert_eq!(frame, (x, -x));
    }
}

#[test]
fn low_shelf_boost_rises_monotonically() {
    let mut band = BiquadFilter::eq_band(0, SAMPLE_RATE);
    let tone = generate_sine(SAMPLE_RATE, 40.0, 0.25);
    let mut levels = Vec::new();
    for step in 0..=6 {
        band.set_gain_db(step as f32 * 2.0);
        let out = process(&mut band, &tone);
        // Measure the settled second half of each step.
        levels.push(rms(&out[out.len() / 2..]));
    }
    for pair in levels.windows(2) {
        assert!(pair[1] > pair[0], "levels not rising: {levels:?}");
    }
    let boost = to_db(levels[6]) - to_db(levels[0]);
    assert!(boost > 3.0 && boost < 12.5, "boost {boost} dB");
}

#[test]
fn peaking_band_is_local() {
    let mut band = BiquadFilter::eq_band(5, SAMPLE_RATE);
    band.set_gain_db(12.0);
    band.reset();
    let near = process(&mut band, &generate_sine(SAMPLE_RATE, 1000.0, 0.2));
    band.reset();
    let far = process(&mut band, &generate_sine(SAMPLE_RATE, 8000.0, 0.2));
    let near_db = to_db(rms(&near[4800..])) - to_db(std::f32::consts::FRAC_1_SQRT_2);
    let far_db = to_db(rms(&far[4800..])) - to_db(std::f32::consts::FRAC_1_SQRT_2);
    assert!((near_db - 12.0).abs() < 0.2, "centre {near_db} dB");
    assert!(far_db.abs() < 0.5, "far {far_db} dB");
}

#[test]
fn centred_pan_preserves_stereo_power() {
    let (l_gain, r_gain) = pan_gains(0.0);
    let mut pan = Gain::new(SAMPLE_RATE, 1.0);
    pan.set_channel_gains(l_gain, r_gain);
    pan.reset();
    let amplitude = 10f32.powf(-6.0 / 20.0);
    let tone: Vec<f32> = generate_sine(SAMPLE_RATE, 1000.0, 0.1)
        .into_iter()
        .map(|x| x * amplitude)
        .collect();
    let (mut left, mut right) = (Vec::new(), Vec::new());
    for &x in &tone {
        let (l, r) = pan.process_frame(x, x);
        left.push(l);
        right.push(r);
    }
    let power = (rms(&left).powi(2) + rms(&right).powi(2)).sqrt();
    assert!((to_db(power) - to_db(rms(&tone))).abs() < 0.1);
}

#[test]
fn compressor_extreme_settings_pull_toward_threshold() {
    let mut comp = Compressor::new(SAMPLE_RATE);
    comp.set_threshold_db(-100.0);
    comp.set_ratio(20.0);
    let tone = generate_sine(SAMPLE_RATE, 440.0, 0.1);
    let out = process(&mut comp, &tone);
    assert!(rms(&out) < rms(&tone) * 0.001);
    assert!(comp.gain_reduction_db() < -60.0);
}

#[test]
fn pitch_shift_keeps_level() {
    let mut shifter = PitchShifter::new(SAMPLE_RATE);
    shifter.set_pitch_offset(0.45);
    let tone = generate_sine(SAMPLE_RATE, 440.0, 1.0);
    let out = process(&mut shifter, &tone);
    let ratio_db = to_db(rms(&out[24000..])) - to_db(rms(&tone[24000..]));
    assert!(ratio_db.abs() < 4.0, "level change {ratio_db} dB");
}
