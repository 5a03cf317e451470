//! Property-based tests for tabfx-core primitives.
//!
//! Covers filter stability across the equalizer's gain domain, smoother
//! continuity, routing algebra and schedule compilation invariants.

use proptest::prelude::*;
use tabfx_core::graph::{Channel, ChannelRoute, GraphTopology, ProcessStep, RoutingMatrix};
use tabfx_core::{Biquad, BiquadCoefficients, GraphBuilder, Node, ParamRamp};

const SR: f32 = 48000.0;
const EQ_FREQS: [f32; 10] = [
    32.0, 64.0, 125.0, 250.0, 500.0, 1000.0, 2000.0, 4000.0, 8000.0, 16000.0,
];

fn band_coefficients(band: usize, gain_db: f32) -> BiquadCoefficients {
    match band {
        0 => BiquadCoefficients::low_shelf(EQ_FREQS[0], gain_db, SR),
        9 => BiquadCoefficients::high_shelf(EQ_FREQS[9], gain_db, SR),
        b => BiquadCoefficients::peaking(EQ_FREQS[b], 5.0, gain_db, SR),
    }
}

struct Pass;

impl Node for Pass {
    fn name(&self) -> &'static str {
        "pass"
    }
    fn process_frame(&mut self, l: f32, r: f32) -> (f32, f32) {
        (l, r)
    }
    fn reset(&mut self) {}
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Every equalizer band keeps both poles inside the unit circle for any
    /// gain in [-40, 40] dB, and its output stays finite.
    #[test]
    fn eq_band_stability(
        band in 0usize..10,
        gain_db in -40.0f32..=40.0f32,
        input in prop::array::uniform32(-1.0f32..=1.0f32),
    ) {
        let c = band_coefficients(band, gain_db);
        // Jury criterion for a second-order denominator 1 + a1 z^-1 + a2 z^-2.
        prop_assert!(c.a2.abs() < 1.0, "band {} gain {} a2 {}", band, gain_db, c.a2);
        prop_assert!(c.a1.abs() < 1.0 + c.a2 + 1e-6, "band {} gain {} a1 {}", band, gain_db, c.a1);

        let mut bq = Biquad::with_coefficients(c);
        for _ in 0..32 {
            for &s in &input {
                prop_assert!(bq.process(s).is_finite());
            }
        }
    }

    /// A linear ramp never moves more than the domain width / length per sample,
    /// however often it is retargeted.
    #[test]
    fn ramp_is_continuous(
        start in -4.0f32..4.0f32,
        targets in prop::collection::vec(-4.0f32..4.0f32, 1..6),
        len in 1u32..500,
    ) {
        let mut ramp = ParamRamp::new(start, len);
        let mut prev = ramp.get();
        let bound = 8.0 / len as f32 + 1e-5;
        for t in targets {
            ramp.set_target(t);
            for _ in 0..(len / 2).max(1) {
                let v = ramp.advance();
                prop_assert!((v - prev).abs() <= bound);
                prev = v;
            }
        }
    }

    /// Equal-gain cross routes cancel anti-phase channels exactly.
    #[test]
    fn mono_routes_cancel_antiphase(x in -1.0f32..=1.0f32, g in 0.0f32..=1.0f32) {
        let routes = [
            ChannelRoute::new(Channel::Left, Channel::Left, g),
            ChannelRoute::new(Channel::Right, Channel::Left, g),
            ChannelRoute::new(Channel::Left, Channel::Right, g),
            ChannelRoute::new(Channel::Right, Channel::Right, g),
        ];
        let m = RoutingMatrix::from_routes(&routes);
        let (l, r) = m.apply(x, -x);
        prop_assert!(l.abs() < 1e-6 && r.abs() < 1e-6);
    }

    /// Compiled linear chains never read and write the same slot in one step,
    /// and never need more than two slots.
    #[test]
    fn linear_schedule_ping_pongs(len in 0usize..40) {
        let mut b = GraphBuilder::new(SR, 32);
        let input = b.add_input();
        let output = b.add_output();
        let mut prev = input;
        for _ in 0..len {
            let id = b.add_node(Box::new(Pass));
            b.connect(prev, id).unwrap();
            prev = id;
        }
        b.connect(prev, output).unwrap();
        let (topology, _graph): (GraphTopology, _) = b.build().unwrap();
        let schedule = topology.compile().unwrap();

        prop_assert!(schedule.buffer_count() <= 2);
        prop_assert_eq!(schedule.step_count(), len + 2);
        for step in schedule.steps() {
            if let ProcessStep::ProcessNode { input_buf, output_buf, .. } = step {
                prop_assert_ne!(input_buf, output_buf);
            }
        }
    }
}
