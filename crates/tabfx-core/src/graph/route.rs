//! Channel routing between a splitter and its merger.
//!
//! A compiled schedule reduces all route edges into one [`RoutingMatrix`].
//! The [`ChannelMerger`] never jumps to a new matrix: each of its four gains
//! is a [`ParamRamp`], so a patch that flips stereo to mono (or swaps
//! channels) moves every output sample by at most one ramp step.

use crate::param::ParamRamp;

use super::edge::ChannelRoute;

/// 2×2 gain matrix, indexed `gains[to][from]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RoutingMatrix {
    /// Gains by destination then source channel.
    pub gains: [[f32; 2]; 2],
}

impl RoutingMatrix {
    /// All routes silent.
    pub const SILENT: Self = Self {
        gains: [[0.0, 0.0], [0.0, 0.0]],
    };

    /// Left to left, right to right, unity gain.
    pub const IDENTITY: Self = Self {
        gains: [[1.0, 0.0], [0.0, 1.0]],
    };

    /// Adds a route's gain into the matrix.
    #[inline]
    pub fn add(&mut self, route: &ChannelRoute) {
        self.gains[route.to.index()][route.from.index()] += route.gain;
    }

    /// Matrix formed by summing `routes`.
    pub fn from_routes<'a>(routes: impl IntoIterator<Item = &'a ChannelRoute>) -> Self {
        let mut m = Self::SILENT;
        for r in routes {
            m.add(r);
        }
        m
    }

    /// Routes one frame.
    #[inline]
    pub fn apply(&self, left: f32, right: f32) -> (f32, f32) {
        let g = &self.gains;
        (
            g[0][0] * left + g[0][1] * right,
            g[1][0] * left + g[1][1] * right,
        )
    }
}

impl Default for RoutingMatrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Render-side state of a merger node: the ramped routing matrix.
#[derive(Debug, Clone)]
pub struct ChannelMerger {
    // Row-major: [LL, LR, RL, RR] as gains[to][from].
    ramps: [ParamRamp; 4],
    primed: bool,
}

impl ChannelMerger {
    /// Creates a merger whose matrix changes ramp over `ramp_ms`.
    pub fn new(sample_rate: f32, ramp_ms: f32) -> Self {
        let ramp = |v: f32| ParamRamp::with_time(v, sample_rate, ramp_ms);
        Self {
            ramps: [ramp(1.0), ramp(0.0), ramp(0.0), ramp(1.0)],
            primed: false,
        }
    }

    /// Targets `matrix`. The first matrix a merger sees is applied immediately.
    pub fn set_matrix(&mut self, matrix: &RoutingMatrix) {
        let flat = [
            matrix.gains[0][0],
            matrix.gains[0][1],
            matrix.gains[1][0],
            matrix.gains[1][1],
        ];
        for (ramp, target) in self.ramps.iter_mut().zip(flat) {
            if self.primed {
                ramp.set_target(target);
            } else {
                ramp.set_immediate(target);
            }
        }
        self.primed = true;
    }

    /// Matrix currently applied (mid-ramp values included).
    pub fn current(&self) -> RoutingMatrix {
        RoutingMatrix {
            gains: [
                [self.ramps[0].get(), self.ramps[1].get()],
                [self.ramps[2].get(), self.ramps[3].get()],
            ],
        }
    }

    /// True when no ramp is in progress.
    pub fn is_settled(&self) -> bool {
        self.ramps.iter().all(ParamRamp::is_settled)
    }

    /// Routes a block through the (possibly ramping) matrix.
    pub fn route(
        &mut self,
        left_in: &[f32],
        right_in: &[f32],
        left_out: &mut [f32],
        right_out: &mut [f32],
    ) {
        if self.is_settled() {
            let m = self.current();
            for i in 0..left_in.len() {
                let (l, r) = m.apply(left_in[i], right_in[i]);
                left_out[i] = l;
                right_out[i] = r;
            }
            return;
        }

        for i in 0..left_in.len() {
            let ll = self.ramps[0].advance();
            let lr = self.ramps[1].advance();
            let rl = self.ramps[2].advance();
            let rr = self.ramps[3].advance();
            let (l, r) = (left_in[i], right_in[i]);
            left_out[i] = ll * l + lr * r;
            right_out[i] = rl * l + rr * r;
        }
    }

    /// Finishes any ramp in progress.
    pub fn reset(&mut self) {
        for ramp in &mut self.ramps {
            ramp.snap_to_target();
        }
    }
}
