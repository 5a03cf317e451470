//! Equalizer band node.
//!
//! A [`BiquadFilter`] is one stereo second-order section. Ten of them in
//! series form the tab equalizer:
//!
//! | Band | Type | Frequency | Q |
//! |------|------|-----------|---|
//! | 0 | low shelf | 32 Hz | shelf slope 1 |
//! | 1–8 | peaking | 64 Hz – 8 kHz | 5 |
//! | 9 | high shelf | 16 kHz | shelf slope 1 |
//!
//! Gain moves are smoothed over 10 ms. While the gain is moving the
//! coefficients are recomputed every [`COEFF_UPDATE_INTERVAL`] samples;
//! filter history is never cleared, so sweeping a band does not click.
//!
//! The same node with [`FilterKind::Lowpass`] or [`FilterKind::Highpass`]
//! provides the convolver's cut filters.

use core::f32::consts::FRAC_1_SQRT_2;

use tabfx_core::{Biquad, BiquadCoefficients, Node, SmoothedParam};

/// Number of equalizer bands.
pub const EQ_BAND_COUNT: usize = 10;

/// Centre frequencies of the equalizer bands, low to high.
pub const EQ_BANDS: [f32; EQ_BAND_COUNT] = [
    32.0, 64.0, 125.0, 250.0, 500.0, 1000.0, 2000.0, 4000.0, 8000.0, 16000.0,
];

/// Q of the peaking bands.
pub const EQ_PEAK_Q: f32 = 5.0;

/// Samples between coefficient updates while the gain is smoothing.
pub const COEFF_UPDATE_INTERVAL: u32 = 16;

/// Gain range accepted by the gain parameter, in dB.
pub const GAIN_RANGE_DB: (f32, f32) = (-40.0, 40.0);

/// Filter response.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterKind {
    /// Boost or cut below the corner.
    LowShelf,
    /// Boost or cut above the corner.
    HighShelf,
    /// Bell around the centre frequency.
    Peaking {
        /// Bandwidth control.
        q: f32,
    },
    /// Second-order low-pass. Gain is ignored.
    Lowpass {
        /// Resonance.
        q: f32,
    },
    /// Second-order high-pass. Gain is ignored.
    Highpass {
        /// Resonance.
        q: f32,
    },
}

impl FilterKind {
    fn uses_gain(self) -> bool {
        matches!(self, Self::LowShelf | Self::HighShelf | Self::Peaking { .. })
    }

    /// Cookbook coefficients for this response.
    ///
    /// Gain-bearing responses at exactly 0 dB are the identity section.
    pub fn coefficients(self, frequency: f32, gain_db: f32, sample_rate: f32) -> BiquadCoefficients {
        match self {
            Self::LowShelf | Self::HighShelf | Self::Peaking { .. } if gain_db == 0.0 => {
                BiquadCoefficients::IDENTITY
            }
            Self::LowShelf => BiquadCoefficients::low_shelf(frequency, gain_db, sample_rate),
            Self::HighShelf => BiquadCoefficients::high_shelf(frequency, gain_db, sample_rate),
            Self::Peaking { q } => BiquadCoefficients::peaking(frequency, q, gain_db, sample_rate),
            Self::Lowpass { q } => BiquadCoefficients::lowpass(frequency, q, sample_rate),
            Self::Highpass { q } => BiquadCoefficients::highpass(frequency, q, sample_rate),
        }
    }
}

/// Stereo biquad node with a smoothed gain.
///
/// ## Parameter Indices
///
/// | Index | Name | Range | Default |
/// |-------|------|-------|---------|
/// | 0 | Gain | -40.0–40.0 dB | 0.0 |
/// | 1 | Frequency | 1.0 Hz – 0.499·fs | per band |
///
/// # Example
///
/// ```rust
/// use tabfx_core::Node;
/// use tabfx_effects::BiquadFilter;
///
/// let mut band = BiquadFilter::eq_band(0, 48000.0);
/// band.set_gain_db(12.0);
/// let (l, r) = band.process_frame(0.5, 0.5);
/// assert!(l.is_finite() && r.is_finite());
/// ```
#[derive(Debug, Clone)]
pub struct BiquadFilter {
    kind: FilterKind,
    frequency: f32,
    gain_db: SmoothedParam,
    left: Biquad,
    right: Biquad,
    countdown: u32,
    sample_rate: f32,
}

impl BiquadFilter {
    /// Creates a filter at 0 dB gain.
    pub fn new(kind: FilterKind, frequency: f32, sample_rate: f32) -> Self {
        let coeffs = kind.coefficients(frequency, 0.0, sample_rate);
        Self {
            kind,
            frequency,
            gain_db: SmoothedParam::standard(0.0, sample_rate),
            left: Biquad::with_coefficients(coeffs),
            right: Biquad::with_coefficients(coeffs),
            countdown: 0,
            sample_rate,
        }
    }

    /// Equalizer band `band` (0..10). Indices past the last band are clamped.
    pub fn eq_band(band: usize, sample_rate: f32) -> Self {
        let band = band.min(EQ_BAND_COUNT - 1);
        let kind = match band {
            0 => FilterKind::LowShelf,
            b if b == EQ_BAND_COUNT - 1 => FilterKind::HighShelf,
            _ => FilterKind::Peaking { q: EQ_PEAK_Q },
        };
        Self::new(kind, EQ_BANDS[band], sample_rate)
    }

    /// Butterworth low-pass at `frequency`.
    pub fn lowpass(frequency: f32, sample_rate: f32) -> Self {
        Self::new(FilterKind::Lowpass { q: FRAC_1_SQRT_2 }, frequency, sample_rate)
    }

    /// Butterworth high-pass at `frequency`.
    pub fn highpass(frequency: f32, sample_rate: f32) -> Self {
        Self::new(FilterKind::Highpass { q: FRAC_1_SQRT_2 }, frequency, sample_rate)
    }

    /// Response type.
    pub fn kind(&self) -> FilterKind {
        self.kind
    }

    /// Sets the gain target in dB, clamped to [`GAIN_RANGE_DB`].
    pub fn set_gain_db(&mut self, gain_db: f32) {
        if !gain_db.is_finite() {
            return;
        }
        self.gain_db
            .set_target(gain_db.clamp(GAIN_RANGE_DB.0, GAIN_RANGE_DB.1));
        self.countdown = 0;
    }

    /// Gain target in dB.
    pub fn gain_db(&self) -> f32 {
        self.gain_db.target()
    }

    /// Moves the corner or centre frequency. Takes effect immediately.
    pub fn set_frequency(&mut self, frequency: f32) {
        if !frequency.is_finite() {
            return;
        }
        self.frequency = frequency.clamp(1.0, self.sample_rate * 0.499);
        self.update_coefficients(self.gain_db.get());
    }

    /// Corner or centre frequency in Hz.
    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    /// Coefficients currently applied.
    pub fn coefficients(&self) -> BiquadCoefficients {
        *self.left.coefficients()
    }

    fn update_coefficients(&mut self, gain_db: f32) {
        let coeffs = self.kind.coefficients(self.frequency, gain_db, self.sample_rate);
        self.left.set_coefficients(coeffs);
        self.right.set_coefficients(coeffs);
    }
}

impl Node for BiquadFilter {
    fn name(&self) -> &'static str {
        match self.kind {
            FilterKind::LowShelf => "low_shelf",
            FilterKind::HighShelf => "high_shelf",
            FilterKind::Peaking { .. } => "peaking",
            FilterKind::Lowpass { .. } => "lowpass",
            FilterKind::Highpass { .. } => "highpass",
        }
    }

    #[inline]
    fn process_frame(&mut self, left: f32, right: f32) -> (f32, f32) {
        if self.kind.uses_gain() && !self.gain_db.is_settled() {
            let mut gain = self.gain_db.advance();
            let settled = self.gain_db.is_settled();
            if settled {
                // Land exactly on the target so 0 dB means identity again.
                self.gain_db.snap_to_target();
                gain = self.gain_db.target();
            }
            if self.countdown == 0 || settled {
                self.update_coefficients(gain);
                self.countdown = COEFF_UPDATE_INTERVAL;
            }
            self.countdown -= 1;
        }
        (self.left.process(left), self.right.process(right))
    }

    fn reset(&mut self) {
        self.left.clear();
        self.right.clear();
        self.gain_db.snap_to_target();
        self.update_coefficients(self.gain_db.get());
        self.countdown = 0;
    }

    fn param_count(&self) -> usize {
        2
    }

    fn get_param(&self, index: usize) -> f32 {
        match index {
            0 => self.gain_db(),
            1 => self.frequency,
            _ => 0.0,
        }
    }

    fn set_param(&mut self, index: usize, value: f32) {
        match index {
            0 => self.set_gain_db(value),
            1 => self.set_frequency(value),
            _ => {}
        }
    }
}
