//! Parameter identifiers, value kinds and domains.
//!
//! Every user-facing control of a session is a [`ParamId`]. Each id has a
//! fixed [`ParamKind`]: floats carry a closed domain that out-of-range values
//! are clamped into, booleans are plain flags.
//!
//! ```rust
//! use tabfx_config::{ParamId, ParamValue};
//!
//! let checked = ParamId::Pan.check(ParamValue::Float(3.0)).unwrap();
//! assert_eq!(checked.value, ParamValue::Float(1.0));
//! assert!(checked.clamped);
//!
//! assert!(ParamId::Pan.check(ParamValue::Float(f32::NAN)).is_err());
//! assert!(ParamId::Mono.check(ParamValue::Float(1.0)).is_err());
//! ```

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use tabfx_effects::EQ_BAND_COUNT;

/// Identifier of one session parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamId {
    /// Output gain, linear.
    Volume,
    /// Stereo balance.
    Pan,
    /// Mono downmix.
    Mono,
    /// Channel swap.
    Invert,
    /// Pitch shift offset; 0 is no shift.
    PitchOffset,
    /// Gain of one EQ band in dB.
    EqGain(usize),
    /// Compressor threshold in dB.
    CompressorThreshold,
    /// Compressor attack in seconds.
    CompressorAttack,
    /// Compressor release in seconds.
    CompressorRelease,
    /// Compressor ratio.
    CompressorRatio,
    /// Compressor knee width in dB.
    CompressorKnee,
    /// Compressor makeup gain, linear.
    CompressorMakeup,
    /// Chorus LFO rate in Hz.
    ChorusRate,
    /// Chorus modulation depth.
    ChorusDepth,
    /// Chorus feedback.
    ChorusFeedback,
    /// Chorus base delay in seconds.
    ChorusDelay,
    /// Convolver wet high-pass corner in Hz.
    ConvolverLowCut,
    /// Convolver wet low-pass corner in Hz.
    ConvolverHighCut,
    /// Convolver dry level.
    ConvolverDry,
    /// Convolver wet level.
    ConvolverWet,
    /// Convolver output level.
    ConvolverLevel,
}

/// Number of distinct parameters.
pub const PARAM_COUNT: usize = 20 + EQ_BAND_COUNT;

/// A parameter value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue {
    /// Continuous value.
    Float(f32),
    /// Flag.
    Bool(bool),
}

impl ParamValue {
    /// The float payload, if this is a float.
    pub fn as_float(self) -> Option<f32> {
        match self {
            Self::Float(v) => Some(v),
            Self::Bool(_) => None,
        }
    }

    /// The flag payload, if this is a flag.
    pub fn as_bool(self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(b),
            Self::Float(_) => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Float(v) => write!(f, "{v}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// The kind and domain of a parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamKind {
    /// Float clamped into `[min, max]`.
    Float {
        /// Lower bound.
        min: f32,
        /// Upper bound.
        max: f32,
        /// Default value.
        default: f32,
    },
    /// Boolean flag.
    Bool {
        /// Default value.
        default: bool,
    },
}

/// Why a value was refused.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParamError {
    /// NaN or infinity.
    #[error("value {0} is not finite")]
    NonFinite(f32),
    /// A flag given for a float or the reverse.
    #[error("expected a {expected} value")]
    WrongKind {
        /// Kind the parameter takes.
        expected: &'static str,
    },
    /// EQ band index past the last band.
    #[error("no EQ band {0}")]
    UnknownBand(usize),
    /// A name that matches no parameter.
    #[error("unknown parameter '{0}'")]
    UnknownName(String),
}

/// A value that passed [`ParamId::check`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Checked {
    /// The committed value, inside the domain.
    pub value: ParamValue,
    /// True if the input had to be clamped.
    pub clamped: bool,
}

const fn float(min: f32, max: f32, default: f32) -> ParamKind {
    ParamKind::Float { min, max, default }
}

const NAMED: [(ParamId, &str); 20] = [
    (ParamId::Volume, "volume"),
    (ParamId::Pan, "pan"),
    (ParamId::Mono, "mono"),
    (ParamId::Invert, "invert"),
    (ParamId::PitchOffset, "pitch_offset"),
    (ParamId::CompressorThreshold, "compressor.threshold"),
    (ParamId::CompressorAttack, "compressor.attack"),
    (ParamId::CompressorRelease, "compressor.release"),
    (ParamId::CompressorRatio, "compressor.ratio"),
    (ParamId::CompressorKnee, "compressor.knee"),
    (ParamId::CompressorMakeup, "compressor.makeup_gain"),
    (ParamId::ChorusRate, "chorus.rate"),
    (ParamId::ChorusDepth, "chorus.depth"),
    (ParamId::ChorusFeedback, "chorus.feedback"),
    (ParamId::ChorusDelay, "chorus.delay"),
    (ParamId::ConvolverLowCut, "convolver.low_cut"),
    (ParamId::ConvolverHighCut, "convolver.high_cut"),
    (ParamId::ConvolverDry, "convolver.dry"),
    (ParamId::ConvolverWet, "convolver.wet"),
    (ParamId::ConvolverLevel, "convolver.level"),
];

impl ParamId {
    /// Every parameter, in slot order.
    pub fn all() -> impl Iterator<Item = ParamId> {
        (0..PARAM_COUNT).filter_map(Self::from_slot)
    }

    /// Dense index in `0..PARAM_COUNT`, or `None` for an unknown EQ band.
    pub fn slot(self) -> Option<usize> {
        let slot = match self {
            Self::Volume => 0,
            Self::Pan => 1,
            Self::Mono => 2,
            Self::Invert => 3,
            Self::PitchOffset => 4,
            Self::EqGain(band) if band < EQ_BAND_COUNT => 5 + band,
            Self::EqGain(_) => return None,
            Self::CompressorThreshold => 15,
            Self::CompressorAttack => 16,
            Self::CompressorRelease => 17,
            Self::CompressorRatio => 18,
            Self::CompressorKnee => 19,
            Self::CompressorMakeup => 20,
            Self::ChorusRate => 21,
            Self::ChorusDepth => 22,
            Self::ChorusFeedback => 23,
            Self::ChorusDelay => 24,
            Self::ConvolverLowCut => 25,
            Self::ConvolverHighCut => 26,
            Self::ConvolverDry => 27,
            Self::ConvolverWet => 28,
            Self::ConvolverLevel => 29,
        };
        Some(slot)
    }

    /// Inverse of [`slot`](Self::slot).
    pub fn from_slot(slot: usize) -> Option<Self> {
        let id = match slot {
            0 => Self::Volume,
            1 => Self::Pan,
            2 => Self::Mono,
            3 => Self::Invert,
            4 => Self::PitchOffset,
            s if s < 5 + EQ_BAND_COUNT => Self::EqGain(s - 5),
            15 => Self::CompressorThreshold,
            16 => Self::CompressorAttack,
            17 => Self::CompressorRelease,
            18 => Self::CompressorRatio,
            19 => Self::CompressorKnee,
            20 => Self::CompressorMakeup,
            21 => Self::ChorusRate,
            22 => Self::ChorusDepth,
            23 => Self::ChorusFeedback,
            24 => Self::ChorusDelay,
            25 => Self::ConvolverLowCut,
            26 => Self::ConvolverHighCut,
            27 => Self::ConvolverDry,
            28 => Self::ConvolverWet,
            29 => Self::ConvolverLevel,
            _ => return None,
        };
        Some(id)
    }

    /// Kind, domain and default.
    pub fn kind(self) -> ParamKind {
        match self {
            Self::Volume => float(0.0, f32::INFINITY, 1.0),
            Self::Pan => float(-1.0, 1.0, 0.0),
            Self::Mono | Self::Invert => ParamKind::Bool { default: false },
            Self::PitchOffset => float(-1.0, 1.0, 0.0),
            Self::EqGain(_) => float(-40.0, 40.0, 0.0),
            Self::CompressorThreshold => float(-100.0, 0.0, -20.0),
            Self::CompressorAttack => float(0.0, 1.0, 0.0),
            Self::CompressorRelease => float(0.0, 1.0, 0.25),
            Self::CompressorRatio => float(1.0, 20.0, 1.0),
            Self::CompressorKnee => float(0.0, 40.0, 5.0),
            Self::CompressorMakeup => float(0.0, 16.0, 1.0),
            Self::ChorusRate => float(0.0, 8.0, 0.0),
            Self::ChorusDepth => float(0.0, 1.0, 0.7),
            Self::ChorusFeedback => float(0.0, 0.95, 0.4),
            Self::ChorusDelay => float(0.0002, 0.05, 0.0045),
            Self::ConvolverLowCut => float(20.0, 22050.0, 20.0),
            Self::ConvolverHighCut => float(20.0, 22050.0, 22050.0),
            Self::ConvolverDry | Self::ConvolverWet => float(0.0, 1.0, 1.0),
            Self::ConvolverLevel => float(0.0, 4.0, 1.0),
        }
    }

    /// Default value.
    pub fn default_value(self) -> ParamValue {
        match self.kind() {
            ParamKind::Float { default, .. } => ParamValue::Float(default),
            ParamKind::Bool { default } => ParamValue::Bool(default),
        }
    }

    /// Validates `value` and clamps it into the domain.
    pub fn check(self, value: ParamValue) -> Result<Checked, ParamError> {
        if let Self::EqGain(band) = self
            && band >= EQ_BAND_COUNT
        {
            return Err(ParamError::UnknownBand(band));
        }
        match (self.kind(), value) {
            (ParamKind::Float { min, max, .. }, ParamValue::Float(v)) => {
                if !v.is_finite() {
                    return Err(ParamError::NonFinite(v));
                }
                let clamped = v.clamp(min, max);
                Ok(Checked {
                    value: ParamValue::Float(clamped),
                    clamped: clamped != v,
                })
            }
            (ParamKind::Bool { .. }, ParamValue::Bool(b)) => Ok(Checked {
                value: ParamValue::Bool(b),
                clamped: false,
            }),
            (ParamKind::Float { .. }, ParamValue::Bool(_)) => {
                Err(ParamError::WrongKind { expected: "float" })
            }
            (ParamKind::Bool { .. }, ParamValue::Float(_)) => {
                Err(ParamError::WrongKind { expected: "bool" })
            }
        }
    }
}

impl fmt::Display for ParamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Self::EqGain(band) = self {
            return write!(f, "eq_gains[{band}]");
        }
        let name = NAMED
            .iter()
            .find(|(id, _)| id == self)
            .map_or("?", |(_, name)| name);
        f.write_str(name)
    }
}

impl FromStr for ParamId {
    type Err = ParamError;

    /// Accepts the display names plus `eqN` as shorthand for a band.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some((id, _)) = NAMED.iter().find(|(_, name)| *name == s) {
            return Ok(*id);
        }
        let band = s
            .strip_prefix("eq_gains[")
            .and_then(|rest| rest.strip_suffix(']'))
            .or_else(|| s.strip_prefix("eq"))
            .and_then(|n| n.parse::<usize>().ok());
        match band {
            Some(b) if b < EQ_BAND_COUNT => Ok(Self::EqGain(b)),
            Some(b) => Err(ParamError::UnknownBand(b)),
            None => Err(ParamError::UnknownName(s.to_string())),
        }
    }
}
