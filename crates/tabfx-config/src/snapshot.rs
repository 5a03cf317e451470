//! Session parameter snapshot and its file formats.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tabfx_effects::EQ_BAND_COUNT;

use crate::error::ConfigError;
use crate::param_id::{Checked, ParamError, ParamId, ParamValue};

/// Compressor settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressorSettings {
    /// Threshold in dB.
    pub threshold: f32,
    /// Attack in seconds.
    pub attack: f32,
    /// Release in seconds.
    pub release: f32,
    /// Ratio; 1 is transparent.
    pub ratio: f32,
    /// Knee width in dB.
    pub knee: f32,
    /// Linear makeup gain.
    pub makeup_gain: f32,
}

impl Default for CompressorSettings {
    fn default() -> Self {
        Self {
            threshold: -20.0,
            attack: 0.0,
            release: 0.25,
            ratio: 1.0,
            knee: 5.0,
            makeup_gain: 1.0,
        }
    }
}

/// Chorus settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChorusSettings {
    /// LFO rate in Hz.
    pub rate: f32,
    /// Modulation depth.
    pub depth: f32,
    /// Feedback amount.
    pub feedback: f32,
    /// Base delay in seconds.
    pub delay: f32,
}

impl Default for ChorusSettings {
    fn default() -> Self {
        Self {
            rate: 0.0,
            depth: 0.7,
            feedback: 0.4,
            delay: 0.0045,
        }
    }
}

/// Convolver settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvolverSettings {
    /// Wet high-pass corner in Hz.
    pub low_cut: f32,
    /// Wet low-pass corner in Hz.
    pub high_cut: f32,
    /// Dry level.
    pub dry: f32,
    /// Wet level.
    pub wet: f32,
    /// Output level.
    pub level: f32,
}

impl Default for ConvolverSettings {
    fn default() -> Self {
        Self {
            low_cut: 20.0,
            high_cut: 22050.0,
            dry: 1.0,
            wet: 1.0,
            level: 1.0,
        }
    }
}

/// Which optional effects are spliced into the chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectFlags {
    /// Pitch shifter.
    pub pitch: bool,
    /// Chorus.
    pub chorus: bool,
    /// Convolution room.
    pub convolver: bool,
}

/// Every user-facing setting of one session.
///
/// # TOML Format
///
/// ```toml
/// volume = 1.0
/// pan = 0.0
/// mono = false
/// invert = false
/// pitch_offset = 0.0
/// eq_gains = [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]
///
/// [compressor]
/// threshold = -20.0
/// ratio = 1.0
///
/// [effects]
/// pitch = true
/// ```
///
/// Missing fields and sections take their defaults. Loaded values are
/// clamped into their domains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterSnapshot {
    /// Output gain, linear.
    pub volume: f32,
    /// Stereo balance in `[-1, 1]`.
    pub pan: f32,
    /// Mono downmix.
    pub mono: bool,
    /// Channel swap.
    pub invert: bool,
    /// Pitch offset in `[-1, 1]`.
    pub pitch_offset: f32,
    /// EQ band gains in dB, low to high.
    pub eq_gains: [f32; EQ_BAND_COUNT],
    /// Compressor section.
    pub compressor: CompressorSettings,
    /// Optional effect selection.
    pub effects: EffectFlags,
    /// Chorus section.
    pub chorus: ChorusSettings,
    /// Convolver section.
    pub convolver: ConvolverSettings,
}

impl Default for ParameterSnapshot {
    fn default() -> Self {
        Self {
            volume: 1.0,
            pan: 0.0,
            mono: false,
            invert: false,
            pitch_offset: 0.0,
            eq_gains: [0.0; EQ_BAND_COUNT],
            compressor: CompressorSettings::default(),
            effects: EffectFlags::default(),
            chorus: ChorusSettings::default(),
            convolver: ConvolverSettings::default(),
        }
    }
}

impl ParameterSnapshot {
    /// Reads one parameter. `None` for an unknown EQ band.
    pub fn get(&self, id: ParamId) -> Option<ParamValue> {
        use ParamValue::{Bool, Float};
        let value = match id {
            ParamId::Volume => Float(self.volume),
            ParamId::Pan => Float(self.pan),
            ParamId::Mono => Bool(self.mono),
            ParamId::Invert => Bool(self.invert),
            ParamId::PitchOffset => Float(self.pitch_offset),
            ParamId::EqGain(band) => Float(*self.eq_gains.get(band)?),
            ParamId::CompressorThreshold => Float(self.compressor.threshold),
            ParamId::CompressorAttack => Float(self.compressor.attack),
            ParamId::CompressorRelease => Float(self.compressor.release),
            ParamId::CompressorRatio => Float(self.compressor.ratio),
            ParamId::CompressorKnee => Float(self.compressor.knee),
            ParamId::CompressorMakeup => Float(self.compressor.makeup_gain),
            ParamId::ChorusRate => Float(self.chorus.rate),
            ParamId::ChorusDepth => Float(self.chorus.depth),
            ParamId::ChorusFeedback => Float(self.chorus.feedback),
            ParamId::ChorusDelay => Float(self.chorus.delay),
            ParamId::ConvolverLowCut => Float(self.convolver.low_cut),
            ParamId::ConvolverHighCut => Float(self.convolver.high_cut),
            ParamId::ConvolverDry => Float(self.convolver.dry),
            ParamId::ConvolverWet => Float(self.convolver.wet),
            ParamId::ConvolverLevel => Float(self.convolver.level),
        };
        Some(value)
    }

    /// Validates, clamps and stores one parameter.
    pub fn set(&mut self, id: ParamId, value: ParamValue) -> Result<Checked, ParamError> {
        let checked = id.check(value)?;
        self.store(id, checked.value);
        Ok(checked)
    }

    // Caller has checked kind and band.
    fn store(&mut self, id: ParamId, value: ParamValue) {
        match (id, value) {
            (ParamId::Mono, ParamValue::Bool(b)) => self.mono = b,
            (ParamId::Invert, ParamValue::Bool(b)) => self.invert = b,
            (_, ParamValue::Float(v)) => {
                let field = match id {
                    ParamId::Volume => &mut self.volume,
                    ParamId::Pan => &mut self.pan,
                    ParamId::PitchOffset => &mut self.pitch_offset,
                    ParamId::EqGain(band) => match self.eq_gains.get_mut(band) {
                        Some(gain) => gain,
                        None => return,
                    },
                    ParamId::CompressorThreshold => &mut self.compressor.threshold,
                    ParamId::CompressorAttack => &mut self.compressor.attack,
                    ParamId::CompressorRelease => &mut self.compressor.release,
                    ParamId::CompressorRatio => &mut self.compressor.ratio,
                    ParamId::CompressorKnee => &mut self.compressor.knee,
                    ParamId::CompressorMakeup => &mut self.compressor.makeup_gain,
                    ParamId::ChorusRate => &mut self.chorus.rate,
                    ParamId::ChorusDepth => &mut self.chorus.depth,
                    ParamId::ChorusFeedback => &mut self.chorus.feedback,
                    ParamId::ChorusDelay => &mut self.chorus.delay,
                    ParamId::ConvolverLowCut => &mut self.convolver.low_cut,
                    ParamId::ConvolverHighCut => &mut self.convolver.high_cut,
                    ParamId::ConvolverDry => &mut self.convolver.dry,
                    ParamId::ConvolverWet => &mut self.convolver.wet,
                    ParamId::ConvolverLevel => &mut self.convolver.level,
                    ParamId::Mono | ParamId::Invert => return,
                };
                *field = v;
            }
            _ => {}
        }
    }

    /// Clamps every field into its domain. Non-finite values become defaults.
    ///
    /// Returns the number of fields that changed.
    pub fn clamp_all(&mut self) -> usize {
        let mut changed = 0;
        for id in ParamId::all() {
            let Some(current) = self.get(id) else {
                continue;
            };
            let fixed = match id.check(current) {
                Ok(checked) if !checked.clamped => continue,
                Ok(checked) => checked.value,
                Err(_) => id.default_value(),
            };
            self.store(id, fixed);
            changed += 1;
        }
        changed
    }

    /// Parses TOML and clamps the result.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let mut snapshot: Self = toml::from_str(toml_str)?;
        snapshot.clamp_all();
        Ok(snapshot)
    }

    /// Serializes to pretty TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Parses JSON and clamps the result.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let mut snapshot: Self = serde_json::from_str(json)?;
        snapshot.clamp_all();
        Ok(snapshot)
    }

    /// Serializes to pretty JSON.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Loads a snapshot. Files ending in `.json` are JSON, anything else TOML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        if is_json(path) {
            Self::from_json(&content)
        } else {
            Self::from_toml(&content)
        }
    }

    /// Saves a snapshot, choosing the format by extension like [`load`](Self::load).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = if is_json(path) {
            self.to_json()?
        } else {
            self.to_toml()?
        };
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_param_table() {
        let snap = ParameterSnapshot::default();
        for id in ParamId::all() {
            assert_eq!(snap.get(id), Some(id.default_value()), "{id}");
        }
    }

    #[test]
    fn set_clamps_and_stores() {
        let mut snap = ParameterSnapshot::default();
        let checked = snap.set(ParamId::EqGain(9), ParamValue::Float(55.0)).unwrap();
        assert!(checked.clamped);
        assert_eq!(snap.eq_gains[9], 40.0);

        snap.set(ParamId::Mono, ParamValue::Bool(true)).unwrap();
        assert!(snap.mono);

        assert!(snap.set(ParamId::Pan, ParamValue::Float(f32::NAN)).is_err());
        assert_eq!(snap.pan, 0.0);
        assert_eq!(snap.get(ParamId::EqGain(10)), None);
    }

    #[test]
    fn clamp_all_repairs_fields() {
        let mut snap = ParameterSnapshot {
            volume: -3.0,
            pan: f32::NAN,
            ..ParameterSnapshot::default()
        };
        snap.compressor.ratio = 0.5;
        assert_eq!(snap.clamp_all(), 3);
        assert_eq!(snap.volume, 0.0);
        assert_eq!(snap.pan, 0.0);
        assert_eq!(snap.compressor.ratio, 1.0);
        assert_eq!(snap.clamp_all(), 0);
    }

    #[test]
    fn partial_toml_takes_defaults() {
        let snap = ParameterSnapshot::from_toml(
            r#"
            volume = 0.5
            [compressor]
            ratio = 40.0
            "#,
        )
        .unwrap();
        assert_eq!(snap.volume, 0.5);
        assert_eq!(snap.compressor.ratio, 20.0);
        assert_eq!(snap.compressor.threshold, -20.0);
        assert_eq!(snap.eq_gains, [0.0; EQ_BAND_COUNT]);
        assert!(!snap.effects.pitch);
    }

    #[test]
    fn json_round_trip() {
        let mut snap = ParameterSnapshot::default();
        snap.invert = true;
        snap.effects.chorus = true;
        snap.chorus.rate = 2.5;
        let json = snap.to_json().unwrap();
        assert_eq!(ParameterSnapshot::from_json(&json).unwrap(), snap);
        assert_eq!(ParameterSnapshot::from_json("{}").unwrap(), ParameterSnapshot::default());
    }

    #[test]
    fn toml_round_trip() {
        let mut snap = ParameterSnapshot::default();
        snap.eq_gains[3] = -6.5;
        snap.pitch_offset = -0.25;
        let text = snap.to_toml().unwrap();
        assert_eq!(ParameterSnapshot::from_toml(&text).unwrap(), snap);
    }
}
