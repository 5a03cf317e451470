//! Engine-wide settings.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tabfx_effects::pitch_shifter::{BUFFER_TIME, FADE_TIME};

use crate::error::ConfigError;
use crate::validation::{ValidationResult, Validator};

/// Pitch shifter timing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PitchConfig {
    /// Voice period in seconds.
    pub buffer_time: f32,
    /// Crossfade edge length in seconds.
    pub fade_time: f32,
}

impl Default for PitchConfig {
    fn default() -> Self {
        Self {
            buffer_time: BUFFER_TIME,
            fade_time: FADE_TIME,
        }
    }
}

/// Settings shared by every session of an engine.
///
/// # TOML Format
///
/// ```toml
/// sample_rate = 48000
/// block_size = 128
/// max_sessions = 8
/// downmix_gain = 0.6
/// routing_ramp_ms = 10.0
///
/// [pitch]
/// buffer_time = 0.1
/// fade_time = 0.05
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Sample rate sessions are built for.
    pub sample_rate: u32,
    /// Frames per render block.
    pub block_size: usize,
    /// Maximum number of concurrently active sessions.
    pub max_sessions: usize,
    /// Gain applied to each channel of the mono sum.
    pub downmix_gain: f32,
    /// Length of the routing matrix ramp on mono/invert changes.
    pub routing_ramp_ms: f32,
    /// Pitch shifter timing.
    pub pitch: PitchConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            block_size: 128,
            max_sessions: 8,
            downmix_gain: 0.6,
            routing_ramp_ms: 10.0,
            pitch: PitchConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Checks every field and the relation between the pitch times.
    pub fn validate(&self) -> ValidationResult<()> {
        Validator::default()
            .range("sample_rate", f64::from(self.sample_rate), 8000.0, 384_000.0)
            .range("block_size", self.block_size as f64, 1.0, 8192.0)
            .range("max_sessions", self.max_sessions as f64, 1.0, 1024.0)
            .range("downmix_gain", f64::from(self.downmix_gain), 0.0, 1.0)
            .range("routing_ramp_ms", f64::from(self.routing_ramp_ms), 0.0, 1000.0)
            .range("pitch.buffer_time", f64::from(self.pitch.buffer_time), 0.01, 1.0)
            .range("pitch.fade_time", f64::from(self.pitch.fade_time), 0.001, 0.5)
            .require(
                self.pitch.fade_time <= self.pitch.buffer_time / 2.0,
                "pitch.fade_time must not exceed half of pitch.buffer_time",
            )
            .finish()
    }

    /// Parses and validates TOML.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Serializes to pretty TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Loads and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        Self::from_toml(&content)
    }

    /// Writes the configuration as TOML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))
    }

    /// Sample rate as `f32`, the type the DSP runs at.
    pub fn sample_rate_hz(&self) -> f32 {
        self.sample_rate as f32
    }
}
