//! Configuration and parameter persistence for tabfx.
//!
//! - **Engine settings**: [`EngineConfig`], loaded from TOML and validated.
//! - **Parameters**: [`ParamId`] names every session control, with its kind
//!   and clamping domain.
//! - **Snapshots**: [`ParameterSnapshot`] holds a whole session's settings
//!   and reads and writes TOML or JSON.
//!
//! # Example
//!
//! ```rust,no_run
//! use tabfx_config::{EngineConfig, ParamId, ParamValue, ParameterSnapshot};
//!
//! let config = EngineConfig::load("tabfx.toml").unwrap();
//! assert!(config.block_size > 0);
//!
//! let mut snapshot = ParameterSnapshot::load("session.json").unwrap();
//! snapshot.set(ParamId::EqGain(0), ParamValue::Float(6.0)).unwrap();
//! snapshot.save("session.toml").unwrap();
//! ```

mod engine_config;
mod error;
mod param_id;
mod snapshot;

/// Validation of configuration values.
pub mod validation;

pub use engine_config::{EngineConfig, PitchConfig};
pub use error::ConfigError;
pub use param_id::{Checked, PARAM_COUNT, ParamError, ParamId, ParamKind, ParamValue};
pub use snapshot::{
    ChorusSettings, CompressorSettings, ConvolverSettings, EffectFlags, ParameterSnapshot,
};
pub use validation::{ValidationError, ValidationResult};

/// Number of EQ bands in a snapshot.
pub use tabfx_effects::EQ_BAND_COUNT;
