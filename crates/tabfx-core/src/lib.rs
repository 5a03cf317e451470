//! tabfx Core - buffers, smoothing, filters and the signal graph
//!
//! This crate holds everything the tabfx render path needs that is not a
//! specific effect: the [`Node`] processing contract, parameter smoothers,
//! biquad and delay primitives, and the [`graph`] module that schedules
//! nodes and patches them live without clicks.
//!
//! # Core Abstractions
//!
//! ## Node Contract
//!
//! - [`Node`] - Object-safe stereo block processor
//! - [`NodeFault`] - Per-block failure report, contained by the graph
//!
//! ## Parameter Smoothing
//!
//! - [`ParamRamp`] - Linear ramp with a fixed length (gains, routing)
//! - [`SmoothedParam`] - One-pole exponential approach (filter gains, fades)
//!
//! ## Filters and Delays
//!
//! - [`Biquad`] / [`BiquadCoefficients`] - RBJ cookbook second-order sections
//! - [`InterpolatedDelay`] - Circular buffer with fractional reads
//!
//! ## Graph
//!
//! - [`GraphBuilder`] - Builds a [`GraphTopology`] / [`SignalGraph`] pair
//! - [`CompiledSchedule`] - Immutable render program shared through `Arc`
//!
//! # no_std Support
//!
//! The crate is `no_std` compatible (with `alloc`). Disable the default
//! `std` feature:
//!
//! ```toml
//! [dependencies]
//! tabfx-core = { version = "0.1", default-features = false }
//! ```
//!
//! Enable the `tracing` feature to log graph compilation at debug level.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod biquad;
pub mod delay;
pub mod graph;
pub mod math;
pub mod node;
pub mod param;

pub use biquad::{Biquad, BiquadCoefficients};
pub use delay::InterpolatedDelay;
pub use graph::{
    BufferPool, Channel, ChannelRoute, CompiledSchedule, EdgeId, GraphBuilder, GraphError,
    GraphTopology, NodeId, NodeRole, ProcessStep, RenderReport, SignalGraph, StereoBuffer,
};
pub use math::{db_to_linear, flush_denormal, linear_to_db, one_pole_coefficient, wet_dry_mix};
pub use node::{Node, NodeFault};
pub use param::{ParamRamp, SmoothedParam};
