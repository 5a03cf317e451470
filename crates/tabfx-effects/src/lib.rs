//! tabfx Effects - graph nodes for the tab audio chain
//!
//! Every effect here implements [`tabfx_core::Node`] and can be dropped into a
//! [`tabfx_core::GraphBuilder`]:
//!
//! - [`Gain`] - per-channel gain, used for pan and output volume
//! - [`BiquadFilter`] - one EQ band (shelf or peaking), or a low/high cut
//! - [`Compressor`] - feed-forward soft-knee compressor with linked detection
//! - [`PitchShifter`] - two-voice delay-modulation pitch shifter
//! - [`DelayLine`] - stereo fractional delay
//! - [`Chorus`] - quadrature LFO chorus with feedback
//! - [`Convolver`] - short FIR room with band-limited wet path
//!
//! ## Example
//!
//! ```rust
//! use tabfx_core::{GraphBuilder, Node};
//! use tabfx_effects::{BiquadFilter, Gain};
//!
//! let mut builder = GraphBuilder::new(48000.0, 128);
//! let input = builder.add_input();
//! let output = builder.add_output();
//! let band = builder.add_node(Box::new(BiquadFilter::eq_band(5, 48000.0)));
//! let volume = builder.add_node(Box::new(Gain::new(48000.0, 0.5)));
//! builder.connect(input, band).unwrap();
//! builder.connect(band, volume).unwrap();
//! builder.connect(volume, output).unwrap();
//! let (_topology, mut graph) = builder.build().unwrap();
//!
//! let block = [0.5f32; 128];
//! let (mut l, mut r) = ([0.0f32; 128], [0.0f32; 128]);
//! graph.render(&block, &block, &mut l, &mut r);
//! assert!((l[127] - 0.25).abs() < 1e-4);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod chorus;
pub mod compressor;
pub mod convolver;
pub mod delay_line;
pub mod eq;
pub mod gain;
pub mod pitch_shifter;

// Re-export main types at crate root
pub use chorus::Chorus;
pub use compressor::Compressor;
pub use convolver::Convolver;
pub use delay_line::DelayLine;
pub use eq::{BiquadFilter, EQ_BAND_COUNT, EQ_BANDS, EQ_PEAK_Q, FilterKind};
pub use gain::{Gain, pan_gains};
pub use pitch_shifter::{PitchShifter, semitones_to_offset};
