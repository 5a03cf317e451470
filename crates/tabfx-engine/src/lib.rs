//! Real-time session engine for tabfx.
//!
//! A [`SessionManager`] owns any number of sessions. Each session renders a
//! fixed effect chain (EQ, compressor, pan, mono/invert routing, volume, and
//! optionally pitch shift, chorus and convolution) through a
//! [`SignalGraph`](tabfx_core::graph::SignalGraph).
//!
//! Control and render run on different threads and never share a lock:
//!
//! - parameters travel through the atomic slots of a [`ParameterBus`] and
//!   are applied at the next block;
//! - topology changes are compiled on the control side by the
//!   [`TopologyManager`] and swapped in between blocks.
//!
//! A session either runs its own render worker, pulling from a
//! [`CaptureSource`] and pushing into an [`OutputSink`], or is driven by the
//! host through a [`SessionRenderer`].
//!
//! # Example
//!
//! ```rust
//! use tabfx_config::{EffectFlags, EngineConfig, ParamId, ParamValue};
//! use tabfx_engine::{BufferSink, BufferSource, SessionEvent, SessionManager};
//!
//! let manager = SessionManager::new(EngineConfig::default()).unwrap();
//! let events = manager.events();
//!
//! let tone: Vec<f32> = (0..4800).map(|i| (i as f32 * 0.05).sin() * 0.5).collect();
//! let source = BufferSource::new(tone.clone(), tone);
//! let id = manager.create_session(source, BufferSink::default()).unwrap();
//!
//! let _ = manager.set_parameter(id, ParamId::EqGain(5), ParamValue::Float(3.0));
//! let _ = manager.reconfigure(id, EffectFlags { chorus: true, ..EffectFlags::default() });
//!
//! assert_eq!(events.recv().unwrap(), SessionEvent::Ended(id));
//! ```

mod bus;
mod error;
mod io;
mod manager;
mod session;
mod topology;

pub use bus::{BusReader, ParameterBus};
pub use error::{EngineError, Result};
pub use io::{BufferSink, BufferSource, CaptureError, CaptureSource, CaptureStatus, OutputSink, SinkError};
pub use manager::SessionManager;
pub use session::{SessionEvent, SessionId, SessionRenderer, SessionState};
pub use topology::{RoutingMode, SessionNodes, TopologyManager, build_session_graph};
