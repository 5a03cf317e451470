//! Signal graph for the tabfx engine.
//!
//! The graph is split in two halves that share node ids:
//!
//! - [`GraphTopology`]: owned by the control side. Holds the connection map,
//!   validates every patch and compiles a [`CompiledSchedule`]. Never touched
//!   while rendering.
//! - [`SignalGraph`]: owned by the render side. Holds the node arena, a
//!   preallocated [`BufferPool`] and the schedule it is currently running.
//!   [`render()`](SignalGraph::render) pulls blocks through the schedule with
//!   zero allocations.
//!
//! Schedules move from one side to the other as `Arc<CompiledSchedule>`;
//! [`SignalGraph::swap_schedule`] installs one between blocks.
//!
//! # Buffer Efficiency
//!
//! Buffer assignment uses liveness analysis: a slot is live from the step
//! that writes it to the last step that reads it. A linear chain uses two
//! slots (ping-pong). Compile refuses schedules that need more slots than
//! the pool was built with.
//!
//! # Click-free Patching
//!
//! - Every processor step carries a `wet` flag. The slot crossfades between
//!   its input (dry) and its output (wet) with a 5 ms
//!   [`SmoothedParam`](crate::SmoothedParam), and a processor that newly
//!   appears in a schedule fades in from dry.
//! - Splitter → merger edges carry [`ChannelRoute`]s. The merger ramps its
//!   2×2 matrix linearly, so routing changes never jump.
//!
//! # Example
//!
//! ```rust
//! use tabfx_core::graph::{Channel, ChannelRoute, GraphBuilder};
//!
//! let mut b = GraphBuilder::new(48000.0, 128);
//! let input = b.add_input();
//! let split = b.add_splitter();
//! let merge = b.add_merger(10.0);
//! let output = b.add_output();
//! b.connect(input, split).unwrap();
//! b.connect_route(split, merge, ChannelRoute::new(Channel::Left, Channel::Right, 1.0)).unwrap();
//! b.connect_route(split, merge, ChannelRoute::new(Channel::Right, Channel::Left, 1.0)).unwrap();
//! b.connect(merge, output).unwrap();
//! let (_topology, mut graph) = b.build().unwrap();
//!
//! let (mut l, mut r) = ([0.0f32; 4], [0.0f32; 4]);
//! graph.render(&[1.0; 4], &[0.0; 4], &mut l, &mut r);
//! assert_eq!(r, [1.0; 4]);
//! assert_eq!(l, [0.0; 4]);
//! ```

pub mod buffer;
pub mod builder;
pub mod edge;
pub mod node;
pub mod route;
pub mod schedule;
pub mod signal;
pub mod topology;

pub use buffer::{BufferPool, StereoBuffer};
pub use builder::{DEFAULT_BUFFER_CAPACITY, GraphBuilder};
pub use edge::{Channel, ChannelRoute, EdgeId, EdgeKind};
pub use node::{NodeId, NodeRole};
pub use route::{ChannelMerger, RoutingMatrix};
pub use schedule::{CompiledSchedule, ProcessStep};
pub use signal::{FaultRecord, RenderReport, SignalGraph, WET_FADE_SETTLE_SECONDS};
pub use topology::{GraphError, GraphTopology};
