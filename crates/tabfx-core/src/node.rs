//! The processing contract shared by every graph node.
//!
//! A [`Node`] is a stereo block processor that owns only its own DSP state
//! (filter history, delay buffers, smoothers). It never sees topology: the
//! graph decides which buffers it reads and writes.
//!
//! ## Design Decisions
//!
//! - **Stereo frames**: tab audio is always two channels, so the per-sample
//!   hook takes and returns an `(l, r)` pair. Linked processors (the
//!   compressor's detector, the pitch shifter's shared ramps) need both
//!   channels at once.
//! - **Fallible blocks**: `process_block` can report a [`NodeFault`]. The graph
//!   treats a fault exactly like non-finite output: the block is silenced
//!   and the node reset.
//! - **Indexed parameters**: `set_param(index, value)` keeps the trait
//!   object-safe and allocation-free. Each node documents its own indices.

/// A processing failure reported by a node for one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeFault {
    /// Static description of what went wrong.
    pub reason: &'static str,
}

impl NodeFault {
    /// Creates a fault with the given description.
    pub const fn new(reason: &'static str) -> Self {
        Self { reason }
    }
}

impl core::fmt::Display for NodeFault {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "node fault: {}", self.reason)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for NodeFault {}

/// Core trait for all graph nodes.
///
/// # Example
///
/// ```rust
/// use tabfx_core::Node;
///
/// struct Swap;
///
/// impl Node for Swap {
///     fn name(&self) -> &'static str {
///         "swap"
///     }
///
///     fn process_frame(&mut self, left: f32, right: f32) -> (f32, f32) {
///         (right, left)
///     }
///
///     fn reset(&mut self) {}
/// }
///
/// let mut node = Swap;
/// let (mut l, mut r) = ([0.0; 2], [0.0; 2]);
/// node.process_block(&[1.0, 2.0], &[3.0, 4.0], &mut l, &mut r).unwrap();
/// assert_eq!(l, [3.0, 4.0]);
/// ```
pub trait Node {
    /// Short, stable identifier used in logs.
    fn name(&self) -> &'static str;

    /// Processes one stereo frame.
    fn process_frame(&mut self, left: f32, right: f32) -> (f32, f32);

    /// Processes a block. Slices all have the same length.
    ///
    /// The default implementation calls [`process_frame`](Self::process_frame)
    /// per sample and never faults.
    fn process_block(
        &mut self,
        left_in: &[f32],
        right_in: &[f32],
        left_out: &mut [f32],
        right_out: &mut [f32],
    ) -> Result<(), NodeFault> {
        debug_assert_eq!(left_in.len(), right_in.len());
        debug_assert!(left_out.len() >= left_in.len());
        debug_assert!(right_out.len() >= left_in.len());
        for i in 0..left_in.len() {
            let (l, r) = self.process_frame(left_in[i], right_in[i]);
            left_out[i] = l;
            right_out[i] = r;
        }
        Ok(())
    }

    /// Clears internal state (histories, delay buffers) without touching
    /// parameter values.
    fn reset(&mut self);

    /// Number of parameters addressable through [`set_param`](Self::set_param).
    fn param_count(&self) -> usize {
        0
    }

    /// Current target value of parameter `index`, or `0.0` if out of range.
    fn get_param(&self, _index: usize) -> f32 {
        0.0
    }

    /// Sets parameter `index`. Out-of-range indices are ignored.
    fn set_param(&mut self, _index: usize, _value: f32) {}

    /// Processing latency in samples.
    fn latency_samples(&self) -> usize {
        0
    }
}
