//! Capture and output endpoints.
//!
//! A session pulls blocks from a [`CaptureSource`], renders them and pushes
//! the result into an [`OutputSink`]. The source paces the render worker:
//! `read_block` may block until the next block is available.

use std::io;

use thiserror::Error;

/// Result of one capture read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStatus {
    /// `n` frames were written to the front of both channel buffers.
    /// The last block of a stream may be short.
    Frames(usize),
    /// The stream is over. Reported once.
    Ended,
}

/// A capture fault. The session is torn down; there is no retry.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The device or stream went away.
    #[error("capture lost: {0}")]
    Lost(String),
    /// Underlying I/O failure.
    #[error("capture I/O: {0}")]
    Io(#[from] io::Error),
}

/// An output fault.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The consumer stopped accepting blocks.
    #[error("output closed")]
    Closed,
    /// Underlying I/O failure.
    #[error("output I/O: {0}")]
    Io(#[from] io::Error),
}

/// Source of stereo input blocks.
pub trait CaptureSource {
    /// Fills up to `left.len()` frames of each channel.
    fn read_block(&mut self, left: &mut [f32], right: &mut [f32])
    -> Result<CaptureStatus, CaptureError>;
}

/// Destination of rendered stereo blocks.
pub trait OutputSink {
    /// Consumes one block. Both slices have the same length.
    fn write_block(&mut self, left: &[f32], right: &[f32]) -> Result<(), SinkError>;
}

/// Replays two channel buffers block by block, then ends.
///
/// Useful for offline rendering and tests.
#[derive(Debug, Clone)]
pub struct BufferSource {
    left: Vec<f32>,
    right: Vec<f32>,
    pos: usize,
    ended: bool,
}

impl BufferSource {
    /// Creates a source over `left`/`right`. The shorter channel sets the length.
    pub fn new(left: Vec<f32>, right: Vec<f32>) -> Self {
        Self {
            left,
            right,
            pos: 0,
            ended: false,
        }
    }

    /// Frames not yet delivered.
    pub fn remaining(&self) -> usize {
        self.left.len().min(self.right.len()) - self.pos
    }
}

impl CaptureSource for BufferSource {
    fn read_block(
        &mut self,
        left: &mut [f32],
        right: &mut [f32],
    ) -> Result<CaptureStatus, CaptureError> {
        let n = self.remaining().min(left.len()).min(right.len());
        if n == 0 {
            if self.ended {
                return Err(CaptureError::Lost("read after end of stream".into()));
            }
            self.ended = true;
            return Ok(CaptureStatus::Ended);
        }
        left[..n].copy_from_slice(&self.left[self.pos..self.pos + n]);
        right[..n].copy_from_slice(&self.right[self.pos..self.pos + n]);
        self.pos += n;
        Ok(CaptureStatus::Frames(n))
    }
}

/// Collects every rendered block into two channel buffers.
#[derive(Debug, Clone, Default)]
pub struct BufferSink {
    /// Left channel so far.
    pub left: Vec<f32>,
    /// Right channel so far.
    pub right: Vec<f32>,
}

impl OutputSink for BufferSink {
    fn write_block(&mut self, left: &[f32], right: &[f32]) -> Result<(), SinkError> {
        self.left.extend_from_slice(left);
        self.right.extend_from_slice(right);
        Ok(())
    }
}
