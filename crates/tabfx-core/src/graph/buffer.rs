//! Preallocated stereo buffers for schedule execution.
//!
//! The [`BufferPool`] is sized once when the signal graph is built. Compiled
//! schedules refer to its slots by index; liveness analysis keeps the number
//! of simultaneously live slots small (two for a linear chain), and compile
//! rejects any schedule that would need more slots than the pool has.

#[cfg(not(feature = "std"))]
use alloc::vec;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

/// A stereo block of audio.
#[derive(Debug, Clone)]
pub struct StereoBuffer {
    /// Left channel samples.
    pub left: Vec<f32>,
    /// Right channel samples.
    pub right: Vec<f32>,
}

impl StereoBuffer {
    /// Creates a zeroed buffer of `block_size` frames.
    pub fn new(block_size: usize) -> Self {
        Self {
            left: vec![0.0; block_size],
            right: vec![0.0; block_size],
        }
    }

    /// Fills both channels with zeros.
    pub fn clear(&mut self) {
        self.left.fill(0.0);
        self.right.fill(0.0);
    }

    /// Zeroes the first `len` frames.
    #[inline]
    pub fn clear_frames(&mut self, len: usize) {
        self.left[..len].fill(0.0);
        self.right[..len].fill(0.0);
    }

    /// Frames per channel.
    pub fn len(&self) -> usize {
        self.left.len()
    }

    /// True if the buffer holds no frames.
    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    /// Copies the first `len` frames of `other`.
    #[inline]
    pub fn copy_from(&mut self, other: &StereoBuffer, len: usize) {
        self.left[..len].copy_from_slice(&other.left[..len]);
        self.right[..len].copy_from_slice(&other.right[..len]);
    }

    /// True if the first `len` frames are all finite.
    #[inline]
    pub fn is_finite(&self, len: usize) -> bool {
        self.left[..len].iter().all(|s| s.is_finite())
            && self.right[..len].iter().all(|s| s.is_finite())
    }
}

/// Fixed set of reusable stereo buffers.
#[derive(Debug)]
pub struct BufferPool {
    buffers: Vec<StereoBuffer>,
    block_size: usize,
}

impl BufferPool {
    /// Creates `count` zeroed buffers of `block_size` frames each.
    pub fn new(count: usize, block_size: usize) -> Self {
        let buffers = (0..count).map(|_| StereoBuffer::new(block_size)).collect();
        Self {
            buffers,
            block_size,
        }
    }

    /// Number of slots.
    pub fn count(&self) -> usize {
        self.buffers.len()
    }

    /// Frames per buffer.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Buffer at `idx`.
    ///
    /// # Panics
    ///
    /// Panics if `idx >= count()`.
    #[inline]
    pub fn get(&self, idx: usize) -> &StereoBuffer {
        &self.buffers[idx]
    }

    /// Mutable buffer at `idx`.
    ///
    /// # Panics
    ///
    /// Panics if `idx >= count()`.
    #[inline]
    pub fn get_mut(&mut self, idx: usize) -> &mut StereoBuffer {
        &mut self.buffers[idx]
    }

    /// Borrows `src` shared and `dst` mutably at the same time.
    ///
    /// # Panics
    ///
    /// Panics if `src == dst` or either index is out of range.
    #[inline]
    pub fn pair_mut(&mut self, src: usize, dst: usize) -> (&StereoBuffer, &mut StereoBuffer) {
        assert_ne!(src, dst, "pair_mut needs two distinct slots");
        if src < dst {
            let (head, tail) = self.buffers.split_at_mut(dst);
            (&head[src], &mut tail[0])
        } else {
            let (head, tail) = self.buffers.split_at_mut(src);
            (&tail[0], &mut head[dst])
        }
    }

    /// Zeroes every buffer.
    pub fn clear_all(&mut self) {
        for buf in &mut self.buffers {
            buf.clear();
        }
    }
}
