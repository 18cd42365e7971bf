use crate::umem::pool::PoolShared;
use std::fmt;
use std::slice;
use std::sync::Arc;

/// An owned frame from a `FramePool`.
///
/// Exactly one `FrameBuffer` exists per pool slot at a time; dropping it
/// returns the slot to the pool from whichever thread holds it.
pub struct FrameBuffer {
    idx: u32,
    len: usize,
    segments: u16,
    pool: Arc<PoolShared>,
}

/// Returned by `set_len` when the requested length exceeds the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityExceeded {
    pub requested: usize,
    pub capacity: usize,
}

impl fmt::Display for CapacityExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "length {} exceeds frame capacity {}", self.requested, self.capacity)
    }
}

impl std::error::Error for CapacityExceeded {}

impl FrameBuffer {
    pub(crate) fn new(idx: u32, pool: Arc<PoolShared>) -> Self {
        Self {
            idx,
            len: 0,
            segments: 1,
            pool,
        }
    }

    pub fn capacity(&self) -> usize {
        self.pool.region.layout().frame_size as usize
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn set_len(&mut self, len: usize) -> Result<(), CapacityExceeded> {
        let capacity = self.capacity();
        if len > capacity {
            return Err(CapacityExceeded { requested: len, capacity });
        }
        self.len = len;
        Ok(())
    }

    /// Number of physical chunks the frame spans. Pool frames are always a
    /// single chunk; drivers that chain buffers report more.
    pub fn segment_count(&self) -> u16 {
        self.segments
    }

    pub fn set_segment_count(&mut self, segments: u16) {
        self.segments = segments.max(1);
    }

    /// The frame's logical contents, `len()` bytes.
    pub fn data(&self) -> &[u8] {
        unsafe { slice::from_raw_parts(self.pool.region.frame_ptr(self.idx), self.len) }
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        unsafe { slice::from_raw_parts_mut(self.pool.region.frame_ptr(self.idx), self.len) }
    }

    /// The whole backing frame regardless of `len()`, for filling before
    /// `set_len`.
    pub fn buffer_mut(&mut self) -> &mut [u8] {
        let capacity = self.capacity();
        unsafe { slice::from_raw_parts_mut(self.pool.region.frame_ptr(self.idx), capacity) }
    }

    /// Copy `bytes` into the frame and set the length to match.
    pub fn write_from(&mut self, bytes: &[u8]) -> Result<(), CapacityExceeded> {
        let capacity = self.capacity();
        if bytes.len() > capacity {
            return Err(CapacityExceeded { requested: bytes.len(), capacity });
        }
        self.buffer_mut()[..bytes.len()].copy_from_slice(bytes);
        self.len = bytes.len();
        Ok(())
    }
}

impl fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("idx", &self.idx)
            .field("len", &self.len)
            .field("segments", &self.segments)
            .finish()
    }
}

impl Drop for FrameBuffer {
    fn drop(&mut self) {
        self.pool.recycle(self.idx);
    }
}
