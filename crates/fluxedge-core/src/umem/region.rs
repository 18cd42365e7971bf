use crate::umem::layout::FrameLayout;
use memmap2::{MmapMut, MmapOptions};
use std::io;

/// Anonymous mapping carved into `frame_count` fixed-size frames.
pub struct FrameRegion {
    base: *mut u8,
    layout: FrameLayout,
    // Keeps `base` mapped.
    _mmap: MmapMut,
}

// Frames are handed out by index to exactly one owner at a time (see
// `FramePool`), so concurrent access never touches the same bytes.
unsafe impl Send for FrameRegion {}
unsafe impl Sync for FrameRegion {}

impl FrameRegion {
    pub fn new(layout: FrameLayout) -> io::Result<Self> {
        let mut mmap = MmapOptions::new().len(layout.size()).map_anon()?;
        let base = mmap.as_mut_ptr();

        Ok(Self { base, layout, _mmap: mmap })
    }

    pub fn layout(&self) -> FrameLayout {
        self.layout
    }

    pub fn len(&self) -> usize {
        self.layout.size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Start of frame `idx`.
    ///
    /// # Safety
    /// `idx` must be below `frame_count`, and the caller must be the sole
    /// owner of that frame for as long as the pointer is used.
    #[inline]
    pub unsafe fn frame_ptr(&self, idx: u32) -> *mut u8 {
        debug_assert!(idx < self.layout.frame_count, "frame {} out of range", idx);
        self.base.add(self.layout.frame_offset(idx).unwrap_or(0))
    }
}
