use crate::umem::frame::FrameBuffer;
use crate::umem::layout::FrameLayout;
use crate::umem::region::FrameRegion;
use crossbeam_queue::SegQueue;
use std::io;
use std::sync::Arc;

/// State shared by the pool handle and every outstanding `FrameBuffer`.
/// Frames dropped in any thread push their index back onto `free_frames`.
pub(crate) struct PoolShared {
    pub(crate) region: FrameRegion,
    free_frames: SegQueue<u32>,
}

impl PoolShared {
    pub(crate) fn recycle(&self, idx: u32) {
        self.free_frames.push(idx);
    }
}

/// Fixed-budget frame allocator, safe to use from several threads at once.
#[derive(Clone)]
pub struct FramePool {
    shared: Arc<PoolShared>,
}

impl FramePool {
    pub fn new(layout: FrameLayout) -> io::Result<Self> {
        let region = FrameRegion::new(layout)?;
        let free_frames = SegQueue::new();
        for i in 0..layout.frame_count {
            free_frames.push(i);
        }

        Ok(Self {
            shared: Arc::new(PoolShared { region, free_frames }),
        })
    }

    /// Take a free frame with length 0 and a single segment, or `None` when
    /// the budget is exhausted.
    pub fn allocate(&self) -> Option<FrameBuffer> {
        let idx = self.shared.free_frames.pop()?;
        Some(FrameBuffer::new(idx, self.shared.clone()))
    }

    /// Return a frame to the pool. Dropping a `FrameBuffer` has the same
    /// effect; this spelling makes the hand-back explicit at call sites.
    pub fn release(&self, frame: FrameBuffer) {
        drop(frame);
    }

    pub fn available(&self) -> usize {
        self.shared.free_frames.len()
    }

    pub fn capacity(&self) -> usize {
        self.shared.region.layout().frame_count as usize
    }

    pub fn frame_size(&self) -> usize {
        self.shared.region.layout().frame_size as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_until_exhausted() {
        let pool = FramePool::new(FrameLayout::new(2048, 3).unwrap()).unwrap();
        assert_eq!(pool.capacity(), 3);

        let a = pool.allocate().expect("frame 0");
        let b = pool.allocate().expect("frame 1");
        let c = pool.allocate().expect("frame 2");
        assert!(pool.allocate().is_none());
        assert_eq!(pool.available(), 0);

        pool.release(a);
        assert_eq!(pool.available(), 1);
        drop(b);
        drop(c);
        assert_eq!(pool.available(), 3);
    }

    #[test]
    fn test_frames_do_not_alias() {
        let pool = FramePool::new(FrameLayout::new(2048, 2).unwrap()).unwrap();
        let mut a = pool.allocate().unwrap();
        let mut b = pool.allocate().unwrap();

        a.buffer_mut().fill(0xAA);
        b.buffer_mut().fill(0xBB);
        a.set_len(2048).unwrap();
        b.set_len(2048).unwrap();

        assert!(a.data().iter().all(|&x| x == 0xAA));
        assert!(b.data().iter().all(|&x| x == 0xBB));
    }

    #[test]
    fn test_release_across_threads() {
        let pool = FramePool::new(FrameLayout::new(2048, 64).unwrap()).unwrap();
        let frames: Vec<_> = (0..64).map(|_| pool.allocate().unwrap()).collect();
        assert_eq!(pool.available(), 0);

        let handle = std::thread::spawn(move || drop(frames));
        handle.join().unwrap();
        assert_eq!(pool.available(), 64);
    }
}
