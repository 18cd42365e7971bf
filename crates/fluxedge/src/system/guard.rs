use crate::system::TxPath;
use fluxedge_core::FrameBuffer;
use std::sync::{Mutex, PoisonError};

/// Serializes access to a port's transmit path.
///
/// Every transmit call from the primary loop and the announcer goes through
/// here. The lock covers the `transmit_burst` call and nothing else: frames
/// are classified or built before, and unsent frames are released after.
pub struct TxGuard<T> {
    inner: Mutex<T>,
}

impl<T: TxPath> TxGuard<T> {
    pub fn new(tx: T) -> Self {
        Self { inner: Mutex::new(tx) }
    }

    /// Submit `frames` as one burst. Returns the accepted count; the unsent
    /// tail stays in `frames`.
    pub fn transmit(&self, frames: &mut Vec<FrameBuffer>) -> usize {
        // A panic on the other thread leaves the port itself intact.
        let mut tx = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        tx.transmit_burst(frames)
    }

    /// Submit a single frame. Gives the frame back if the port refused it.
    pub fn transmit_one(&self, frame: FrameBuffer) -> Result<(), FrameBuffer> {
        let mut burst = vec![frame];
        let sent = self.transmit(&mut burst);
        match burst.pop() {
            Some(unsent) if sent == 0 => Err(unsent),
            _ => Ok(()),
        }
    }

    pub fn into_inner(self) -> T {
        self.inner.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}
