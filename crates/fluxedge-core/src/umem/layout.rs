use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    pub frame_size: u32,
    pub frame_count: u32,
}

impl FrameLayout {
    pub fn new(frame_size: u32, frame_count: u32) -> io::Result<Self> {
        // Frame size must be a power of 2 and hold a full-size Ethernet frame
        if !frame_size.is_power_of_two() || frame_size < 2048 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("frame size {} must be a power of 2 and at least 2048", frame_size),
            ));
        }
        if frame_count == 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "frame count must be non-zero"));
        }

        Ok(Self {
            frame_size,
            frame_count,
        })
    }

    pub fn size(&self) -> usize {
        (self.frame_size as usize) * (self.frame_count as usize)
    }

    /// Byte offset of frame `idx` from the start of the region, or `None`
    /// past the last frame.
    #[inline]
    pub fn frame_offset(&self, idx: u32) -> Option<usize> {
        (idx < self.frame_count).then(|| idx as usize * self.frame_size as usize)
    }
}
