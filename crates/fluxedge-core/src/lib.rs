#[cfg(target_os = "linux")]
pub mod sys;
pub mod umem;

pub use umem::{CapacityExceeded, FrameBuffer, FrameLayout, FramePool};
