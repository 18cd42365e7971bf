pub mod frame;
pub mod layout;
pub mod pool;
pub mod region;

pub use frame::{CapacityExceeded, FrameBuffer};
pub use layout::FrameLayout;
pub use pool::FramePool;
