pub mod affinity;
pub mod socket;
pub mod utils;

/// Raised by `if_nametoindex` and `bind` for an interface that does not exist.
pub use libc::ENODEV;
