//! A user-space ARP and ICMP echo responder for one virtual IPv4 address.
//!
//! The primary loop owns the receive half of a [`Port`] and answers ARP
//! requests and echo requests in place; the announcer periodically
//! broadcasts a gratuitous ARP. Both transmit through one [`TxGuard`].

pub mod builder;
pub mod config;
pub mod engine;
pub mod error;
#[cfg(any(test, feature = "simulator"))]
pub mod simulator;
pub mod system;

pub use builder::{Edge, EdgeBuilder, EdgeHandle, EdgeReport};
pub use config::{EdgeConfig, Poller};
pub use engine::{classify_and_reply, Verdict};
pub use error::EdgeError;
pub use system::{Port, PortIdentity, RxPath, TxGuard, TxPath};
