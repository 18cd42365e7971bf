pub mod guard;
#[cfg(target_os = "linux")]
pub mod packet;

pub use guard::TxGuard;
#[cfg(target_os = "linux")]
pub use packet::{PacketPort, PacketRx, PacketTx};

use fluxedge_core::FrameBuffer;
use fluxedge_proto::MacAddr;
use std::fmt;
use std::net::Ipv4Addr;

/// The (MAC, IPv4) pair this responder claims on the link. Fixed for the
/// lifetime of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortIdentity {
    pub mac: MacAddr,
    pub ipv4: Ipv4Addr,
}

impl PortIdentity {
    pub fn new(mac: MacAddr, ipv4: Ipv4Addr) -> Self {
        Self { mac, ipv4 }
    }
}

impl fmt::Display for PortIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.ipv4, self.mac)
    }
}

/// Receive half of a port. Owned by the primary loop alone.
pub trait RxPath: Send {
    /// Append up to `max` received frames to `out` and return how many were
    /// added. Never blocks; returns 0 when nothing is queued.
    fn receive_burst(&mut self, max: usize, out: &mut Vec<FrameBuffer>) -> usize;
}

/// Transmit half of a port. Shared between threads through a `TxGuard`.
pub trait TxPath: Send {
    /// Offer `frames` for transmission, in order.
    ///
    /// The port takes ownership of the first `n` frames by removing them
    /// from the front of `frames` and returns `n`. Whatever is left in
    /// `frames` was not sent and still belongs to the caller.
    fn transmit_burst(&mut self, frames: &mut Vec<FrameBuffer>) -> usize;
}

pub trait Port {
    type Rx: RxPath + 'static;
    type Tx: TxPath + 'static;

    fn identity(&self) -> PortIdentity;

    /// Hand out the receive and transmit halves. The receive half goes to
    /// the primary loop; the transmit half is wrapped in a `TxGuard`.
    fn split(self) -> (Self::Rx, Self::Tx);
}
