use crate::error::EdgeError;
use crate::system::{Port, PortIdentity, RxPath, TxPath};
use fluxedge_core::sys::socket::{bind_packet_socket, close_socket, create_packet_socket, recv_frame, send_frame};
use fluxedge_core::sys::utils::{if_hwaddr, if_nametoindex};
use fluxedge_core::{FrameBuffer, FramePool};
use fluxedge_proto::MacAddr;
use std::net::Ipv4Addr;
use std::os::unix::io::RawFd;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Owns the socket; closed when both halves are gone.
struct SocketHandle {
    fd: RawFd,
}

impl Drop for SocketHandle {
    fn drop(&mut self) {
        if let Err(e) = close_socket(self.fd) {
            warn!(fd = self.fd, error = %e, "close failed");
        }
    }
}

/// An AF_PACKET raw socket bound to one interface.
pub struct PacketPort {
    socket: Arc<SocketHandle>,
    pool: FramePool,
    identity: PortIdentity,
    interface: String,
}

impl PacketPort {
    /// Open and bind the socket. The MAC comes from the interface unless
    /// `mac` overrides it.
    pub fn open(interface: &str, ipv4: Ipv4Addr, mac: Option<MacAddr>, pool: FramePool) -> Result<Self, EdgeError> {
        let if_index = if_nametoindex(interface).map_err(EdgeError::from_setup)?;
        let fd = create_packet_socket().map_err(EdgeError::from_setup)?;
        let socket = Arc::new(SocketHandle { fd });

        bind_packet_socket(fd, if_index).map_err(EdgeError::from_setup)?;

        let mac = match mac {
            Some(mac) => mac,
            None => MacAddr(if_hwaddr(fd, interface).map_err(EdgeError::from_setup)?),
        };
        let identity = PortIdentity::new(mac, ipv4);

        info!(interface, if_index, %identity, "packet port open");

        Ok(Self {
            socket,
            pool,
            identity,
            interface: interface.to_string(),
        })
    }

    pub fn fd(&self) -> RawFd {
        self.socket.fd
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }
}

impl Port for PacketPort {
    type Rx = PacketRx;
    type Tx = PacketTx;

    fn identity(&self) -> PortIdentity {
        self.identity
    }

    fn split(self) -> (PacketRx, PacketTx) {
        let rx = PacketRx {
            socket: self.socket.clone(),
            pool: self.pool,
        };
        let tx = PacketTx { socket: self.socket };
        (rx, tx)
    }
}

pub struct PacketRx {
    socket: Arc<SocketHandle>,
    pool: FramePool,
}

impl RxPath for PacketRx {
    fn receive_burst(&mut self, max: usize, out: &mut Vec<FrameBuffer>) -> usize {
        let mut count = 0;
        while count < max {
            let mut frame = match self.pool.allocate() {
                Some(f) => f,
                None => {
                    // Leave the rest queued in the socket until frames come back
                    debug!("pool empty, deferring receive");
                    break;
                }
            };

            match recv_frame(self.socket.fd, frame.buffer_mut()) {
                Ok(Some(len)) => {
                    // recv_frame never reports more than the buffer it was given
                    if frame.set_len(len).is_err() {
                        continue;
                    }
                    out.push(frame);
                    count += 1;
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "receive failed");
                    break;
                }
            }
        }
        count
    }
}

pub struct PacketTx {
    socket: Arc<SocketHandle>,
}

impl TxPath for PacketTx {
    fn transmit_burst(&mut self, frames: &mut Vec<FrameBuffer>) -> usize {
        let mut sent = 0;
        for frame in frames.iter() {
            match send_frame(self.socket.fd, frame.data()) {
                Ok(true) => sent += 1,
                Ok(false) => break,
                Err(e) => {
                    warn!(error = %e, len = frame.len(), "send failed");
                    break;
                }
            }
        }
        // The kernel copied the sent frames; their buffers go straight back.
        frames.drain(..sent);
        sent
    }
}
