//! An in-memory port for tests and demos.
//!
//! Frames injected through `SimControl` arrive on the receive half; frames
//! the transmit half accepts are copied out and can be drained back. The
//! transmit half counts calls that overlap in time, which is how the
//! exclusivity of `TxGuard` is checked.

use crate::system::{Port, PortIdentity, RxPath, TxPath};
use fluxedge_core::{FrameBuffer, FramePool};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

struct Inbound {
    bytes: Vec<u8>,
    segments: u16,
}

#[derive(Default)]
struct SimState {
    inbound: Mutex<VecDeque<Inbound>>,
    outbound: Mutex<Vec<Vec<u8>>>,
    /// `usize::MAX` accepts everything.
    accept_limit: AtomicUsize,
    tx_latency_us: AtomicU64,
    in_flight: AtomicUsize,
    overlaps: AtomicUsize,
    tx_calls: AtomicUsize,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct SimPort {
    identity: PortIdentity,
    pool: FramePool,
    state: Arc<SimState>,
}

impl SimPort {
    /// Received frames are allocated from `pool`, as a driver would.
    pub fn new(identity: PortIdentity, pool: FramePool) -> Self {
        let state = SimState {
            accept_limit: AtomicUsize::new(usize::MAX),
            ..SimState::default()
        };
        Self {
            identity,
            pool,
            state: Arc::new(state),
        }
    }

    pub fn control(&self) -> SimControl {
        SimControl { state: self.state.clone() }
    }
}

impl Port for SimPort {
    type Rx = SimRx;
    type Tx = SimTx;

    fn identity(&self) -> PortIdentity {
        self.identity
    }

    fn split(self) -> (SimRx, SimTx) {
        let rx = SimRx {
            state: self.state.clone(),
            pool: self.pool,
        };
        (rx, SimTx { state: self.state })
    }
}

/// The test side of a `SimPort`. Cheap to clone; every clone sees the same
/// port.
#[derive(Clone)]
pub struct SimControl {
    state: Arc<SimState>,
}

impl SimControl {
    /// Queue a frame for the receive half.
    pub fn inject(&self, bytes: &[u8]) {
        self.inject_chained(bytes, 1);
    }

    /// Queue a frame that claims to span `segments` buffers.
    pub fn inject_chained(&self, bytes: &[u8], segments: u16) {
        lock(&self.state.inbound).push_back(Inbound {
            bytes: bytes.to_vec(),
            segments,
        });
    }

    /// Frames not yet picked up by the receive half.
    pub fn pending(&self) -> usize {
        lock(&self.state.inbound).len()
    }

    /// Drain everything transmitted so far, oldest first.
    pub fn take_transmitted(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut *lock(&self.state.outbound))
    }

    pub fn transmitted_count(&self) -> usize {
        lock(&self.state.outbound).len()
    }

    /// Cap the frames accepted per transmit call. `None` removes the cap.
    pub fn set_accept_limit(&self, limit: Option<usize>) {
        self.state.accept_limit.store(limit.unwrap_or(usize::MAX), Ordering::SeqCst);
    }

    /// Make each transmit call take at least `latency`, widening the window
    /// in which an unguarded second caller would overlap.
    pub fn set_tx_latency(&self, latency: Duration) {
        self.state.tx_latency_us.store(latency.as_micros() as u64, Ordering::SeqCst);
    }

    /// Transmit calls that started while another was still in progress.
    pub fn overlap_count(&self) -> usize {
        self.state.overlaps.load(Ordering::SeqCst)
    }

    pub fn transmit_calls(&self) -> usize {
        self.state.tx_calls.load(Ordering::SeqCst)
    }

    /// An extra, unguarded transmit half for the same port.
    pub fn raw_tx(&self) -> SimTx {
        SimTx { state: self.state.clone() }
    }
}

pub struct SimRx {
    state: Arc<SimState>,
    pool: FramePool,
}

impl RxPath for SimRx {
    fn receive_burst(&mut self, max: usize, out: &mut Vec<FrameBuffer>) -> usize {
        let mut inbound = lock(&self.state.inbound);
        let mut count = 0;

        while count < max {
            let Some(next) = inbound.pop_front() else { break };

            let mut frame = match self.pool.allocate() {
                Some(frame) => frame,
                None => {
                    inbound.push_front(next);
                    break;
                }
            };

            // Oversized frames are lost, as on a real link
            if frame.write_from(&next.bytes).is_err() {
                continue;
            }
            frame.set_segment_count(next.segments);
            out.push(frame);
            count += 1;
        }
        count
    }
}

pub struct SimTx {
    state: Arc<SimState>,
}

impl TxPath for SimTx {
    fn transmit_burst(&mut self, frames: &mut Vec<FrameBuffer>) -> usize {
        let state = &self.state;
        if state.in_flight.fetch_add(1, Ordering::SeqCst) != 0 {
            state.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        state.tx_calls.fetch_add(1, Ordering::SeqCst);

        let latency = state.tx_latency_us.load(Ordering::SeqCst);
        if latency > 0 {
            std::thread::sleep(Duration::from_micros(latency));
        }

        let accepted = state.accept_limit.load(Ordering::SeqCst).min(frames.len());
        {
            let mut outbound = lock(&state.outbound);
            outbound.extend(frames.drain(..accepted).map(|f| f.data().to_vec()));
        }

        state.in_flight.fetch_sub(1, Ordering::SeqCst);
        accepted
    }
}

/// Builders for well-formed request frames.
pub mod craft {
    use fluxedge_proto::arp::{ARP_HTYPE_ETHERNET, ARP_OP_REQUEST};
    use fluxedge_proto::ethernet::{ETH_HDR_LEN, ETH_P_ARP, ETH_P_IP};
    use fluxedge_proto::icmp::ICMP_ECHO_REQUEST;
    use fluxedge_proto::ipv4::{IPPROTO_ICMP, IPV4_HDR_LEN};
    use fluxedge_proto::{checksum, Ipv4Header, MacAddr};
    use std::net::Ipv4Addr;

    /// Shortest frame a NIC puts on the wire, without FCS.
    pub const MIN_FRAME_LEN: usize = 60;

    fn ethernet(dst: MacAddr, src: MacAddr, eth_type: u16) -> Vec<u8> {
        let mut frame = Vec::with_capacity(MIN_FRAME_LEN);
        frame.extend_from_slice(&dst.octets());
        frame.extend_from_slice(&src.octets());
        frame.extend_from_slice(&eth_type.to_be_bytes());
        frame
    }

    /// A broadcast ARP request padded to the minimum frame length.
    pub fn arp_request(sender_mac: MacAddr, sender_ip: Ipv4Addr, target_mac: MacAddr, target_ip: Ipv4Addr) -> Vec<u8> {
        let mut frame = ethernet(MacAddr::BROADCAST, sender_mac, ETH_P_ARP);
        frame.extend_from_slice(&ARP_HTYPE_ETHERNET.to_be_bytes());
        frame.extend_from_slice(&ETH_P_IP.to_be_bytes());
        frame.extend_from_slice(&[6, 4]);
        frame.extend_from_slice(&ARP_OP_REQUEST.to_be_bytes());
        frame.extend_from_slice(&sender_mac.octets());
        frame.extend_from_slice(&sender_ip.octets());
        frame.extend_from_slice(&target_mac.octets());
        frame.extend_from_slice(&target_ip.octets());
        frame.resize(MIN_FRAME_LEN, 0);
        frame
    }

    /// An ICMP echo request with valid IPv4 and ICMP checksums.
    pub fn echo_request(
        src_mac: MacAddr,
        dst_mac: MacAddr,
        src_ip: Ipv4Addr,
        dst_ip: Ipv4Addr,
        ident: u16,
        seq: u16,
        payload: &[u8],
    ) -> Vec<u8> {
        let icmp_len = 8 + payload.len();
        let total_len = (IPV4_HDR_LEN + icmp_len) as u16;

        let mut frame = ethernet(dst_mac, src_mac, ETH_P_IP);
        frame.extend_from_slice(&[0x45, 0x00]);
        frame.extend_from_slice(&total_len.to_be_bytes());
        frame.extend_from_slice(&[0x00, 0x01, 0x00, 0x00, 64, IPPROTO_ICMP, 0x00, 0x00]);
        frame.extend_from_slice(&src_ip.octets());
        frame.extend_from_slice(&dst_ip.octets());

        let icmp_start = frame.len();
        frame.extend_from_slice(&[ICMP_ECHO_REQUEST, 0, 0, 0]);
        frame.extend_from_slice(&ident.to_be_bytes());
        frame.extend_from_slice(&seq.to_be_bytes());
        frame.extend_from_slice(payload);

        let check = checksum(&frame[icmp_start..]);
        frame[icmp_start + 2..icmp_start + 4].copy_from_slice(&check.to_be_bytes());

        if let Some(mut ip) = Ipv4Header::new_checked(&mut frame[ETH_HDR_LEN..icmp_start]) {
            ip.fill_checksum();
        }
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fluxedge_core::FrameLayout;
    use fluxedge_proto::{parse_eth, parse_ipv4, MacAddr};
    use std::net::Ipv4Addr;

    fn port(frames: u32) -> (SimPort, FramePool) {
        let pool = FramePool::new(FrameLayout::new(2048, frames).unwrap()).unwrap();
        let identity = PortIdentity::new(MacAddr([0x02, 0, 0, 0, 0, 1]), Ipv4Addr::new(10, 0, 0, 1));
        (SimPort::new(identity, pool.clone()), pool)
    }

    #[test]
    fn test_receive_respects_max_and_pool() {
        let (port, pool) = port(2);
        let control = port.control();
        let (mut rx, _tx) = port.split();
        for i in 0..3u8 {
            control.inject(&[i; 20]);
        }

        let mut out = Vec::new();
        assert_eq!(rx.receive_burst(1, &mut out), 1);
        assert_eq!(rx.receive_burst(8, &mut out), 1);
        assert_eq!(pool.available(), 0);
        assert_eq!(control.pending(), 1);

        out.clear();
        assert_eq!(rx.receive_burst(8, &mut out), 1);
        assert_eq!(out[0].data(), &[2u8; 20]);
    }

    #[test]
    fn test_chained_injection() {
        let (port, _pool) = port(2);
        let control = port.control();
        let (mut rx, _tx) = port.split();
        control.inject_chained(&[0u8; 64], 3);

        let mut out = Vec::new();
        rx.receive_burst(8, &mut out);
        assert_eq!(out[0].segment_count(), 3);
    }

    #[test]
    fn test_accept_limit() {
        let (port, pool) = port(4);
        let control = port.control();
        let (_rx, mut tx) = port.split();
        control.set_accept_limit(Some(1));

        let mut burst: Vec<_> = (0..3).map(|_| pool.allocate().unwrap()).collect();
        assert_eq!(tx.transmit_burst(&mut burst), 1);
        assert_eq!(burst.len(), 2);

        control.set_accept_limit(None);
        assert_eq!(tx.transmit_burst(&mut burst), 2);
        assert_eq!(control.transmitted_count(), 3);
        assert_eq!(control.transmit_calls(), 2);
    }

    #[test]
    fn test_unguarded_transmits_overlap() {
        let (port, pool) = port(64);
        let control = port.control();
        control.set_tx_latency(Duration::from_millis(2));

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let mut tx = control.raw_tx();
                let pool = pool.clone();
                std::thread::spawn(move || {
                    for _ in 0..10 {
                        let mut burst: Vec<_> = pool.allocate().into_iter().collect();
                        tx.transmit_burst(&mut burst);
                    }
                })
            })
            .collect();
        for w in workers {
            w.join().unwrap();
        }

        assert!(control.overlap_count() > 0);
    }

    #[test]
    fn test_crafted_frames_parse() {
        let mac = MacAddr([0x02, 1, 2, 3, 4, 5]);
        let arp = craft::arp_request(mac, Ipv4Addr::new(10, 0, 0, 2), MacAddr::ZERO, Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(arp.len(), craft::MIN_FRAME_LEN);
        let (eth, _) = parse_eth(&arp).unwrap();
        assert_eq!(eth.src(), mac);

        let echo = craft::echo_request(mac, mac, Ipv4Addr::new(10, 0, 0, 2), Ipv4Addr::new(10, 0, 0, 1), 1, 2, b"abc");
        let (_, l3) = parse_eth(&echo).unwrap();
        let (ip, l4) = parse_ipv4(l3).unwrap();
        assert!(ip.is_valid());
        assert_eq!(ip.total_len() as usize, l3.len());
        assert_eq!(fluxedge_proto::checksum(l4), 0);
    }
}
