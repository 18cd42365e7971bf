//! Periodic gratuitous ARP, so neighbours learn (or re-learn) our binding
//! without having to ask.

use crate::engine::responder::ARP_FRAME_LEN;
use crate::system::{PortIdentity, TxGuard, TxPath};
use fluxedge_core::{CapacityExceeded, FrameBuffer, FramePool};
use fluxedge_proto::arp::{ArpHeader, ARP_HTYPE_ETHERNET, ARP_OP_REQUEST};
use fluxedge_proto::ethernet::{EthHeader, ETH_HDR_LEN, ETH_P_ARP, ETH_P_IP};
use fluxedge_proto::MacAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Longest uninterrupted sleep; bounds how late a stop request is noticed.
const SLEEP_SLICE: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnnouncerStats {
    pub sent: u64,
    pub failed: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnounceOutcome {
    Sent,
    /// The port accepted nothing; the frame went back to the pool.
    Rejected,
    /// No frame was available; this cycle is skipped.
    PoolExhausted,
}

/// Fill `frame` with a gratuitous ARP request announcing `identity`.
pub fn build_announcement(identity: &PortIdentity, frame: &mut FrameBuffer) -> Result<(), CapacityExceeded> {
    frame.set_len(ARP_FRAME_LEN)?;
    frame.set_segment_count(1);

    let (l2, l3) = frame.data_mut().split_at_mut(ETH_HDR_LEN);

    if let Some(mut eth) = EthHeader::new_checked(l2) {
        eth.set_dst(MacAddr::BROADCAST);
        eth.set_src(identity.mac);
        eth.set_eth_type(ETH_P_ARP);
    }

    if let Some(mut arp) = ArpHeader::new_checked(l3) {
        arp.set_hardware_type(ARP_HTYPE_ETHERNET);
        arp.set_protocol_type(ETH_P_IP);
        arp.set_hw_addr_len(6);
        arp.set_proto_addr_len(4);
        arp.set_opcode(ARP_OP_REQUEST);
        arp.set_sender(identity.mac, identity.ipv4);
        arp.set_target(MacAddr::BROADCAST, identity.ipv4);
    }

    Ok(())
}

pub struct Announcer<T> {
    identity: PortIdentity,
    pool: FramePool,
    tx: Arc<TxGuard<T>>,
    interval: Duration,
    warmup: Duration,
    stats: AnnouncerStats,
}

impl<T: TxPath> Announcer<T> {
    pub fn new(identity: PortIdentity, pool: FramePool, tx: Arc<TxGuard<T>>, interval: Duration, warmup: Duration) -> Self {
        Self {
            identity,
            pool,
            tx,
            interval,
            warmup,
            stats: AnnouncerStats::default(),
        }
    }

    pub fn stats(&self) -> AnnouncerStats {
        self.stats
    }

    /// One announcement cycle.
    pub fn announce(&mut self) -> AnnounceOutcome {
        let mut frame = match self.pool.allocate() {
            Some(frame) => frame,
            None => {
                self.stats.failed += 1;
                warn!(capacity = self.pool.capacity(), "frame pool exhausted, skipping announcement");
                return AnnounceOutcome::PoolExhausted;
            }
        };

        if let Err(e) = build_announcement(&self.identity, &mut frame) {
            self.stats.failed += 1;
            warn!(error = %e, "cannot build gratuitous ARP");
            return AnnounceOutcome::Rejected;
        }

        match self.tx.transmit_one(frame) {
            Ok(()) => {
                self.stats.sent += 1;
                debug!(identity = %self.identity, "gratuitous ARP sent");
                AnnounceOutcome::Sent
            }
            Err(refused) => {
                drop(refused);
                self.stats.failed += 1;
                warn!(identity = %self.identity, "port refused gratuitous ARP");
                AnnounceOutcome::Rejected
            }
        }
    }

    /// Warm up, then announce every interval until `stop` is set.
    pub fn run(&mut self, stop: &AtomicBool) {
        info!(identity = %self.identity, interval = ?self.interval, "announcer running");

        if sleep_unless_stopped(self.warmup, stop) {
            while !stop.load(Ordering::Relaxed) {
                self.announce();
                if !sleep_unless_stopped(self.interval, stop) {
                    break;
                }
            }
        }

        info!(stats = ?self.stats, "announcer stopped");
    }
}

/// Sleep for `total` in short slices. Returns false if `stop` was raised.
fn sleep_unless_stopped(total: Duration, stop: &AtomicBool) -> bool {
    let deadline = Instant::now() + total;
    loop {
        if stop.load(Ordering::Relaxed) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        std::thread::sleep((deadline - now).min(SLEEP_SLICE));
    }
}
