use crate::config::Poller;
use crate::engine::responder::{classify_and_reply, Verdict};
use crate::system::{PortIdentity, RxPath, TxGuard, TxPath};
use fluxedge_core::FrameBuffer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

const SPIN_WINDOW: Duration = Duration::from_micros(50);
const IDLE_SLEEP: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub rx: u64,
    pub replied: u64,
    pub discarded: u64,
    pub tx: u64,
    /// Replies the port did not accept; released without retry.
    pub tx_dropped: u64,
}

/// The primary loop: receive a burst, answer what deserves an answer, and
/// hand the replies to the port in one guarded call.
pub struct EdgeEngine<R, T> {
    rx: R,
    tx: Arc<TxGuard<T>>,
    identity: PortIdentity,
    burst_size: usize,
    poller: Poller,
    // Reused across bursts to avoid per-burst allocation
    rx_buf: Vec<FrameBuffer>,
    tx_buf: Vec<FrameBuffer>,
    stats: EngineStats,
}

impl<R: RxPath, T: TxPath> EdgeEngine<R, T> {
    pub fn new(rx: R, tx: Arc<TxGuard<T>>, identity: PortIdentity, burst_size: usize, poller: Poller) -> Self {
        let burst_size = burst_size.max(1);
        Self {
            rx,
            tx,
            identity,
            burst_size,
            poller,
            rx_buf: Vec::with_capacity(burst_size),
            tx_buf: Vec::with_capacity(burst_size),
            stats: EngineStats::default(),
        }
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    pub fn identity(&self) -> PortIdentity {
        self.identity
    }

    /// Poll until `stop` is set.
    pub fn run(&mut self, stop: &AtomicBool) {
        info!(identity = %self.identity, poller = ?self.poller, burst = self.burst_size, "primary loop running");

        match self.poller {
            Poller::Busy => {
                while !stop.load(Ordering::Relaxed) {
                    self.process_burst();
                }
            }
            Poller::Adaptive => {
                let mut last_packet_time = Instant::now();
                while !stop.load(Ordering::Relaxed) {
                    let count = self.process_burst();
                    if count > 0 {
                        last_packet_time = Instant::now();
                    } else if last_packet_time.elapsed() > SPIN_WINDOW {
                        std::thread::sleep(IDLE_SLEEP);
                    } else {
                        std::thread::yield_now();
                    }
                }
            }
        }

        info!(stats = ?self.stats, "primary loop stopped");
    }

    /// Run one receive/classify/transmit cycle. Returns the number of frames
    /// received.
    pub fn process_burst(&mut self) -> usize {
        let received = self.rx.receive_burst(self.burst_size, &mut self.rx_buf);
        if received == 0 {
            return 0;
        }

        let mut discarded = 0u64;
        for mut frame in self.rx_buf.drain(..) {
            match classify_and_reply(&self.identity, &mut frame) {
                Verdict::Reply => self.tx_buf.push(frame),
                Verdict::Discard => {
                    discarded += 1;
                    drop(frame);
                }
            }
        }

        let replies = self.tx_buf.len();
        let sent = if replies > 0 { self.tx.transmit(&mut self.tx_buf) } else { 0 };

        // Whatever the port refused goes back to the pool.
        let dropped = self.tx_buf.len();
        self.tx_buf.clear();

        self.stats.rx += received as u64;
        self.stats.replied += replies as u64;
        self.stats.discarded += discarded;
        self.stats.tx += sent as u64;
        self.stats.tx_dropped += dropped as u64;

        debug!(received, replies, sent, dropped, "burst");
        received
    }
}
