use crate::config::{EdgeConfig, Poller};
use crate::engine::{Announcer, AnnouncerStats, EdgeEngine, EngineStats};
use crate::error::EdgeError;
use crate::system::{Port, PortIdentity, TxGuard};
use fluxedge_core::{FrameLayout, FramePool};
use fluxedge_proto::MacAddr;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{error, info, warn};

#[cfg(target_os = "linux")]
use crate::system::PacketPort;

#[cfg(any(test, feature = "simulator"))]
use crate::simulator::{SimControl, SimPort};

pub struct EdgeBuilder {
    config: EdgeConfig,
}

impl EdgeBuilder {
    pub fn new(interface: &str, ipv4: Ipv4Addr) -> Self {
        Self {
            config: EdgeConfig::new(interface, ipv4),
        }
    }

    pub fn from_config(config: EdgeConfig) -> Self {
        Self { config }
    }

    pub fn mac(mut self, mac: MacAddr) -> Self {
        self.config.mac = Some(mac);
        self
    }

    pub fn burst_size(mut self, size: usize) -> Self {
        self.config.burst_size = size.max(1);
        self
    }

    pub fn frames(mut self, count: u32) -> Self {
        self.config.frame_count = count;
        self
    }

    pub fn frame_size(mut self, size: u32) -> Self {
        self.config.frame_size = size;
        self
    }

    pub fn rx_core(mut self, core: usize) -> Self {
        self.config.rx_core = core;
        self
    }

    pub fn announce_core(mut self, core: usize) -> Self {
        self.config.announce_core = core;
        self
    }

    pub fn announce_interval(mut self, interval: Duration) -> Self {
        self.config.announce_interval = interval;
        self
    }

    pub fn warmup(mut self, warmup: Duration) -> Self {
        self.config.warmup = warmup;
        self
    }

    pub fn poller(mut self, poller: Poller) -> Self {
        self.config.poller = poller;
        self
    }

    pub fn config(&self) -> &EdgeConfig {
        &self.config
    }

    /// Validate the configuration and map the frame pool it describes.
    pub fn build_pool(&self) -> Result<FramePool, EdgeError> {
        self.config.validate()?;
        let layout = FrameLayout::new(self.config.frame_size, self.config.frame_count)
            .map_err(|e| EdgeError::InvalidConfiguration(e.to_string()))?;
        Ok(FramePool::new(layout)?)
    }

    /// Assemble an edge around a port the caller already opened. Received
    /// frames must come from `pool`.
    pub fn build_with<P: Port>(self, port: P, pool: FramePool) -> Result<Edge<P>, EdgeError> {
        self.config.validate()?;

        let identity = port.identity();
        if identity.ipv4 != self.config.ipv4 {
            return Err(EdgeError::InvalidConfiguration(format!(
                "port claims {} but the edge is configured for {}",
                identity.ipv4, self.config.ipv4
            )));
        }
        // One full burst in flight plus an announcement
        if pool.available() < self.config.burst_size + 1 {
            return Err(EdgeError::PoolExhausted);
        }

        Ok(Edge {
            config: self.config,
            identity,
            pool,
            port,
        })
    }

    /// Open an AF_PACKET socket on the configured interface.
    #[cfg(target_os = "linux")]
    pub fn build_packet(self) -> Result<Edge<PacketPort>, EdgeError> {
        let pool = self.build_pool()?;
        let port = PacketPort::open(&self.config.interface, self.config.ipv4, self.config.mac, pool.clone())?;
        self.build_with(port, pool)
    }

    /// An edge on an in-memory port, with the control side for driving it.
    /// Needs an explicit MAC.
    #[cfg(any(test, feature = "simulator"))]
    pub fn build_simulated(self) -> Result<(Edge<SimPort>, SimControl), EdgeError> {
        let mac = self.config.mac.ok_or_else(|| {
            EdgeError::InvalidConfiguration("a simulated port needs an explicit MAC address".to_string())
        })?;
        let pool = self.build_pool()?;
        let port = SimPort::new(PortIdentity::new(mac, self.config.ipv4), pool.clone());
        let control = port.control();
        Ok((self.build_with(port, pool)?, control))
    }
}

/// A configured responder, ready to start.
pub struct Edge<P> {
    config: EdgeConfig,
    identity: PortIdentity,
    pool: FramePool,
    port: P,
}

impl<P: Port> Edge<P> {
    pub fn identity(&self) -> PortIdentity {
        self.identity
    }

    pub fn config(&self) -> &EdgeConfig {
        &self.config
    }

    pub fn pool(&self) -> &FramePool {
        &self.pool
    }

    /// Start the primary loop and the announcer, each on its own thread
    /// pinned to its configured core.
    pub fn spawn(self) -> Result<EdgeHandle, EdgeError> {
        let Edge { config, identity, pool, port } = self;

        let (rx, tx) = port.split();
        let tx = Arc::new(TxGuard::new(tx));
        let stop = Arc::new(AtomicBool::new(false));

        let mut engine = EdgeEngine::new(rx, tx.clone(), identity, config.burst_size, config.poller);
        let mut announcer = Announcer::new(identity, pool, tx, config.announce_interval, config.warmup);

        #[cfg(target_os = "linux")]
        {
            let online = fluxedge_core::sys::affinity::online_cores();
            for (role, core) in config.cores_beyond(online) {
                warn!(role, core, online, "configured core is not online");
            }
        }

        let rx_core = config.rx_core;
        let engine_thread = {
            let stop = stop.clone();
            thread::Builder::new().name("fluxedge-rx".to_string()).spawn(move || {
                pin_or_warn(rx_core, "primary");
                engine.run(&stop);
                engine.stats()
            })?
        };

        let announce_core = config.announce_core;
        let announce_thread = {
            let stop = stop.clone();
            thread::Builder::new().name("fluxedge-announce".to_string()).spawn(move || {
                pin_or_warn(announce_core, "announcer");
                announcer.run(&stop);
                announcer.stats()
            })
        };

        let announce_thread = match announce_thread {
            Ok(handle) => handle,
            Err(e) => {
                stop.store(true, Ordering::Relaxed);
                let _ = engine_thread.join();
                return Err(e.into());
            }
        };

        info!(interface = %config.interface, %identity, rx_core, announce_core, "edge started");

        Ok(EdgeHandle {
            stop,
            engine: engine_thread,
            announcer: announce_thread,
        })
    }
}

fn pin_or_warn(core: usize, role: &str) {
    if let Err(e) = pin_to_core(core) {
        warn!(role, error = %e, "running unpinned");
    }
}

#[cfg(target_os = "linux")]
fn pin_to_core(core: usize) -> Result<(), EdgeError> {
    fluxedge_core::sys::affinity::pin_current_thread(core).map_err(|_| EdgeError::Affinity(core))
}

#[cfg(not(target_os = "linux"))]
fn pin_to_core(core: usize) -> Result<(), EdgeError> {
    Err(EdgeError::Affinity(core))
}

/// Counters collected from both threads at shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EdgeReport {
    pub engine: EngineStats,
    pub announcer: AnnouncerStats,
}

pub struct EdgeHandle {
    stop: Arc<AtomicBool>,
    engine: JoinHandle<EngineStats>,
    announcer: JoinHandle<AnnouncerStats>,
}

impl EdgeHandle {
    /// Ask both loops to exit after their current iteration or sleep slice.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn is_finished(&self) -> bool {
        self.engine.is_finished() && self.announcer.is_finished()
    }

    /// Wait for both threads. Without a prior `stop()` this waits forever.
    pub fn join(self) -> EdgeReport {
        let engine = self.engine.join().unwrap_or_else(|_| {
            error!("primary loop panicked");
            EngineStats::default()
        });
        let announcer = self.announcer.join().unwrap_or_else(|_| {
            error!("announcer panicked");
            AnnouncerStats::default()
        });
        EdgeReport { engine, announcer }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> EdgeBuilder {
        EdgeBuilder::new("sim0", Ipv4Addr::new(192, 168, 1, 254))
            .mac(MacAddr([0x02, 0x11, 0x22, 0x33, 0x44, 0x55]))
            .frames(64)
            .burst_size(8)
    }

    #[test]
    fn test_builder_settings() {
        let b = builder()
            .rx_core(2)
            .announce_core(3)
            .poller(Poller::Busy)
            .announce_interval(Duration::from_secs(5))
            .burst_size(0);
        let cfg = b.config();
        assert_eq!(cfg.rx_core, 2);
        assert_eq!(cfg.announce_core, 3);
        assert_eq!(cfg.poller, Poller::Busy);
        assert_eq!(cfg.announce_interval, Duration::from_secs(5));
        assert_eq!(cfg.burst_size, 1);
    }

    #[test]
    fn test_bad_frame_size_rejected() {
        let result = builder().frame_size(1000).build_pool();
        assert!(matches!(result, Err(EdgeError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_simulated_needs_mac() {
        let result = EdgeBuilder::new("sim0", Ipv4Addr::new(10, 0, 0, 1)).build_simulated();
        assert!(matches!(result, Err(EdgeError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_identity_mismatch_rejected() {
        let b = builder();
        let pool = b.build_pool().unwrap();
        let port = SimPort::new(PortIdentity::new(MacAddr([0x02, 0, 0, 0, 0, 9]), Ipv4Addr::new(10, 9, 9, 9)), pool.clone());
        assert!(matches!(b.build_with(port, pool), Err(EdgeError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_drained_pool_rejected() {
        let b = builder();
        let pool = b.build_pool().unwrap();
        let _held: Vec<_> = std::iter::from_fn(|| pool.allocate()).take(60).collect();
        let port = SimPort::new(PortIdentity::new(MacAddr([0x02, 0, 0, 0, 0, 9]), b.config().ipv4), pool.clone());
        assert!(matches!(b.build_with(port, pool), Err(EdgeError::PoolExhausted)));
    }

    #[test]
    fn test_spawn_and_stop() {
        let (edge, control) = builder().warmup(Duration::ZERO).build_simulated().unwrap();
        let handle = edge.spawn().unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while control.transmitted_count() == 0 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        handle.stop();
        let report = handle.join();
        assert_eq!(report.announcer.sent, 1);
        assert_eq!(report.engine.rx, 0);
    }
}
