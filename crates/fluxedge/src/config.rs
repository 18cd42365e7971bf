use crate::error::EdgeError;
use fluxedge_proto::MacAddr;
use std::net::Ipv4Addr;
use std::time::Duration;

/// Frames pulled from the port per receive call.
pub const BURST_SIZE: usize = 32;

pub const DEFAULT_FRAME_COUNT: u32 = 4096;
pub const DEFAULT_FRAME_SIZE: u32 = 2048;
pub const DEFAULT_ANNOUNCE_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_WARMUP: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Poller {
    /// Burns 100% CPU. Never sleeps between polls.
    Busy,
    /// Spins while traffic is flowing, sleeps 1ms between empty polls once
    /// the port has been idle for 50us.
    Adaptive,
}

#[derive(Debug, Clone)]
pub struct EdgeConfig {
    pub interface: String,
    pub ipv4: Ipv4Addr,
    /// Overrides the interface's own hardware address when set. Must be
    /// unicast: replies are sent from it and peers drop group sources.
    pub mac: Option<MacAddr>,
    pub burst_size: usize,
    pub frame_count: u32,
    pub frame_size: u32,
    pub rx_core: usize,
    pub announce_core: usize,
    pub announce_interval: Duration,
    pub warmup: Duration,
    pub poller: Poller,
}

impl EdgeConfig {
    pub fn new(interface: &str, ipv4: Ipv4Addr) -> Self {
        Self {
            interface: interface.to_string(),
            ipv4,
            mac: None,
            burst_size: BURST_SIZE,
            frame_count: DEFAULT_FRAME_COUNT,
            frame_size: DEFAULT_FRAME_SIZE,
            rx_core: 0,
            announce_core: 1,
            announce_interval: DEFAULT_ANNOUNCE_INTERVAL,
            warmup: DEFAULT_WARMUP,
            poller: Poller::Adaptive,
        }
    }

    pub fn validate(&self) -> Result<(), EdgeError> {
        if self.ipv4.is_unspecified() || self.ipv4.is_broadcast() || self.ipv4.is_multicast() {
            return Err(EdgeError::InvalidConfiguration(format!("{} cannot be claimed as a host address", self.ipv4)));
        }
        if let Some(mac) = self.mac {
            if !mac.is_unicast() {
                return Err(EdgeError::InvalidConfiguration(format!("{} is not a unicast MAC address", mac)));
            }
        }
        if self.rx_core == self.announce_core {
            return Err(EdgeError::InvalidConfiguration(format!(
                "receive and announce loops must run on different cores (both set to {})",
                self.rx_core
            )));
        }
        if self.announce_interval.is_zero() {
            return Err(EdgeError::InvalidConfiguration("announce interval must be non-zero".to_string()));
        }
        if (self.frame_count as usize) < self.burst_size + 1 {
            return Err(EdgeError::InvalidConfiguration(format!(
                "{} frames cannot cover a {}-frame burst plus an announcement",
                self.frame_count, self.burst_size
            )));
        }
        Ok(())
    }

    /// Configured cores that do not exist on a machine with `online`
    /// processors, with the loop each one was meant for.
    pub fn cores_beyond(&self, online: usize) -> Vec<(&'static str, usize)> {
        [("primary", self.rx_core), ("announcer", self.announce_core)]
            .into_iter()
            .filter(|&(_, core)| core >= online)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> EdgeConfig {
        EdgeConfig::new("eth0", Ipv4Addr::new(192, 168, 1, 254))
    }

    #[test]
    fn test_defaults_are_valid() {
        let cfg = base();
        assert_eq!(cfg.burst_size, 32);
        assert_eq!(cfg.poller, Poller::Adaptive);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_rejects_shared_core() {
        let mut cfg = base();
        cfg.announce_core = cfg.rx_core;
        assert!(matches!(cfg.validate(), Err(EdgeError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_rejects_unclaimable_addresses() {
        let mut cfg = base();
        cfg.ipv4 = Ipv4Addr::UNSPECIFIED;
        assert!(cfg.validate().is_err());
        cfg.ipv4 = Ipv4Addr::BROADCAST;
        assert!(cfg.validate().is_err());

        let mut cfg = base();
        cfg.mac = Some(MacAddr::BROADCAST);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_group_mac_override_rejected() {
        let mut cfg = base();
        cfg.mac = Some(MacAddr([0x11, 0x22, 0x33, 0x44, 0x55, 0x66]));
        match cfg.validate() {
            Err(EdgeError::InvalidConfiguration(msg)) => assert!(msg.contains("unicast"), "{}", msg),
            other => panic!("expected a configuration error, got {:?}", other),
        }

        // Clearing the group bit makes the same address usable
        cfg.mac = Some(MacAddr([0x10, 0x22, 0x33, 0x44, 0x55, 0x66]));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_cores_beyond_online() {
        let mut cfg = base();
        cfg.rx_core = 2;
        cfg.announce_core = 5;
        assert!(cfg.cores_beyond(8).is_empty());
        assert_eq!(cfg.cores_beyond(4), vec![("announcer", 5)]);
        assert_eq!(cfg.cores_beyond(2), vec![("primary", 2), ("announcer", 5)]);
    }

    #[test]
    fn test_rejects_tiny_pool() {
        let mut cfg = base();
        cfg.frame_count = 32;
        assert!(cfg.validate().is_err());
        cfg.frame_count = 33;
        assert!(cfg.validate().is_ok());
    }
}
