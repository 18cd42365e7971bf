#![cfg(feature = "simulator")]

#[cfg(target_os = "linux")]
mod packet_loopback {
    use fluxedge::config::Poller;
    use fluxedge::engine::EdgeEngine;
    use fluxedge::simulator::craft;
    use fluxedge::system::PacketPort;
    use fluxedge::{EdgeError, Port, PortIdentity, RxPath, TxGuard, TxPath};
    use fluxedge_core::{FrameLayout, FramePool};
    use fluxedge_proto::arp::ARP_OP_REPLY;
    use fluxedge_proto::ethernet::ETH_P_ARP;
    use fluxedge_proto::{parse_arp, parse_eth, MacAddr};
    use std::net::Ipv4Addr;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    const EDGE_MAC: MacAddr = MacAddr([0x02, 0xED, 0x6E, 0x00, 0x00, 0x01]);
    const EDGE_IP: Ipv4Addr = Ipv4Addr::new(127, 77, 0, 1);
    const CLIENT_MAC: MacAddr = MacAddr([0x02, 0xC1, 0x1E, 0x00, 0x00, 0x02]);
    const CLIENT_IP: Ipv4Addr = Ipv4Addr::new(127, 77, 0, 2);

    fn open(mac: MacAddr, ip: Ipv4Addr, pool: &FramePool) -> Option<PacketPort> {
        match PacketPort::open("lo", ip, Some(mac), pool.clone()) {
            Ok(port) => Some(port),
            // needs CAP_NET_RAW
            Err(EdgeError::PermissionDenied) => None,
            Err(e) => {
                eprintln!("skipping loopback test: {}", e);
                None
            }
        }
    }

    #[test]
    fn test_arp_over_loopback() {
        let pool = FramePool::new(FrameLayout::new(2048, 256).unwrap()).unwrap();
        let Some(edge_port) = open(EDGE_MAC, EDGE_IP, &pool) else { return };
        let Some(client_port) = open(CLIENT_MAC, CLIENT_IP, &pool) else { return };

        assert_eq!(edge_port.identity(), PortIdentity::new(EDGE_MAC, EDGE_IP));

        let identity = edge_port.identity();
        let (edge_rx, edge_tx) = edge_port.split();
        let mut engine = EdgeEngine::new(edge_rx, Arc::new(TxGuard::new(edge_tx)), identity, 32, Poller::Busy);

        let (mut client_rx, mut client_tx) = client_port.split();
        let mut request = pool.allocate().unwrap();
        request
            .write_from(&craft::arp_request(CLIENT_MAC, CLIENT_IP, MacAddr::ZERO, EDGE_IP))
            .unwrap();
        let mut burst = vec![request];
        assert_eq!(client_tx.transmit_burst(&mut burst), 1);

        let deadline = Instant::now() + Duration::from_secs(2);
        let mut inbound = Vec::new();
        let mut answered = false;
        while !answered && Instant::now() < deadline {
            engine.process_burst();

            client_rx.receive_burst(32, &mut inbound);
            answered = inbound.drain(..).any(|frame| {
                let Some((eth, payload)) = parse_eth(frame.data()) else { return false };
                if eth.eth_type() != ETH_P_ARP || eth.dst() != CLIENT_MAC {
                    return false;
                }
                match parse_arp(payload) {
                    Some((arp, _)) => {
                        arp.opcode() == ARP_OP_REPLY
                            && arp.sender_mac() == EDGE_MAC
                            && arp.sender_ip() == EDGE_IP
                            && arp.target_ip() == CLIENT_IP
                    }
                    None => false,
                }
            });
        }

        assert!(answered, "no ARP reply seen on lo");
        assert!(engine.stats().replied >= 1);
    }
}
