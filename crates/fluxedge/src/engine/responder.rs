//! Classification and in-place rewriting of inbound frames.
//!
//! Two kinds of frame get an answer: ARP requests for our address and ICMP
//! echo requests sent to it. Everything else is discarded. Each branch reads
//! and validates the headers through immutable views first, and only when
//! the reply is certain does it reopen the same bytes mutably and rewrite
//! them, so a discarded frame is never partially modified.

use crate::system::PortIdentity;
use fluxedge_core::FrameBuffer;
use fluxedge_proto::arp::{ArpHeader, ARP_HDR_LEN, ARP_HTYPE_ETHERNET, ARP_OP_REPLY, ARP_OP_REQUEST};
use fluxedge_proto::ethernet::{EthHeader, ETH_HDR_LEN, ETH_P_ARP, ETH_P_IP};
use fluxedge_proto::icmp::{IcmpHeader, ICMP_ECHO_REPLY, ICMP_ECHO_REQUEST};
use fluxedge_proto::ipv4::{Ipv4Header, IPPROTO_ICMP, IPV4_HDR_LEN};
use fluxedge_proto::checksum_update;
use tracing::trace;

/// ARP replies are trimmed to exactly the two headers; trailing padding goes.
pub const ARP_FRAME_LEN: usize = ETH_HDR_LEN + ARP_HDR_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The frame was rewritten into a reply and should be transmitted.
    Reply,
    /// The frame is not for us or is malformed; release it.
    Discard,
}

/// Decide whether `frame` gets an answer and, if so, turn it into that
/// answer in place.
pub fn classify_and_reply(identity: &PortIdentity, frame: &mut FrameBuffer) -> Verdict {
    if frame.segment_count() > 1 {
        trace!(segments = frame.segment_count(), "discard: chained frame");
        return Verdict::Discard;
    }

    let reply_len = match reply_in_place(identity, frame.data_mut()) {
        Some(len) => len,
        None => return Verdict::Discard,
    };

    // reply_len never exceeds the received length
    match frame.set_len(reply_len) {
        Ok(()) => Verdict::Reply,
        Err(_) => Verdict::Discard,
    }
}

/// Rewrite `data` into a reply and return the reply's length, or `None`
/// (with `data` untouched) when the frame gets no answer.
pub fn reply_in_place(identity: &PortIdentity, data: &mut [u8]) -> Option<usize> {
    let eth = EthHeader::new_checked(&*data)?;
    let peer_mac = eth.src();
    if !peer_mac.is_unicast() {
        trace!(src = %peer_mac, "discard: non-unicast source");
        return None;
    }

    let l3_len = match eth.eth_type() {
        ETH_P_ARP => arp_reply(identity, &mut data[ETH_HDR_LEN..])?,
        ETH_P_IP => echo_reply(identity, &mut data[ETH_HDR_LEN..])?,
        _ => return None,
    };

    let mut eth = EthHeader::new_checked(&mut *data)?;
    eth.set_dst(peer_mac);
    eth.set_src(identity.mac);

    Some(ETH_HDR_LEN + l3_len)
}

fn arp_reply(identity: &PortIdentity, l3: &mut [u8]) -> Option<usize> {
    let arp = ArpHeader::new_checked(&*l3)?;

    if arp.hardware_type() != ARP_HTYPE_ETHERNET
        || arp.protocol_type() != ETH_P_IP
        || arp.hw_addr_len() != 6
        || arp.proto_addr_len() != 4
        || arp.opcode() != ARP_OP_REQUEST
    {
        return None;
    }

    let sender_mac = arp.sender_mac();
    let sender_ip = arp.sender_ip();
    if !sender_mac.is_unicast() || sender_ip.is_broadcast() {
        trace!(%sender_mac, %sender_ip, "discard: bogus ARP sender");
        return None;
    }

    // Addressed to us by hardware or protocol address
    if arp.target_mac() != identity.mac && arp.target_ip() != identity.ipv4 {
        return None;
    }

    let mut arp = ArpHeader::new_checked(l3)?;
    arp.set_opcode(ARP_OP_REPLY);
    arp.set_target(sender_mac, sender_ip);
    arp.set_sender(identity.mac, identity.ipv4);

    trace!(%sender_ip, %sender_mac, "ARP reply");
    Some(ARP_HDR_LEN)
}

fn echo_reply(identity: &PortIdentity, l3: &mut [u8]) -> Option<usize> {
    let ip = Ipv4Header::new_checked(&*l3)?;

    if ip.version() != 4
        || ip.ihl() != 5
        || ip.is_fragment()
        || ip.ttl() == 0
        || ip.src().is_unspecified()
        || ip.dst() != identity.ipv4
    {
        return None;
    }
    if ip.proto() != IPPROTO_ICMP {
        return None;
    }
    let peer_ip = ip.src();

    let icmp = IcmpHeader::new_checked(&l3[IPV4_HDR_LEN..])?;
    if icmp.kind() != ICMP_ECHO_REQUEST || icmp.code() != 0 {
        return None;
    }
    // type and code share the first checksummed word; code is 0 on both sides
    let check = checksum_update(
        icmp.checksum(),
        (ICMP_ECHO_REQUEST as u16) << 8,
        (ICMP_ECHO_REPLY as u16) << 8,
    );

    let (ip_bytes, icmp_bytes) = l3.split_at_mut(IPV4_HDR_LEN);

    let mut icmp = IcmpHeader::new_checked(icmp_bytes)?;
    icmp.set_kind(ICMP_ECHO_REPLY);
    icmp.set_checksum(check);

    // dst was our address, so the header checksum is unchanged by the swap
    let mut ip = Ipv4Header::new_checked(ip_bytes)?;
    ip.set_src(identity.ipv4);
    ip.set_dst(peer_ip);

    trace!(%peer_ip, "echo reply");
    Some(l3.len())
}
