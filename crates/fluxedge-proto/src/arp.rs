//! ARP for Ethernet/IPv4 (RFC 826).
//!
//! Only the 28-byte Ethernet/IPv4 layout is modelled: hardware address length
//! 6, protocol address length 4. Requests with other lengths are still
//! overlaid so the caller can inspect and reject them.

use crate::ethernet::MacAddr;
use std::net::Ipv4Addr;

pub const ARP_HDR_LEN: usize = 28;

pub const ARP_HTYPE_ETHERNET: u16 = 1;
pub const ARP_OP_REQUEST: u16 = 1;
pub const ARP_OP_REPLY: u16 = 2;

#[derive(Debug, Clone, Copy)]
pub struct ArpHeader<T> {
    buf: T,
}

impl<T: AsRef<[u8]>> ArpHeader<T> {
    pub fn new_checked(buf: T) -> Option<Self> {
        if buf.as_ref().len() < ARP_HDR_LEN {
            return None;
        }
        Some(Self { buf })
    }

    fn read_u16(&self, at: usize) -> u16 {
        let b = self.buf.as_ref();
        u16::from_be_bytes([b[at], b[at + 1]])
    }

    fn read_mac(&self, at: usize) -> MacAddr {
        let b = self.buf.as_ref();
        MacAddr([b[at], b[at + 1], b[at + 2], b[at + 3], b[at + 4], b[at + 5]])
    }

    fn read_ip(&self, at: usize) -> Ipv4Addr {
        let b = self.buf.as_ref();
        Ipv4Addr::new(b[at], b[at + 1], b[at + 2], b[at + 3])
    }

    pub fn hardware_type(&self) -> u16 {
        self.read_u16(0)
    }

    pub fn protocol_type(&self) -> u16 {
        self.read_u16(2)
    }

    pub fn hw_addr_len(&self) -> u8 {
        self.buf.as_ref()[4]
    }

    pub fn proto_addr_len(&self) -> u8 {
        self.buf.as_ref()[5]
    }

    pub fn opcode(&self) -> u16 {
        self.read_u16(6)
    }

    pub fn sender_mac(&self) -> MacAddr {
        self.read_mac(8)
    }

    pub fn sender_ip(&self) -> Ipv4Addr {
        self.read_ip(14)
    }

    pub fn target_mac(&self) -> MacAddr {
        self.read_mac(18)
    }

    pub fn target_ip(&self) -> Ipv4Addr {
        self.read_ip(24)
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> ArpHeader<T> {
    fn write(&mut self, at: usize, bytes: &[u8]) {
        self.buf.as_mut()[at..at + bytes.len()].copy_from_slice(bytes);
    }

    pub fn set_hardware_type(&mut self, htype: u16) {
        self.write(0, &htype.to_be_bytes());
    }

    pub fn set_protocol_type(&mut self, ptype: u16) {
        self.write(2, &ptype.to_be_bytes());
    }

    pub fn set_hw_addr_len(&mut self, len: u8) {
        self.buf.as_mut()[4] = len;
    }

    pub fn set_proto_addr_len(&mut self, len: u8) {
        self.buf.as_mut()[5] = len;
    }

    pub fn set_opcode(&mut self, op: u16) {
        self.write(6, &op.to_be_bytes());
    }

    pub fn set_sender(&mut self, mac: MacAddr, ip: Ipv4Addr) {
        self.write(8, &mac.0);
        self.write(14, &ip.octets());
    }

    pub fn set_target(&mut self, mac: MacAddr, ip: Ipv4Addr) {
        self.write(18, &mac.0);
        self.write(24, &ip.octets());
    }
}

pub fn parse_arp(data: &[u8]) -> Option<(ArpHeader<&[u8]>, &[u8])> {
    let header = ArpHeader::new_checked(&data[..ARP_HDR_LEN.min(data.len())])?;
    Some((header, &data[ARP_HDR_LEN..]))
}
