pub mod arp;
pub mod ethernet;
pub mod icmp;
pub mod ipv4;

pub use arp::{ArpHeader, parse_arp};
pub use ethernet::{EthHeader, MacAddr, parse_eth};
pub use icmp::{IcmpHeader, parse_icmp};
pub use ipv4::{Ipv4Header, parse_ipv4};

/// RFC 1071 internet checksum over `data`.
///
/// Returns the one's complement of the folded sum, so a buffer that already
/// carries a correct checksum yields zero.
pub fn checksum(data: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    let mut i = 0;
    while i + 1 < data.len() {
        let word = u16::from_be_bytes([data[i], data[i+1]]);
        sum += word as u32;
        i += 2;
    }
    if i < data.len() {
        sum += (data[i] as u32) << 8;
    }

    while (sum >> 16) != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }

    !sum as u16
}

/// Incrementally update `old_check` after one 16-bit word of the covered data
/// changed from `old_word` to `new_word` (RFC 1624, eqn. 3).
pub fn checksum_update(old_check: u16, old_word: u16, new_word: u16) -> u16 {
    let mut sum = (!old_check) as u32;
    sum += (!old_word) as u32;
    sum += new_word as u32;

    sum = (sum & 0xFFFF) + (sum >> 16);
    sum = (sum & 0xFFFF) + (sum >> 16);

    !sum as u16
}
