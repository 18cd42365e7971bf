use std::fmt;

pub const ETH_HDR_LEN: usize = 14;

pub const ETH_P_IP: u16 = 0x0800;
pub const ETH_P_ARP: u16 = 0x0806;

/// 48-bit IEEE 802 hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    pub const BROADCAST: MacAddr = MacAddr([0xFF; 6]);
    pub const ZERO: MacAddr = MacAddr([0; 6]);

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let octets: [u8; 6] = bytes.try_into().ok()?;
        Some(MacAddr(octets))
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Group bit clear. Broadcast is a multicast address and is not unicast.
    pub fn is_unicast(&self) -> bool {
        self.0[0] & 0x01 == 0
    }

    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.0;
        write!(f, "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}", b[0], b[1], b[2], b[3], b[4], b[5])
    }
}

impl std::str::FromStr for MacAddr {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut octets = [0u8; 6];
        let mut parts = s.split(':');
        for octet in octets.iter_mut() {
            let part = parts.next().ok_or_else(|| format!("MAC address too short: {}", s))?;
            *octet = u8::from_str_radix(part, 16).map_err(|_| format!("Invalid MAC octet '{}' in {}", part, s))?;
        }
        if parts.next().is_some() {
            return Err(format!("MAC address too long: {}", s));
        }
        Ok(MacAddr(octets))
    }
}

/// Ethernet II header overlaid on the first 14 bytes of `buf`.
#[derive(Debug, Clone, Copy)]
pub struct EthHeader<T> {
    buf: T,
}

impl<T: AsRef<[u8]>> EthHeader<T> {
    pub fn new_checked(buf: T) -> Option<Self> {
        if buf.as_ref().len() < ETH_HDR_LEN {
            return None;
        }
        Some(Self { buf })
    }

    pub fn dst(&self) -> MacAddr {
        let b = self.buf.as_ref();
        MacAddr([b[0], b[1], b[2], b[3], b[4], b[5]])
    }

    pub fn src(&self) -> MacAddr {
        let b = self.buf.as_ref();
        MacAddr([b[6], b[7], b[8], b[9], b[10], b[11]])
    }

    pub fn eth_type(&self) -> u16 {
        let b = self.buf.as_ref();
        u16::from_be_bytes([b[12], b[13]])
    }

    pub fn payload(&self) -> &[u8] {
        &self.buf.as_ref()[ETH_HDR_LEN..]
    }

    pub fn into_inner(self) -> T {
        self.buf
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> EthHeader<T> {
    pub fn set_dst(&mut self, mac: MacAddr) {
        self.buf.as_mut()[0..6].copy_from_slice(&mac.0);
    }

    pub fn set_src(&mut self, mac: MacAddr) {
        self.buf.as_mut()[6..12].copy_from_slice(&mac.0);
    }

    pub fn set_eth_type(&mut self, eth_type: u16) {
        self.buf.as_mut()[12..14].copy_from_slice(&eth_type.to_be_bytes());
    }

    pub fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.buf.as_mut()[ETH_HDR_LEN..]
    }
}

pub fn parse_eth(data: &[u8]) -> Option<(EthHeader<&[u8]>, &[u8])> {
    let header = EthHeader::new_checked(&data[..ETH_HDR_LEN.min(data.len())])?;
    Some((header, &data[ETH_HDR_LEN..]))
}
