use std::net::Ipv4Addr;

/// Size of an IPv4 header without options.
pub const IPV4_HDR_LEN: usize = 20;

pub const IPPROTO_ICMP: u8 = 1;

const IP_MF: u16 = 0x2000;
const IP_OFFSET_MASK: u16 = 0x1FFF;

#[derive(Debug, Clone, Copy)]
pub struct Ipv4Header<T> {
    buf: T,
}

impl<T: AsRef<[u8]>> Ipv4Header<T> {
    /// Overlays the fixed part of the header. Option bytes, if any, are not
    /// checked here; callers that care compare `ihl()` against 5.
    pub fn new_checked(buf: T) -> Option<Self> {
        if buf.as_ref().len() < IPV4_HDR_LEN {
            return None;
        }
        Some(Self { buf })
    }

    pub fn version(&self) -> u8 {
        self.buf.as_ref()[0] >> 4
    }

    pub fn ihl(&self) -> u8 {
        self.buf.as_ref()[0] & 0x0F
    }

    pub fn header_len(&self) -> usize {
        (self.ihl() as usize) * 4
    }

    pub fn total_len(&self) -> u16 {
        let b = self.buf.as_ref();
        u16::from_be_bytes([b[2], b[3]])
    }

    pub fn frag_off(&self) -> u16 {
        let b = self.buf.as_ref();
        u16::from_be_bytes([b[6], b[7]])
    }

    /// True for any fragment: a non-zero offset or the more-fragments flag.
    pub fn is_fragment(&self) -> bool {
        let frag = self.frag_off();
        frag & IP_OFFSET_MASK != 0 || frag & IP_MF != 0
    }

    pub fn ttl(&self) -> u8 {
        self.buf.as_ref()[8]
    }

    pub fn proto(&self) -> u8 {
        self.buf.as_ref()[9]
    }

    pub fn checksum(&self) -> u16 {
        let b = self.buf.as_ref();
        u16::from_be_bytes([b[10], b[11]])
    }

    pub fn src(&self) -> Ipv4Addr {
        let b = self.buf.as_ref();
        Ipv4Addr::new(b[12], b[13], b[14], b[15])
    }

    pub fn dst(&self) -> Ipv4Addr {
        let b = self.buf.as_ref();
        Ipv4Addr::new(b[16], b[17], b[18], b[19])
    }

    pub fn is_valid(&self) -> bool {
        let len = self.header_len();
        let b = self.buf.as_ref();
        len >= IPV4_HDR_LEN && b.len() >= len && crate::checksum(&b[..len]) == 0
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> Ipv4Header<T> {
    pub fn set_src(&mut self, addr: Ipv4Addr) {
        self.buf.as_mut()[12..16].copy_from_slice(&addr.octets());
    }

    pub fn set_dst(&mut self, addr: Ipv4Addr) {
        self.buf.as_mut()[16..20].copy_from_slice(&addr.octets());
    }

    pub fn set_checksum(&mut self, check: u16) {
        self.buf.as_mut()[10..12].copy_from_slice(&check.to_be_bytes());
    }

    /// Recompute the header checksum over `header_len()` bytes.
    pub fn fill_checksum(&mut self) {
        self.set_checksum(0);
        let len = self.header_len().min(self.buf.as_ref().len());
        let check = crate::checksum(&self.buf.as_ref()[..len]);
        self.set_checksum(check);
    }
}

pub fn parse_ipv4(data: &[u8]) -> Option<(Ipv4Header<&[u8]>, &[u8])> {
    let header = Ipv4Header::new_checked(data)?;

    let header_len = header.header_len();
    if header_len < IPV4_HDR_LEN || data.len() < header_len {
        return None;
    }

    Some((header, &data[header_len..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ipv4_parsing() {
        let mut data = [0u8; 24];
        data[0] = 0x45; // Version 4, IHL 5 (20 bytes)
        data[2..4].copy_from_slice(&24u16.to_be_bytes()); // Total length
        data[8] = 64;
        data[9] = IPPROTO_ICMP;
        data[12..16].copy_from_slice(&[192, 168, 1, 1]); // src
        data[16..20].copy_from_slice(&[192, 168, 1, 100]); // dst
        data[20..24].copy_from_slice(&[0x11, 0x22, 0x33, 0x44]); // payload

        let csum = crate::checksum(&data[0..20]);
        data[10..12].copy_from_slice(&csum.to_be_bytes());

        let (header, payload) = parse_ipv4(&data).expect("Should parse ipv4");
        assert_eq!(header.version(), 4);
        assert_eq!(header.ihl(), 5);
        assert_eq!(header.header_len(), 20);
        assert_eq!(header.total_len(), 24);
        assert_eq!(header.ttl(), 64);
        assert_eq!(header.proto(), IPPROTO_ICMP);
        assert_eq!(header.src(), Ipv4Addr::new(192, 168, 1, 1));
        assert_eq!(header.dst(), Ipv4Addr::new(192, 168, 1, 100));
        assert!(header.is_valid());
        assert!(!header.is_fragment());
        assert_eq!(payload, &[0x11, 0x22, 0x33, 0x44]);
    }

    #[test]
    fn test_ipv4_with_options() {
        let mut data = [0u8; 28];
        data[0] = 0x47; // Version 4, IHL 7 (28 bytes)
        data[2..4].copy_from_slice(&28u16.to_be_bytes());

        let (header, payload) = parse_ipv4(&data).expect("Should parse ipv4");
        assert_eq!(header.header_len(), 28);
        assert_eq!(payload.len(), 0);
    }

    #[test]
    fn test_ipv4_bad_ihl() {
        let mut data = [0u8; 20];
        data[0] = 0x44;
        assert!(parse_ipv4(&data).is_none());
        data[0] = 0x46;
        assert!(parse_ipv4(&data).is_none());
    }

    #[test]
    fn test_ipv4_fragment_bits() {
        let mut data = [0u8; 20];
        data[0] = 0x45;

        data[6..8].copy_from_slice(&0x4000u16.to_be_bytes()); // DF only
        assert!(!Ipv4Header::new_checked(&data[..]).unwrap().is_fragment());

        data[6..8].copy_from_slice(&0x2000u16.to_be_bytes()); // MF
        assert!(Ipv4Header::new_checked(&data[..]).unwrap().is_fragment());

        data[6..8].copy_from_slice(&0x00B9u16.to_be_bytes()); // offset 185
        assert!(Ipv4Header::new_checked(&data[..]).unwrap().is_fragment());
    }

    #[test]
    fn test_ipv4_swap_keeps_checksum_valid() {
        let mut data = [0u8; 20];
        data[0] = 0x45;
        data[8] = 64;
        data[9] = IPPROTO_ICMP;
        data[12..16].copy_from_slice(&[10, 0, 0, 5]);
        data[16..20].copy_from_slice(&[192, 168, 1, 254]);

        let mut ip = Ipv4Header::new_checked(&mut data[..]).unwrap();
        ip.fill_checksum();
        let (src, dst) = (ip.src(), ip.dst());
        ip.set_src(dst);
        ip.set_dst(src);

        assert!(ip.is_valid());
        assert_eq!(ip.src(), Ipv4Addr::new(192, 168, 1, 254));
        assert_eq!(ip.dst(), Ipv4Addr::new(10, 0, 0, 5));
    }
}
