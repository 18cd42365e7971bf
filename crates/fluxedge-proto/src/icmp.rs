pub const ICMP_HDR_LEN: usize = 4;

pub const ICMP_ECHO_REPLY: u8 = 0;
pub const ICMP_ECHO_REQUEST: u8 = 8;

#[derive(Debug, Clone, Copy)]
pub struct IcmpHeader<T> {
    buf: T,
}

impl<T: AsRef<[u8]>> IcmpHeader<T> {
    pub fn new_checked(buf: T) -> Option<Self> {
        if buf.as_ref().len() < ICMP_HDR_LEN {
            return None;
        }
        Some(Self { buf })
    }

    pub fn kind(&self) -> u8 {
        self.buf.as_ref()[0]
    }

    pub fn code(&self) -> u8 {
        self.buf.as_ref()[1]
    }

    pub fn checksum(&self) -> u16 {
        let b = self.buf.as_ref();
        u16::from_be_bytes([b[2], b[3]])
    }

    pub fn payload(&self) -> &[u8] {
        &self.buf.as_ref()[ICMP_HDR_LEN..]
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> IcmpHeader<T> {
    pub fn set_kind(&mut self, kind: u8) {
        self.buf.as_mut()[0] = kind;
    }

    pub fn set_code(&mut self, code: u8) {
        self.buf.as_mut()[1] = code;
    }

    pub fn set_checksum(&mut self, check: u16) {
        self.buf.as_mut()[2..4].copy_from_slice(&check.to_be_bytes());
    }
}

pub fn parse_icmp(data: &[u8]) -> Option<(IcmpHeader<&[u8]>, &[u8])> {
    let header = IcmpHeader::new_checked(&data[..ICMP_HDR_LEN.min(data.len())])?;
    Some((header, &data[ICMP_HDR_LEN..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_icmp_parsing() {
        let mut data = [0u8; 8];
        data[0] = ICMP_ECHO_REQUEST;
        data[1] = 0;
        data[2..4].copy_from_slice(&0xf7feu16.to_be_bytes()); // checksum
        data[4..8].copy_from_slice(&[0x11, 0x22, 0x33, 0x44]); // body

        let (header, payload) = parse_icmp(&data).expect("Should parse icmp");
        assert_eq!(header.kind(), ICMP_ECHO_REQUEST);
        assert_eq!(header.code(), 0);
        assert_eq!(header.checksum(), 0xf7fe);
        assert_eq!(payload, &[0x11, 0x22, 0x33, 0x44]);
    }

    #[test]
    fn test_icmp_too_short() {
        assert!(parse_icmp(&[8, 0, 0]).is_none());
    }

    #[test]
    fn test_icmp_mutation() {
        let mut data = [ICMP_ECHO_REQUEST, 0, 0, 0, 0xAB];
        let mut icmp = IcmpHeader::new_checked(&mut data[..]).unwrap();
        icmp.set_kind(ICMP_ECHO_REPLY);
        icmp.set_checksum(0x1234);
        assert_eq!(icmp.payload(), &[0xAB]);
        assert_eq!(data, [ICMP_ECHO_REPLY, 0, 0x12, 0x34, 0xAB]);
    }
}
