use std::ffi::CString;
use std::io;
use std::mem;
use std::os::unix::io::RawFd;

pub fn if_nametoindex(name: &str) -> io::Result<u32> {
    let name_cstr = CString::new(name).map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "Invalid interface name"))?;
    let idx = unsafe { libc::if_nametoindex(name_cstr.as_ptr()) };
    if idx == 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(idx)
}

/// Hardware address of interface `name`, queried through `fd` (any socket).
pub fn if_hwaddr(fd: RawFd, name: &str) -> io::Result<[u8; 6]> {
    let bytes = name.as_bytes();
    if bytes.is_empty() || bytes.len() >= libc::IFNAMSIZ || bytes.contains(&0) {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "Invalid interface name"));
    }

    let mut req: libc::ifreq = unsafe { mem::zeroed() };
    for (dst, &src) in req.ifr_name.iter_mut().zip(bytes) {
        *dst = src as libc::c_char;
    }

    let ret = unsafe { libc::ioctl(fd, libc::SIOCGIFHWADDR, &mut req as *mut libc::ifreq) };
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }

    let sa_data = unsafe { req.ifr_ifru.ifru_hwaddr.sa_data };
    let mut mac = [0u8; 6];
    for (dst, &src) in mac.iter_mut().zip(sa_data.iter()) {
        *dst = src as u8;
    }
    Ok(mac)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loopback_index() {
        // "lo" exists in every network namespace
        assert!(if_nametoindex("lo").unwrap() > 0);
    }

    #[test]
    fn test_invalid_names() {
        assert!(if_nametoindex("bad\0name").is_err());
        assert!(if_hwaddr(-1, "").is_err());
        assert!(if_hwaddr(-1, "an-interface-name-that-is-too-long").is_err());
    }
}
