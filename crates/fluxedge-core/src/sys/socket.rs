use std::io;
use std::mem;
use std::os::unix::io::RawFd;
use libc::{
    socket, bind, recvfrom, send, close,
    AF_PACKET, SOCK_RAW, SOCK_NONBLOCK, SOCK_CLOEXEC, ETH_P_ALL, MSG_TRUNC,
    PACKET_OUTGOING, EAGAIN, EWOULDBLOCK, ENOBUFS, EINTR,
    sockaddr, sockaddr_ll, socklen_t, c_void,
};

/// Raw link-layer socket receiving every protocol, non-blocking.
pub fn create_packet_socket() -> io::Result<RawFd> {
    let protocol = (ETH_P_ALL as u16).to_be() as i32;
    let fd = unsafe { socket(AF_PACKET, SOCK_RAW | SOCK_NONBLOCK | SOCK_CLOEXEC, protocol) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(fd)
}

pub fn bind_packet_socket(fd: RawFd, ifindex: u32) -> io::Result<()> {
    let mut sa: sockaddr_ll = unsafe { mem::zeroed() };
    sa.sll_family = AF_PACKET as u16;
    sa.sll_protocol = (ETH_P_ALL as u16).to_be();
    sa.sll_ifindex = ifindex as i32;

    let ret = unsafe {
        bind(fd, &sa as *const _ as *const sockaddr, mem::size_of::<sockaddr_ll>() as socklen_t)
    };

    if ret < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

fn would_block(err: &io::Error) -> bool {
    matches!(err.raw_os_error(), Some(e) if e == EAGAIN || e == EWOULDBLOCK)
}

/// Receive one inbound frame into `buf`.
///
/// Returns `Ok(None)` once the socket queue is empty. Frames we transmitted
/// ourselves (looped back by the kernel) and frames larger than `buf` are
/// consumed and skipped.
pub fn recv_frame(fd: RawFd, buf: &mut [u8]) -> io::Result<Option<usize>> {
    loop {
        let mut sa: sockaddr_ll = unsafe { mem::zeroed() };
        let mut sa_len = mem::size_of::<sockaddr_ll>() as socklen_t;

        let ret = unsafe {
            recvfrom(
                fd,
                buf.as_mut_ptr() as *mut c_void,
                buf.len(),
                MSG_TRUNC,
                &mut sa as *mut _ as *mut sockaddr,
                &mut sa_len,
            )
        };

        if ret < 0 {
            let err = io::Error::last_os_error();
            if would_block(&err) {
                return Ok(None);
            }
            if err.raw_os_error() == Some(EINTR) {
                continue;
            }
            return Err(err);
        }

        let len = ret as usize;
        if sa.sll_pkttype == PACKET_OUTGOING as u8 || len > buf.len() {
            continue;
        }
        return Ok(Some(len));
    }
}

/// Queue one frame for transmission.
///
/// Returns `Ok(false)` when the device queue is full; the caller keeps the
/// frame.
pub fn send_frame(fd: RawFd, frame: &[u8]) -> io::Result<bool> {
    loop {
        let ret = unsafe { send(fd, frame.as_ptr() as *const c_void, frame.len(), 0) };
        if ret >= 0 {
            return Ok(true);
        }

        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(EINTR) => continue,
            Some(e) if e == ENOBUFS => return Ok(false),
            _ if would_block(&err) => return Ok(false),
            _ => return Err(err),
        }
    }
}

pub fn close_socket(fd: RawFd) -> io::Result<()> {
    let ret = unsafe { close(fd) };
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
