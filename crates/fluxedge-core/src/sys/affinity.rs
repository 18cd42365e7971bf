use std::io;
use std::mem;

/// Number of processors currently online.
pub fn online_cores() -> usize {
    let n = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_ONLN) };
    if n < 1 { 1 } else { n as usize }
}

/// Restrict the calling thread to `core_id`.
pub fn pin_current_thread(core_id: usize) -> io::Result<()> {
    if core_id >= libc::CPU_SETSIZE as usize {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, format!("core {} out of range", core_id)));
    }

    unsafe {
        let mut cpuset: libc::cpu_set_t = mem::zeroed();
        libc::CPU_SET(core_id, &mut cpuset);
        // pid 0 targets the calling thread
        if libc::sched_setaffinity(0, mem::size_of::<libc::cpu_set_t>(), &cpuset) != 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}
