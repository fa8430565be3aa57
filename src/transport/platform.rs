//! Cross-platform TCP-level keepalive, distinct from the session's own
//! Telnet NOP keepalive (spec §4.8) — this is the socket option that keeps
//! idle connections from being silently dropped by NAT/firewall state
//! tables, orthogonal to the application-level probe.
//!
//! Grounded in the reference `network_platform.rs`'s `enable_tcp_keepalive`
//! pair, unchanged in shape: raw `setsockopt(SOL_SOCKET, SO_KEEPALIVE)` via
//! `libc` on Unix and `winapi`'s `winsock2` on Windows.

#[cfg(unix)]
pub fn enable_tcp_keepalive(socket: std::os::unix::io::RawFd) -> std::io::Result<()> {
    let optval: libc::c_int = 1;
    let ret = unsafe {
        libc::setsockopt(
            socket,
            libc::SOL_SOCKET,
            libc::SO_KEEPALIVE,
            &optval as *const _ as *const libc::c_void,
            std::mem::size_of_val(&optval) as libc::socklen_t,
        )
    };
    if ret != 0 {
        Err(std::io::Error::last_os_error())
    } else {
        Ok(())
    }
}

#[cfg(windows)]
pub fn enable_tcp_keepalive(socket: u64) -> std::io::Result<()> {
    use winapi::um::winsock2::{setsockopt, SOCKET, SOL_SOCKET, SOCKET_ERROR, SO_KEEPALIVE};
    let optval: i32 = 1;
    let ret = unsafe {
        setsockopt(
            socket as SOCKET,
            SOL_SOCKET,
            SO_KEEPALIVE,
            &optval as *const _ as *const i8,
            std::mem::size_of_val(&optval) as i32,
        )
    };
    if ret == SOCKET_ERROR {
        Err(std::io::Error::last_os_error())
    } else {
        Ok(())
    }
}
