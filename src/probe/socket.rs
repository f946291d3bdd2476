use anyhow::{Context, Result, anyhow};
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::io;
use std::mem::MaybeUninit;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Receive buffer size for inbound ICMP datagrams (MTU-sized bound)
pub const RECV_BUFFER_LEN: usize = 1500;

/// Check that raw ICMP sockets are available before any probing starts.
/// Privilege problems surface here with a fix hint instead of mid-trace.
pub fn check_permissions() -> Result<()> {
    if open_icmp_listener(Duration::from_secs(1)).is_ok() {
        return Ok(());
    }

    let binary_path = std::env::current_exe()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| "hoptrail".to_string());

    Err(anyhow!(
        "Insufficient permissions for raw sockets.\n\n\
         Fix options:\n\
         \u{2022} Run with sudo: sudo hoptrail <target>\n\
         \u{2022} Add capability: sudo setcap cap_net_raw+ep {}",
        binary_path
    ))
}

/// Create the UDP socket a probe is sent from, with its TTL pinned so the
/// datagram expires exactly at the target hop
pub fn open_udp_sender(ttl: u8) -> Result<Socket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
        .context("Failed to create UDP socket")?;
    socket.set_nonblocking(false)?;
    socket
        .set_ttl(ttl as u32)
        .with_context(|| format!("Failed to set TTL {}", ttl))?;
    Ok(socket)
}

/// Create the raw ICMP socket replies arrive on, with a receive deadline
pub fn open_icmp_listener(timeout: Duration) -> Result<Socket> {
    let socket = Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::ICMPV4))
        .context("Failed to create raw ICMP socket (need root/CAP_NET_RAW)")?;
    socket.set_nonblocking(false)?;
    socket
        .set_read_timeout(Some(timeout))
        .context("Failed to set receive timeout")?;
    Ok(socket)
}

/// Send one probe datagram to the target
pub fn send_probe_datagram(
    socket: &Socket,
    payload: &[u8],
    dest: Ipv4Addr,
    port: u16,
) -> Result<usize> {
    let addr = SockAddr::from(SocketAddr::new(IpAddr::V4(dest), port));
    let sent = socket
        .send_to(payload, &addr)
        .context("Failed to send UDP probe")?;
    Ok(sent)
}

/// Receive one datagram. socket2 hands the kernel an uninitialized buffer;
/// exactly `len` bytes are initialized on a successful read.
pub fn recv_datagram<'a>(
    socket: &Socket,
    buf: &'a mut [MaybeUninit<u8>; RECV_BUFFER_LEN],
) -> io::Result<(&'a [u8], Option<Ipv4Addr>)> {
    let (len, addr) = socket.recv_from(buf)?;
    let packet = unsafe { std::slice::from_raw_parts(buf.as_ptr() as *const u8, len) };
    let source = addr.as_socket_ipv4().map(|sa| *sa.ip());
    Ok((packet, source))
}
