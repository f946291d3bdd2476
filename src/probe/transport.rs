use anyhow::{Context, Result};
use std::io;
use std::mem::MaybeUninit;
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};
use tracing::trace;

use crate::probe::parse::{IcmpKind, parse_icmp_reply};
use crate::probe::socket::{
    RECV_BUFFER_LEN, open_icmp_listener, open_udp_sender, recv_datagram, send_probe_datagram,
};
use crate::state::ProbeOutcome;

/// Single-probe transport: send one UDP datagram with a pinned TTL and wait
/// for the ICMP reply it provokes.
///
/// Injected into the engine so tests can substitute a scripted stub.
pub trait Prober {
    /// Send one probe to `(dest, port)` with the given TTL and wait up to
    /// `timeout` for a correlated reply.
    ///
    /// A timeout is a normal outcome. `Err` means an environment failure
    /// (socket creation, socket options, send) and aborts the trace rather
    /// than masquerading as an unresponsive hop.
    fn send_probe(
        &self,
        dest: Ipv4Addr,
        port: u16,
        ttl: u8,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<ProbeOutcome>;
}

/// The real transport. Each call owns one UDP sender and one raw ICMP
/// listener; both are released when the call returns, on every path.
pub struct NetworkProber;

impl Prober for NetworkProber {
    fn send_probe(
        &self,
        dest: Ipv4Addr,
        port: u16,
        ttl: u8,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<ProbeOutcome> {
        // Listener first: a close-by router can answer faster than we could
        // open the socket after sending.
        let listener = open_icmp_listener(timeout)?;
        let sender = open_udp_sender(ttl)?;

        let started = Instant::now();
        send_probe_datagram(&sender, payload, dest, port)?;
        let deadline = started + timeout;

        trace!(%dest, port, ttl, "probe sent");

        let mut buf = [MaybeUninit::<u8>::uninit(); RECV_BUFFER_LEN];
        loop {
            let now = Instant::now();
            if now >= deadline {
                return Ok(ProbeOutcome::timeout());
            }
            // Re-arm the receive timeout with the remaining time so
            // discarded datagrams don't stretch the overall deadline
            listener
                .set_read_timeout(Some(deadline - now))
                .context("Failed to set receive timeout")?;

            let (packet, source) = match recv_datagram(&listener, &mut buf) {
                Ok(received) => received,
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                    ) =>
                {
                    return Ok(ProbeOutcome::timeout());
                }
                Err(e) => return Err(e).context("Failed to receive ICMP reply"),
            };

            // Unparseable or uncorrelated datagrams are background noise on
            // a raw socket; skip them and keep waiting
            let Some(reply) = parse_icmp_reply(packet) else {
                trace!(len = packet.len(), "discarding unparseable datagram");
                continue;
            };
            if reply.orig_dest_port != port {
                trace!(
                    got = reply.orig_dest_port,
                    expected = port,
                    "discarding reply for another probe"
                );
                continue;
            }
            let Some(responder) = source else {
                continue;
            };

            let reached = reply.kind == IcmpKind::DestinationUnreachable;
            return Ok(ProbeOutcome::response(responder, started.elapsed(), reached));
        }
    }
}
