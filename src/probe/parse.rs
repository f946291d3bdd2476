//! Decoding of inbound ICMP datagrams.
//!
//! A raw ICMP socket delivers the full IP packet. A traceroute reply nests
//! three layers: the outer IP header, the ICMP header, and the leading bytes
//! of the original probe (its IP header plus UDP header) quoted back by the
//! router. Every offset is checked against the actual slice length before it
//! is read; no length field from the wire is trusted.

/// Minimum IPv4 header length (IHL = 5)
const MIN_IP_HEADER_LEN: usize = 20;
/// ICMP header length
const ICMP_HEADER_LEN: usize = 8;
/// UDP header length
const UDP_HEADER_LEN: usize = 8;
/// Offset of the protocol byte within an IPv4 header
const IP_PROTOCOL_OFFSET: usize = 9;
/// Offset of the destination port within a UDP header
const UDP_DEST_PORT_OFFSET: usize = 2;

const IPPROTO_ICMP: u8 = 1;
const ICMP_DEST_UNREACHABLE: u8 = 3;
const ICMP_TIME_EXCEEDED: u8 = 11;

/// The two ICMP control messages a UDP traceroute probe can provoke
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IcmpKind {
    /// TTL expired at an intermediate router
    TimeExceeded,
    /// Probe arrived: the destination has no listener on the probed port
    DestinationUnreachable,
}

/// A decoded traceroute reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IcmpReply {
    pub kind: IcmpKind,
    /// UDP destination port of the original outbound probe, used to match
    /// the reply to the probe that provoked it
    pub orig_dest_port: u16,
}

/// IPv4 header length in bytes, from the IHL nibble
fn ip_header_len(first_byte: u8) -> usize {
    ((first_byte & 0x0f) as usize) * 4
}

/// Decode one inbound datagram into a traceroute reply.
///
/// Returns `None` for anything that is not a well-formed Time Exceeded or
/// Destination Unreachable message quoting a UDP probe: truncated packets,
/// other ICMP types, other protocols. A raw socket sees plenty of unrelated
/// traffic, so rejection is the normal case, not an error.
pub fn parse_icmp_reply(packet: &[u8]) -> Option<IcmpReply> {
    if packet.len() < MIN_IP_HEADER_LEN + ICMP_HEADER_LEN {
        return None;
    }

    if packet[IP_PROTOCOL_OFFSET] != IPPROTO_ICMP {
        return None;
    }

    // The outer header may carry IP options (IHL > 5)
    let outer_len = ip_header_len(packet[0]);
    if outer_len < MIN_IP_HEADER_LEN || packet.len() < outer_len + ICMP_HEADER_LEN {
        return None;
    }

    let kind = match packet[outer_len] {
        ICMP_TIME_EXCEEDED => IcmpKind::TimeExceeded,
        ICMP_DEST_UNREACHABLE => IcmpKind::DestinationUnreachable,
        _ => return None,
    };

    // The ICMP payload quotes the original probe: inner IP header, then the
    // UDP header. The inner header carries its own IHL.
    let inner_offset = outer_len + ICMP_HEADER_LEN;
    if packet.len() < inner_offset + MIN_IP_HEADER_LEN + UDP_HEADER_LEN {
        return None;
    }

    let inner_len = ip_header_len(packet[inner_offset]);
    if inner_len < MIN_IP_HEADER_LEN || packet.len() < inner_offset + inner_len + UDP_HEADER_LEN {
        return None;
    }

    let port_offset = inner_offset + inner_len + UDP_DEST_PORT_OFFSET;
    let orig_dest_port = u16::from_be_bytes([packet[port_offset], packet[port_offset + 1]]);

    Some(IcmpReply {
        kind,
        orig_dest_port,
    })
}
