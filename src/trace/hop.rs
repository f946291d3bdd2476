use anyhow::Result;
use std::net::Ipv4Addr;
use std::time::Duration;

use crate::probe::Prober;
use crate::state::{HopOutcome, ProbeOutcome};

/// Probe one TTL `queries` times and aggregate the outcomes.
///
/// Each attempt probes its own destination port (`base_port + attempt`) so a
/// stale or duplicated ICMP reply can never be credited to the wrong probe.
/// Timeouts are dropped from the aggregate: the hop's RTT is the mean over
/// the probes that answered, its responder is the first that answered, and
/// one probe reaching the destination marks the hop as final.
pub fn probe_hop(
    prober: &dyn Prober,
    dest: Ipv4Addr,
    base_port: u16,
    ttl: u8,
    queries: u8,
    payload: &[u8],
    timeout: Duration,
) -> Result<HopOutcome> {
    let mut responder = None;
    let mut reached_destination = false;
    let mut total = Duration::ZERO;
    let mut responses: u32 = 0;

    for attempt in 0..queries {
        let port = base_port + attempt as u16;
        let outcome: ProbeOutcome = prober.send_probe(dest, port, ttl, payload, timeout)?;
        if outcome.timed_out {
            continue;
        }
        if responder.is_none() {
            responder = outcome.responder;
        }
        reached_destination |= outcome.reached_destination;
        total += outcome.rtt;
        responses += 1;
    }

    if responses == 0 {
        return Ok(HopOutcome::timeout());
    }

    Ok(HopOutcome {
        responder,
        reached_destination,
        timed_out: false,
        rtt: total / responses,
    })
}
