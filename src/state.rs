use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::time::Duration;

/// Result of a single probe attempt at one TTL.
///
/// Invariant: `timed_out` and `reached_destination` are never both true.
/// A timeout carries no responder and no meaningful RTT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    /// Router (or the destination itself) that answered; `None` when
    /// nothing answered before the deadline
    pub responder: Option<Ipv4Addr>,
    pub reached_destination: bool,
    pub timed_out: bool,
    /// Round-trip time; zero and meaningless when `timed_out`
    #[serde(with = "duration_serde")]
    pub rtt: Duration,
}

impl ProbeOutcome {
    /// A correlated reply from `responder` after `rtt`
    pub fn response(responder: Ipv4Addr, rtt: Duration, reached_destination: bool) -> Self {
        Self {
            responder: Some(responder),
            reached_destination,
            timed_out: false,
            rtt,
        }
    }

    /// No correlated reply before the deadline
    pub fn timeout() -> Self {
        Self {
            responder: None,
            reached_destination: false,
            timed_out: true,
            rtt: Duration::ZERO,
        }
    }
}

/// Aggregated result for one TTL: the first responder across the hop's
/// probes, the mean RTT of the probes that answered, and whether any of
/// them reached the destination. `timed_out` only when every probe at the
/// hop timed out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HopOutcome {
    pub responder: Option<Ipv4Addr>,
    pub reached_destination: bool,
    pub timed_out: bool,
    #[serde(with = "duration_serde")]
    pub rtt: Duration,
}

impl HopOutcome {
    /// Every probe at the hop timed out
    pub fn timeout() -> Self {
        Self {
            responder: None,
            reached_destination: false,
            timed_out: true,
            rtt: Duration::ZERO,
        }
    }
}

/// One probed hop, as collected for the JSON report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HopRecord {
    pub ttl: u8,
    pub responder: Option<Ipv4Addr>,
    /// Reverse-resolved name, when lookups are enabled and succeed
    pub hostname: Option<String>,
    pub timed_out: bool,
    pub reached_destination: bool,
    #[serde(with = "duration_serde")]
    pub rtt: Duration,
}

/// A complete trace run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceReport {
    pub hostname: String,
    pub resolved: Ipv4Addr,
    pub max_hops: u8,
    pub queries: u8,
    pub payload_len: usize,
    pub started_at: DateTime<Utc>,
    /// Destination answered before the hop budget ran out
    pub reached: bool,
    pub hops: Vec<HopRecord>,
}

/// Serde helper for Duration
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_micros().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let micros = u64::deserialize(deserializer)?;
        Ok(Duration::from_micros(micros))
    }
}
