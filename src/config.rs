use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::cli::{Args, DEFAULT_PAYLOAD};

/// Runtime configuration derived from CLI args
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Target hostname (or textual IP)
    pub hostname: String,
    /// Maximum TTL
    pub max_hops: u8,
    /// Probes per hop
    pub queries: u8,
    /// Probe timeout
    #[serde(with = "duration_serde")]
    pub timeout: Duration,
    /// Payload sent with every probe
    pub payload: String,
    /// Enable reverse DNS lookups
    pub dns_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hostname: String::new(),
            max_hops: 64,
            queries: 3,
            timeout: Duration::from_secs(3),
            payload: DEFAULT_PAYLOAD.to_string(),
            dns_enabled: true,
        }
    }
}

impl From<&Args> for Config {
    fn from(args: &Args) -> Self {
        Self {
            hostname: args.hostname.clone(),
            max_hops: args.max_hops,
            queries: args.queries,
            timeout: args.timeout_duration(),
            payload: args.payload.clone(),
            dns_enabled: !args.no_dns,
        }
    }
}

/// Serde helper for Duration
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Ok(Duration::from_secs_f64(secs))
    }
}
