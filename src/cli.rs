use clap::Parser;
use std::time::Duration;

/// Default probe payload. 32 bytes, so the default header line reports the
/// classic "32 byte packets".
pub const DEFAULT_PAYLOAD: &str = "hoptrail udp probe payload bytes";

/// Sequential UDP traceroute for IPv4
#[derive(Parser, Debug, Clone)]
#[command(name = "hoptrail")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Target host to trace (IP address or hostname)
    pub hostname: String,

    /// Maximum TTL (hops)
    #[arg(short = 'm', long = "max-hops", default_value = "64")]
    pub max_hops: u8,

    /// Probes per hop
    #[arg(short = 'q', long = "queries", default_value = "3")]
    pub queries: u8,

    /// Probe timeout in seconds
    #[arg(long = "timeout", default_value = "3")]
    pub timeout: f64,

    /// Probe payload text (its byte length is reported in the header line)
    #[arg(long = "payload", default_value = DEFAULT_PAYLOAD)]
    pub payload: String,

    /// Skip reverse DNS lookups
    #[arg(long = "no-dns")]
    pub no_dns: bool,

    /// Output a JSON report instead of per-hop lines
    #[arg(long = "json")]
    pub json: bool,
}

impl Args {
    /// Get timeout as Duration
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs_f64(self.timeout)
    }

    /// Validate arguments
    pub fn validate(&self) -> Result<(), String> {
        if self.max_hops == 0 {
            return Err("Max hops must be at least 1".into());
        }

        if self.queries == 0 {
            return Err("Queries must be at least 1".into());
        }

        // Keeps every hop's port range inside the classic 33434+ window
        const MAX_QUERIES: u8 = 16;
        if self.queries > MAX_QUERIES {
            return Err(format!("Queries cannot exceed {}", MAX_QUERIES));
        }

        if self.timeout <= 0.0 {
            return Err("Timeout must be positive".into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["hoptrail", "dns.google.com"]);
        assert_eq!(args.hostname, "dns.google.com");
        assert_eq!(args.max_hops, 64);
        assert_eq!(args.queries, 3);
        assert_eq!(args.payload.len(), 32);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_queries() {
        let args = Args::parse_from(["hoptrail", "-q", "0", "8.8.8.8"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_max_hops() {
        let args = Args::parse_from(["hoptrail", "-m", "0", "8.8.8.8"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_rejects_non_positive_timeout() {
        let args = Args::parse_from(["hoptrail", "--timeout", "0", "8.8.8.8"]);
        assert!(args.validate().is_err());
    }
}
