use anyhow::{Context, Result, bail};
use std::net::{IpAddr, Ipv4Addr};
use tracing::trace;

/// Forward and reverse name resolution, injected into the trace engine.
///
/// `resolve` failures are fatal for a run. `reverse` is best effort; callers
/// fall back to the numeric address.
pub trait NameResolver {
    /// Resolve a hostname (or textual IP) to an IPv4 address
    fn resolve(&self, hostname: &str) -> Result<Ipv4Addr>;

    /// Best-effort reverse lookup
    fn reverse(&self, addr: Ipv4Addr) -> Option<String>;
}

/// System resolver backed by getaddrinfo/getnameinfo
#[derive(Debug, Default)]
pub struct SystemResolver;

impl NameResolver for SystemResolver {
    fn resolve(&self, hostname: &str) -> Result<Ipv4Addr> {
        // A textual address passes through untouched
        if let Ok(ip) = hostname.parse::<Ipv4Addr>() {
            return Ok(ip);
        }

        let addrs = dns_lookup::lookup_host(hostname)
            .with_context(|| format!("Failed to resolve hostname: {}", hostname))?;

        let first_v4 = addrs.into_iter().find_map(|ip| match ip {
            IpAddr::V4(v4) => Some(v4),
            IpAddr::V6(_) => None,
        });

        match first_v4 {
            Some(ip) => Ok(ip),
            None => bail!("No IPv4 address found for hostname: {}", hostname),
        }
    }

    fn reverse(&self, addr: Ipv4Addr) -> Option<String> {
        match dns_lookup::lookup_addr(&IpAddr::V4(addr)) {
            Ok(name) => Some(name),
            Err(e) => {
                trace!(ip = %addr, error = %e, "reverse lookup failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_ip_passes_through_without_lookup() {
        let resolver = SystemResolver;
        let ip = resolver.resolve("8.8.4.4").expect("raw IP should resolve");
        assert_eq!(ip, Ipv4Addr::new(8, 8, 4, 4));
    }

    #[test]
    fn test_reverse_lookup_never_panics() {
        let resolver = SystemResolver;
        // Succeeds or returns None depending on the environment; either is fine
        let _ = resolver.reverse(Ipv4Addr::new(127, 0, 0, 1));
    }
}
