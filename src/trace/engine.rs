use anyhow::{Context, Result};
use chrono::Utc;
use std::io::Write;
use tracing::debug;

use crate::config::Config;
use crate::lookup::NameResolver;
use crate::probe::Prober;
use crate::state::{HopOutcome, HopRecord, TraceReport};
use crate::trace::hop::probe_hop;

/// Base destination port, the classic traceroute convention
pub const BASE_PORT: u16 = 33434;

/// Drives a trace: resolves the destination once, then probes TTL 1 upward
/// until the destination answers or the hop budget runs out. One line is
/// written to the sink per probed hop, after that hop completes.
pub struct TraceEngine<'a> {
    config: Config,
    resolver: &'a dyn NameResolver,
    prober: &'a dyn Prober,
}

impl<'a> TraceEngine<'a> {
    pub fn new(config: Config, resolver: &'a dyn NameResolver, prober: &'a dyn Prober) -> Self {
        Self {
            config,
            resolver,
            prober,
        }
    }

    /// Destination port of a TTL's first probe. Each hop owns a block of
    /// `queries` consecutive ports, so no two hops' ranges overlap.
    fn hop_base_port(&self, ttl: u8) -> u16 {
        BASE_PORT + (ttl as u16 - 1) * self.config.queries as u16
    }

    /// Run the trace to completion, streaming output lines into `out`
    pub fn run<W: Write>(&self, out: &mut W) -> Result<TraceReport> {
        let resolved = self
            .resolver
            .resolve(&self.config.hostname)
            .with_context(|| format!("Failed to resolve target: {}", self.config.hostname))?;

        debug!(host = %self.config.hostname, ip = %resolved, "resolved destination");

        let payload = self.config.payload.as_bytes();
        let mut report = TraceReport {
            hostname: self.config.hostname.clone(),
            resolved,
            max_hops: self.config.max_hops,
            queries: self.config.queries,
            payload_len: payload.len(),
            started_at: Utc::now(),
            reached: false,
            hops: Vec::new(),
        };

        writeln!(
            out,
            "traceroute to {} ({}), {} hops max, {} byte packets",
            self.config.hostname,
            resolved,
            self.config.max_hops,
            payload.len()
        )?;

        for ttl in 1..=self.config.max_hops {
            let hop = probe_hop(
                self.prober,
                resolved,
                self.hop_base_port(ttl),
                ttl,
                self.config.queries,
                payload,
                self.config.timeout,
            )?;

            let hostname = self.reverse_name(&hop);
            writeln!(out, "{}", self.format_hop_line(ttl, &hop, hostname.as_deref()))?;

            let reached = hop.reached_destination;
            report.hops.push(HopRecord {
                ttl,
                responder: hop.responder,
                hostname,
                timed_out: hop.timed_out,
                reached_destination: reached,
                rtt: hop.rtt,
            });

            if reached {
                debug!(ttl, "destination reached");
                report.reached = true;
                break;
            }
        }

        Ok(report)
    }

    /// Reverse lookup for a responding hop. Best effort: a failed lookup
    /// falls back to the numeric address at render time.
    fn reverse_name(&self, hop: &HopOutcome) -> Option<String> {
        if !self.config.dns_enabled || hop.timed_out {
            return None;
        }
        hop.responder.and_then(|ip| self.resolver.reverse(ip))
    }

    /// Render one hop line. With a single query per hop the latency column
    /// is omitted; with several, the mean RTT is shown to three decimals.
    fn format_hop_line(&self, ttl: u8, hop: &HopOutcome, hostname: Option<&str>) -> String {
        if hop.timed_out {
            let mut line = format!(" {}  *", ttl);
            if self.config.queries > 1 {
                line.push_str("  ");
                line.push_str(&vec!["*"; (self.config.queries - 1) as usize].join(" "));
            }
            return line;
        }

        // A non-timed-out hop always has a responder
        let addr = hop
            .responder
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| "*".to_string());
        let name = hostname.unwrap_or(&addr);
        let mut line = format!(" {}  {} ({})", ttl, name, addr);
        if self.config.queries > 1 {
            line.push_str(&format!(" {:.3} ms", hop.rtt.as_secs_f64() * 1000.0));
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ProbeOutcome;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use std::net::Ipv4Addr;
    use std::time::Duration;

    struct ScriptedProber {
        outcomes: RefCell<VecDeque<ProbeOutcome>>,
        calls: Cell<u32>,
    }

    impl ScriptedProber {
        fn new(outcomes: Vec<ProbeOutcome>) -> Self {
            Self {
                outcomes: RefCell::new(outcomes.into()),
                calls: Cell::new(0),
            }
        }
    }

    impl Prober for ScriptedProber {
        fn send_probe(
            &self,
            _dest: Ipv4Addr,
            _port: u16,
            _ttl: u8,
            _payload: &[u8],
            _timeout: Duration,
        ) -> Result<ProbeOutcome> {
            self.calls.set(self.calls.get() + 1);
            Ok(self
                .outcomes
                .borrow_mut()
                .pop_front()
                .expect("more probes than scripted outcomes"))
        }
    }

    struct StaticResolver {
        ip: Ipv4Addr,
        reverse_name: Option<String>,
    }

    impl NameResolver for StaticResolver {
        fn resolve(&self, _hostname: &str) -> Result<Ipv4Addr> {
            Ok(self.ip)
        }

        fn reverse(&self, _addr: Ipv4Addr) -> Option<String> {
            self.reverse_name.clone()
        }
    }

    fn run_engine(
        config: Config,
        resolver: &StaticResolver,
        prober: &ScriptedProber,
    ) -> (TraceReport, Vec<String>) {
        let engine = TraceEngine::new(config, resolver, prober);
        let mut out = Vec::new();
        let report = engine.run(&mut out).expect("engine run failed");
        let lines = String::from_utf8(out)
            .expect("output not utf8")
            .lines()
            .map(str::to_string)
            .collect();
        (report, lines)
    }

    fn config(hostname: &str, max_hops: u8, queries: u8) -> Config {
        Config {
            hostname: hostname.to_string(),
            max_hops,
            queries,
            ..Config::default()
        }
    }

    #[test]
    fn test_stops_immediately_after_destination_reached() {
        let dest = Ipv4Addr::new(8, 8, 4, 4);
        let resolver = StaticResolver {
            ip: dest,
            reverse_name: None,
        };
        let prober = ScriptedProber::new(vec![
            ProbeOutcome::response(Ipv4Addr::new(10, 0, 0, 1), Duration::from_millis(1), false),
            ProbeOutcome::response(Ipv4Addr::new(10, 0, 0, 2), Duration::from_millis(2), false),
            ProbeOutcome::response(dest, Duration::from_millis(3), true),
        ]);

        let (report, lines) = run_engine(config("8.8.4.4", 64, 1), &resolver, &prober);

        // Three hops probed, not sixty-four
        assert_eq!(prober.calls.get(), 3);
        assert!(report.reached);
        assert_eq!(report.hops.len(), 3);
        assert_eq!(lines.len(), 4); // header + 3 hops
    }

    #[test]
    fn test_exhausts_max_hops_when_destination_never_reached() {
        let resolver = StaticResolver {
            ip: Ipv4Addr::new(8, 8, 4, 4),
            reverse_name: None,
        };
        let prober = ScriptedProber::new(vec![ProbeOutcome::timeout(); 5]);

        let (report, lines) = run_engine(config("8.8.4.4", 5, 1), &resolver, &prober);

        assert_eq!(prober.calls.get(), 5);
        assert!(!report.reached);
        assert_eq!(report.hops.len(), 5);
        assert_eq!(lines.len(), 6);
    }

    #[test]
    fn test_hop_port_ranges_do_not_overlap() {
        let resolver = StaticResolver {
            ip: Ipv4Addr::new(8, 8, 4, 4),
            reverse_name: None,
        };
        let prober = ScriptedProber::new(vec![]);
        let engine = TraceEngine::new(config("8.8.4.4", 64, 3), &resolver, &prober);

        assert_eq!(engine.hop_base_port(1), 33434);
        assert_eq!(engine.hop_base_port(2), 33437);
        assert_eq!(engine.hop_base_port(10), 33434 + 9 * 3);
    }

    #[test]
    fn test_timeout_line_single_query() {
        let resolver = StaticResolver {
            ip: Ipv4Addr::new(8, 8, 4, 4),
            reverse_name: None,
        };
        let prober = ScriptedProber::new(vec![ProbeOutcome::timeout()]);

        let (_, lines) = run_engine(config("8.8.4.4", 1, 1), &resolver, &prober);
        assert_eq!(lines[1], " 1  *");
    }

    #[test]
    fn test_timeout_line_three_queries() {
        let resolver = StaticResolver {
            ip: Ipv4Addr::new(8, 8, 4, 4),
            reverse_name: None,
        };
        let prober = ScriptedProber::new(vec![ProbeOutcome::timeout(); 3]);

        let (_, lines) = run_engine(config("8.8.4.4", 1, 3), &resolver, &prober);
        assert_eq!(lines[1], " 1  *  * *");
    }

    #[test]
    fn test_response_line_falls_back_to_numeric_address() {
        let router = Ipv4Addr::new(192, 168, 68, 1);
        let resolver = StaticResolver {
            ip: Ipv4Addr::new(8, 8, 4, 4),
            reverse_name: None, // reverse lookup failed
        };
        let prober = ScriptedProber::new(vec![ProbeOutcome::response(
            router,
            Duration::from_millis(2),
            true,
        )]);

        let (_, lines) = run_engine(config("8.8.4.4", 64, 1), &resolver, &prober);
        assert_eq!(lines[1], " 1  192.168.68.1 (192.168.68.1)");
    }

    #[test]
    fn test_no_dns_skips_reverse_lookups() {
        let router = Ipv4Addr::new(192, 168, 68, 1);
        let resolver = StaticResolver {
            ip: Ipv4Addr::new(8, 8, 4, 4),
            reverse_name: Some("my-router.local".to_string()),
        };
        let prober = ScriptedProber::new(vec![ProbeOutcome::response(
            router,
            Duration::from_millis(2),
            true,
        )]);

        let mut cfg = config("8.8.4.4", 64, 1);
        cfg.dns_enabled = false;
        let (report, lines) = run_engine(cfg, &resolver, &prober);
        assert_eq!(lines[1], " 1  192.168.68.1 (192.168.68.1)");
        assert_eq!(report.hops[0].hostname, None);
    }
}
