use anyhow::Result;
use std::io::Write;

use crate::state::TraceReport;

/// Write the trace report as pretty-printed JSON
pub fn export_json<W: Write>(report: &TraceReport, mut writer: W) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, report)?;
    writeln!(writer)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::net::Ipv4Addr;

    #[test]
    fn test_report_roundtrip() {
        let report = TraceReport {
            hostname: "dns.google.com".to_string(),
            resolved: Ipv4Addr::new(8, 8, 4, 4),
            max_hops: 64,
            queries: 3,
            payload_len: 32,
            started_at: Utc::now(),
            reached: true,
            hops: Vec::new(),
        };

        let mut buf = Vec::new();
        export_json(&report, &mut buf).expect("export");

        let loaded: TraceReport = serde_json::from_slice(&buf).expect("parse");
        assert_eq!(loaded.hostname, report.hostname);
        assert_eq!(loaded.resolved, report.resolved);
        assert!(loaded.reached);
    }
}
