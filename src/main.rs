use anyhow::Result;
use clap::Parser;
use std::io;
use std::process;
use tracing_subscriber::EnvFilter;

use hoptrail::cli::Args;
use hoptrail::config::Config;
use hoptrail::export::export_json;
use hoptrail::lookup::SystemResolver;
use hoptrail::probe::{NetworkProber, check_permissions};
use hoptrail::trace::TraceEngine;

fn main() {
    let args = Args::parse();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        process::exit(2);
    }

    // Diagnostics go to stderr so hop lines on stdout stay clean
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    if let Err(e) = run(&args) {
        eprintln!("hoptrail: {:#}", e);
        process::exit(1);
    }
}

fn run(args: &Args) -> Result<()> {
    // Surface privilege problems before resolving or probing anything
    check_permissions()?;

    let config = Config::from(args);
    let resolver = SystemResolver;
    let prober = NetworkProber;
    let engine = TraceEngine::new(config, &resolver, &prober);

    let stdout = io::stdout();
    if args.json {
        // Batch mode: run silently, then emit a single JSON document
        let report = engine.run(&mut io::sink())?;
        export_json(&report, stdout.lock())?;
    } else {
        engine.run(&mut stdout.lock())?;
    }

    Ok(())
}
