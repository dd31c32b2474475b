//! Standalone trace filter
//!
//! Reads a recorded kernel trace and writes the events that belong to one
//! process into a new trace.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tracesieve_filter::{run_filter, FilterConfig};

#[derive(Parser, Debug)]
#[command(name = "tracesieve-filter")]
#[command(about = "Filter a kernel trace to a specific process", long_about = None)]
#[command(version)]
struct Args {
    /// Trace log file to consume
    #[arg(short, long)]
    logfile: PathBuf,

    /// Process ID to filter
    #[arg(short, long)]
    pid: u32,

    /// Output file name
    #[arg(short, long)]
    output: PathBuf,

    /// Write a JSON run report
    #[arg(long)]
    stats_json: Option<PathBuf>,

    /// Drop events the filter cannot classify instead of stopping
    #[arg(long, env = "TRACESIEVE_LENIENT")]
    lenient: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_tracing(args.verbose);

    info!("Configuration: {:?}", args);

    let config = FilterConfig {
        stats_json: args.stats_json,
        lenient: args.lenient,
        ..FilterConfig::new(args.pid, args.logfile, args.output)
    };

    let cancel = Arc::new(AtomicBool::new(false));
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing output");
            ctrl_c.store(true, Ordering::Relaxed);
        }
    });

    let report = tokio::task::spawn_blocking(move || run_filter(&config, cancel))
        .await
        .context("Filter task panicked")??;

    info!(
        "Done: {} of {} events kept",
        report.stats.kept_events, report.stats.total_events
    );

    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}
