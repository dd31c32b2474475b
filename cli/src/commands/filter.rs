//! Filter command: reduce a recorded kernel trace to one process

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::warn;

use tracesieve_filter::{run_filter, FilterConfig, FilterReport};

use crate::output;

#[derive(Args)]
pub struct FilterArgs {
    /// Trace log file to consume
    #[arg(short, long)]
    pub logfile: PathBuf,

    /// Process ID to keep
    #[arg(short, long)]
    pub pid: u32,

    /// Filtered trace to write
    #[arg(short, long)]
    pub output: PathBuf,

    /// Also write a JSON run report
    #[arg(long)]
    pub stats_json: Option<PathBuf>,

    /// Drop events the filter cannot classify instead of stopping
    #[arg(long, env = "TRACESIEVE_LENIENT")]
    pub lenient: bool,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl From<FilterArgs> for FilterConfig {
    fn from(args: FilterArgs) -> Self {
        FilterConfig {
            stats_json: args.stats_json,
            lenient: args.lenient,
            ..FilterConfig::new(args.pid, args.logfile, args.output)
        }
    }
}

pub async fn run(args: FilterArgs) -> Result<()> {
    let config = FilterConfig::from(args);

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

    print_summary(&report);
    Ok(())
}

fn print_summary(report: &FilterReport) {
    let stats = &report.stats;

    if stats.cancelled {
        output::warning(&format!(
            "Cancelled after {} events, partial trace written to {}",
            stats.total_events,
            report.output.display()
        ));
    } else {
        output::success(&format!(
            "Kept {} of {} events for PID {} in {}",
            stats.kept_events,
            stats.total_events,
            report.target_pid,
            report.output.display()
        ));
    }

    println!("  Dropped:          {}", stats.dropped_events());
    println!("  Header PID only:  {}", stats.kept_by_fallback);
    println!("  Live threads:     {}", report.live_threads.len());

    if stats.anomalies > 0 {
        output::warning(&format!("{} events could not be classified", stats.anomalies));
    }
}
