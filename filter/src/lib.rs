//! Process-scoped kernel trace filter
//!
//! This library provides the event classification engine and the relog host
//! that applies it to a recorded trace.

pub mod classifier;
pub mod config;
pub mod output;
pub mod relog;

pub use classifier::{ClassifyError, EventFilter, Verdict};
pub use config::FilterConfig;

use anyhow::{Context, Result};
use relog::{RelogStats, Relogger};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracesieve_shared::protocol::wire::{TraceReader, TraceWriter};
use tracesieve_shared::utils::time::elapsed_millis;
use tracesieve_shared::{Pid, Tid};
use tracing::info;

/// Summary of one filter run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterReport {
    pub target_pid: Pid,
    pub input: PathBuf,
    pub output: PathBuf,

    /// Threads still attributed to the target when the trace ended
    pub live_threads: Vec<Tid>,

    pub stats: RelogStats,
}

/// Run the filter with the given configuration.
///
/// `cancel` is polled between events; a cancelled run still produces a valid
/// (partial) output file.
pub fn run_filter(config: &FilterConfig, cancel: Arc<AtomicBool>) -> Result<FilterReport> {
    config.validate().context("Invalid configuration")?;

    info!(
        "Filtering {} for PID {} into {}",
        config.input_path.display(),
        config.target_pid,
        config.output_path.display()
    );

    let reader = TraceReader::open(&config.input_path)
        .with_context(|| format!("Failed to open log file: {}", config.input_path.display()))?;
    let writer = TraceWriter::create(&config.output_path)
        .with_context(|| format!("Failed to create output: {}", config.output_path.display()))?;

    let mut filter = EventFilter::new(config.target_pid);
    let (stats, _) = Relogger::new(reader, writer)
        .lenient(config.lenient)
        .cancel_flag(cancel)
        .process(&mut filter)?;

    info!(
        "Kept {} of {} events in {} ms",
        stats.kept_events,
        stats.total_events,
        elapsed_millis(stats.started_at_ns, stats.finished_at_ns)
    );

    let report = FilterReport {
        target_pid: config.target_pid,
        input: config.input_path.clone(),
        output: config.output_path.clone(),
        live_threads: filter.threads().snapshot(),
        stats,
    };

    if let Some(path) = &config.stats_json {
        output::json::write_report(&report, path)?;
    }

    Ok(report)
}
