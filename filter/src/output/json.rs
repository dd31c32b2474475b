//! JSON output
//!
//! Exports the run report in JSON format for further analysis

use crate::FilterReport;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::info;

/// Write a filter run report as pretty-printed JSON
pub fn write_report(report: &FilterReport, output_path: &Path) -> Result<()> {
    info!("Generating JSON report: {}", output_path.display());

    let file = File::create(output_path)
        .with_context(|| format!("Failed to create report file: {}", output_path.display()))?;

    let writer = BufWriter::new(file);

    serde_json::to_writer_pretty(writer, report).context("Failed to serialize report to JSON")?;

    info!("JSON report written to {}", output_path.display());

    Ok(())
}
