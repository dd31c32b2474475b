//! Configuration types for a filter run

use std::path::PathBuf;

/// Filter configuration
#[derive(Debug, Clone)]
pub struct FilterConfig {
    /// Process whose events are kept
    pub target_pid: u32,

    /// Trace container to consume
    pub input_path: PathBuf,

    /// Trace container to produce
    pub output_path: PathBuf,

    /// Optional JSON run report
    pub stats_json: Option<PathBuf>,

    /// Log and drop unclassifiable events instead of aborting the run
    pub lenient: bool,
}

impl FilterConfig {
    /// Strict run without a report
    pub fn new(
        target_pid: u32,
        input_path: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            target_pid,
            input_path: input_path.into(),
            output_path: output_path.into(),
            stats_json: None,
            lenient: false,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.target_pid == 0 {
            anyhow::bail!("Target process id must be greater than 0");
        }

        if !self.input_path.is_file() {
            anyhow::bail!("Input log file not found: {}", self.input_path.display());
        }

        if self.input_path == self.output_path {
            anyhow::bail!("Output file must differ from the input log file");
        }

        if self.stats_json.as_ref() == Some(&self.output_path) {
            anyhow::bail!("Statistics file must differ from the output file");
        }

        Ok(())
    }
}
