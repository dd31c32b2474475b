//! Inspect command: per-provider event counts of a trace

use anyhow::{Context, Result};
use clap::Args;
use std::collections::BTreeMap;
use std::path::PathBuf;

use tracesieve_shared::protocol::wire::{TraceReader, TraceRecord};
use tracesieve_shared::providers::provider_name;
use tracesieve_shared::Guid;

use crate::output;

#[derive(Args)]
pub struct InspectArgs {
    /// Trace file to read
    pub path: PathBuf,
}

pub fn run(args: InspectArgs) -> Result<()> {
    let reader = TraceReader::open(&args.path)
        .with_context(|| format!("Failed to open trace: {}", args.path.display()))?;

    let counts = count_providers(reader)?;
    let total: u64 = counts.values().sum();

    output::success(&format!(
        "{}: {} events from {} providers",
        args.path.display(),
        total,
        counts.len()
    ));

    for (provider, count) in &counts {
        let label = provider_name(provider)
            .map(str::to_string)
            .unwrap_or_else(|| provider.to_string());
        println!("  {:<38} {:>10}", label, count);
    }

    Ok(())
}

fn count_providers<I, E>(records: I) -> Result<BTreeMap<Guid, u64>>
where
    I: IntoIterator<Item = std::result::Result<TraceRecord, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    let mut counts = BTreeMap::new();
    for (index, record) in records.into_iter().enumerate() {
        let record = record.with_context(|| format!("Failed to read event #{}", index + 1))?;
        *counts.entry(record.provider).or_insert(0) += 1;
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracesieve_shared::protocol::wire::WireError;
    use tracesieve_shared::providers;

    fn record(provider: Guid) -> TraceRecord {
        TraceRecord {
            provider,
            opcode: 0,
            version: 0,
            flags: 0,
            process_id: 0,
            thread_id: 0,
            timestamp: 0,
            user_data: vec![],
        }
    }

    #[test]
    fn test_counts_by_provider() {
        let records: Vec<Result<TraceRecord, WireError>> = vec![
            Ok(record(providers::THREAD)),
            Ok(record(providers::PERF_INFO)),
            Ok(record(providers::THREAD)),
        ];
        let counts = count_providers(records).unwrap();
        assert_eq!(counts[&providers::THREAD], 2);
        assert_eq!(counts[&providers::PERF_INFO], 1);
    }

    #[test]
    fn test_read_error_names_event() {
        let records: Vec<Result<TraceRecord, WireError>> =
            vec![Ok(record(providers::THREAD)), Err(WireError::Truncated)];
        let err = count_providers(records).unwrap_err();
        assert!(err.to_string().contains("event #2"));
    }
}
