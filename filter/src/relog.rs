//! Relog host
//!
//! Replays a recorded trace through a [`TraceEventCallback`] and copies every
//! event the callback accepts into a new container, in the original order.

use crate::classifier::{ClassifyError, EventFilter, Verdict};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracesieve_shared::protocol::wire::{TraceReader, TraceWriter};
use tracesieve_shared::providers::provider_name;
use tracesieve_shared::utils::{hex_dump, time::system_time_nanos};
use tracesieve_shared::RawEvent;
use tracing::{debug, error, info, warn};

/// Receives events from the relogger, one at a time and in stream order.
pub trait TraceEventCallback {
    fn on_begin(&mut self) {}

    fn on_event(&mut self, event: &RawEvent<'_>) -> Result<Verdict, ClassifyError>;

    /// Decide an event `on_event` rejected with an error. Only consulted in
    /// lenient mode.
    fn on_error(&mut self, _event: &RawEvent<'_>, _error: &ClassifyError) -> bool {
        false
    }

    fn on_finalize(&mut self) {}
}

impl TraceEventCallback for EventFilter {
    fn on_begin(&mut self) {
        EventFilter::on_begin(self)
    }

    fn on_event(&mut self, event: &RawEvent<'_>) -> Result<Verdict, ClassifyError> {
        self.evaluate(event)
    }

    fn on_error(&mut self, event: &RawEvent<'_>, _error: &ClassifyError) -> bool {
        self.fallback(event)
    }

    fn on_finalize(&mut self) {
        EventFilter::on_finalize(self)
    }
}

/// Per-provider counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderStats {
    pub seen: u64,
    pub kept: u64,
}

/// Counters for one relog pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelogStats {
    pub total_events: u64,
    pub kept_events: u64,

    /// Events kept only because of the header process ID
    pub kept_by_fallback: u64,

    /// Events the callback could not classify (lenient mode only)
    pub anomalies: u64,

    /// Keyed by provider name, or GUID for unknown providers
    pub providers: BTreeMap<String, ProviderStats>,

    pub cancelled: bool,
    pub started_at_ns: u64,
    pub finished_at_ns: u64,
}

impl RelogStats {
    fn record(&mut self, event: &RawEvent<'_>, kept: bool) {
        let key = provider_name(&event.provider)
            .map(str::to_string)
            .unwrap_or_else(|| event.provider.to_string());
        let entry = self.providers.entry(key).or_default();
        entry.seen += 1;
        self.total_events += 1;
        if kept {
            entry.kept += 1;
            self.kept_events += 1;
        }
    }

    pub fn dropped_events(&self) -> u64 {
        self.total_events - self.kept_events
    }
}

/// Drives a callback over a recorded trace
pub struct Relogger<R: Read, W: Write> {
    reader: TraceReader<R>,
    writer: TraceWriter<W>,
    lenient: bool,
    cancel: Arc<AtomicBool>,
}

impl<R: Read, W: Write> Relogger<R, W> {
    pub fn new(reader: TraceReader<R>, writer: TraceWriter<W>) -> Self {
        Self {
            reader,
            writer,
            lenient: false,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Drop unclassifiable events instead of failing the run.
    pub fn lenient(mut self, lenient: bool) -> Self {
        self.lenient = lenient;
        self
    }

    /// Flag checked between events; setting it ends the pass early.
    pub fn cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run the pass.
    ///
    /// The output container is finished and `on_finalize` is called even when
    /// the pass is cancelled or stops on a read or classification error; the
    /// output then holds the events accepted before that point. Only a failed
    /// write leaves the output unfinished.
    pub fn process<C: TraceEventCallback>(mut self, callback: &mut C) -> Result<(RelogStats, W)> {
        let mut stats = RelogStats {
            started_at_ns: system_time_nanos(),
            ..Default::default()
        };
        let mut failure = None;

        callback.on_begin();

        loop {
            let index = stats.total_events + 1;
            let record = match self.reader.next_record() {
                Ok(Some(record)) => record,
                Ok(None) => break,
                Err(e) => {
                    error!(event = index, "{}", e);
                    failure = Some(
                        anyhow::Error::new(e).context(format!("Failed to read event #{}", index)),
                    );
                    break;
                }
            };

            if self.cancel.load(Ordering::Relaxed) {
                warn!(processed = stats.total_events, "relog cancelled");
                stats.cancelled = true;
                break;
            }

            let event = record.as_raw_event();
            let keep = match callback.on_event(&event) {
                Ok(verdict) => {
                    if verdict == Verdict::Fallback {
                        stats.kept_by_fallback += 1;
                    }
                    verdict.is_keep()
                }
                Err(e) if self.lenient => {
                    warn!(event = index, "{}", e);
                    debug!(
                        "unclassified payload ({} bytes):\n{}",
                        event.payload().len(),
                        hex_dump(event.payload())
                    );
                    stats.anomalies += 1;
                    let rescued = callback.on_error(&event, &e);
                    if rescued {
                        stats.kept_by_fallback += 1;
                    }
                    rescued
                }
                Err(e) => {
                    error!(
                        event = index,
                        provider = %event.provider,
                        opcode = event.opcode,
                        version = event.version,
                        "{}",
                        e
                    );
                    failure = Some(
                        anyhow::Error::new(e)
                            .context(format!("Cannot classify event #{}", index)),
                    );
                    break;
                }
            };

            stats.record(&event, keep);
            if keep {
                self.writer
                    .write(&record)
                    .context("Failed to write filtered event")?;
            }
        }

        callback.on_finalize();

        let written = self.writer.written();
        let inner = self.writer.finish().context("Failed to flush output")?;
        stats.finished_at_ns = system_time_nanos();

        if let Some(err) = failure {
            warn!(written, "relog pass stopped early, partial output kept");
            return Err(err);
        }

        info!(
            total = stats.total_events,
            kept = stats.kept_events,
            written,
            "relog pass complete"
        );

        Ok((stats, inner))
    }
}
