//! Event classification engine
//!
//! [`EventFilter`] decides, one event at a time and in stream order, whether a
//! kernel trace event belongs in the trace of the target process:
//!
//! 1. look up the provider's classifier in the [`Registry`],
//! 2. run it against the event and the current thread set,
//! 3. apply the thread transition it returned, if any,
//! 4. if the provider said drop, fall back to the generic header process ID.

pub mod providers;
pub mod registry;
pub mod tracker;

pub use providers::{ClassifyContext, ProviderClassifier, ProviderSignal};
pub use registry::Registry;
pub use tracker::{ThreadTracker, ThreadTransition};

use thiserror::Error;
use tracesieve_shared::{Guid, Pid, RawEvent, Tid};
use tracing::{debug, info};

/// Conditions the classifier was not built to handle.
///
/// These indicate a stream the filter does not understand, not a property of
/// a single event. Hosts are expected to stop on them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassifyError {
    #[error("event from unknown provider {provider}")]
    UnknownProvider { provider: Guid },

    #[error("{provider} event with unexpected opcode {opcode}")]
    UnexpectedOpcode { provider: &'static str, opcode: u8 },
}

/// Final decision for one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Kept by the provider's own rules
    Provider,

    /// Kept because the generic header process ID is the target
    Fallback,

    Drop,
}

impl Verdict {
    pub fn is_keep(self) -> bool {
        !matches!(self, Verdict::Drop)
    }
}

/// Process-scoped event filter
#[derive(Debug)]
pub struct EventFilter {
    target_pid: Pid,
    registry: Registry,
    threads: ThreadTracker,
}

impl EventFilter {
    /// Filter for `target_pid` over the kernel provider set.
    pub fn new(target_pid: Pid) -> Self {
        Self::with_registry(target_pid, Registry::kernel())
    }

    pub fn with_registry(target_pid: Pid, registry: Registry) -> Self {
        Self {
            target_pid,
            registry,
            threads: ThreadTracker::new(),
        }
    }

    pub fn target_pid(&self) -> Pid {
        self.target_pid
    }

    /// Threads currently attributed to the target process
    pub fn threads(&self) -> &ThreadTracker {
        &self.threads
    }

    /// Session start hook. The filter carries no per-session setup.
    pub fn on_begin(&mut self) {
        info!(
            target_pid = self.target_pid,
            providers = self.registry.len(),
            "classification started"
        );
    }

    /// Session end hook. The filter carries no per-session teardown.
    pub fn on_finalize(&mut self) {
        info!(
            target_pid = self.target_pid,
            live_threads = self.threads.len(),
            "classification finished"
        );
    }

    /// Keep or drop `event`.
    pub fn classify(&mut self, event: &RawEvent<'_>) -> Result<bool, ClassifyError> {
        self.evaluate(event).map(Verdict::is_keep)
    }

    /// Classify `event` and report which rule kept it.
    pub fn evaluate(&mut self, event: &RawEvent<'_>) -> Result<Verdict, ClassifyError> {
        let classifier = self.registry.lookup(&event.provider)?;
        let ctx = ClassifyContext {
            target_pid: self.target_pid,
            threads: &self.threads,
        };
        let signal = classifier.classify(event, &ctx)?;

        if let Some(transition) = signal.transition {
            self.threads.apply(transition);
        }

        if signal.keep {
            return Ok(Verdict::Provider);
        }
        if self.fallback(event) {
            debug!(
                provider = classifier.name(),
                opcode = event.opcode,
                "kept by header process id"
            );
            return Ok(Verdict::Fallback);
        }
        Ok(Verdict::Drop)
    }

    /// Provider-agnostic check on the generic header process ID.
    pub fn fallback(&self, event: &RawEvent<'_>) -> bool {
        event.process_id == self.target_pid
    }

    /// Whether `tid` is currently attributed to the target
    pub fn is_tracked(&self, tid: Tid) -> bool {
        self.threads.contains(tid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracesieve_shared::providers::{self, opcodes};

    const TARGET: Pid = 4242;

    fn u32s(values: &[u32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn test_provider_keep_skips_fallback() {
        let mut filter = EventFilter::new(TARGET);
        let data = u32s(&[TARGET, 1]);
        let event = RawEvent::new(providers::THREAD, opcodes::START, 3, 0, 0, &data);
        assert_eq!(filter.evaluate(&event).unwrap(), Verdict::Provider);
    }

    #[test]
    fn test_fallback_rescues_unclassified_opcode() {
        let mut filter = EventFilter::new(TARGET);
        // Thread context switch style opcode, not classified
        let event = RawEvent::new(providers::THREAD, 36, 2, 0, TARGET, &[]);
        assert_eq!(filter.evaluate(&event).unwrap(), Verdict::Fallback);

        let other = RawEvent { process_id: 1, ..event };
        assert_eq!(filter.evaluate(&other).unwrap(), Verdict::Drop);
    }

    #[test]
    fn test_transition_applied_after_decision() {
        let mut filter = EventFilter::new(TARGET);
        let data = u32s(&[TARGET, 77]);
        let start = RawEvent::new(providers::THREAD, opcodes::DC_START, 3, 0, 0, &data);
        assert!(filter.classify(&start).unwrap());
        assert!(filter.is_tracked(77));

        let end = RawEvent::new(providers::THREAD, opcodes::END, 3, 0, 0, &data);
        assert!(filter.classify(&end).unwrap());
        assert!(!filter.is_tracked(77));
    }

    #[test]
    fn test_errors_propagate() {
        let mut filter = EventFilter::new(TARGET);
        let unknown = RawEvent::new(Guid::zero(), 1, 0, 0, TARGET, &[]);
        assert!(matches!(
            filter.classify(&unknown),
            Err(ClassifyError::UnknownProvider { .. })
        ));

        let odd = RawEvent::new(providers::STACK_WALK, 1, 2, 0, TARGET, &[]);
        assert!(matches!(
            filter.classify(&odd),
            Err(ClassifyError::UnexpectedOpcode { opcode: 1, .. })
        ));
    }

    #[test]
    fn test_error_messages() {
        let err = ClassifyError::UnknownProvider {
            provider: providers::THREAD,
        };
        assert_eq!(
            err.to_string(),
            "event from unknown provider 3d6fa8d1-fe05-11d0-9dda-00c04fd7ba7c"
        );
    }
}
