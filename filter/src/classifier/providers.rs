//! Per-provider classification rules
//!
//! Each kernel provider gets one [`ProviderClassifier`]. Classifiers are pure
//! deciders: they read the event and the current thread set, and return a
//! [`ProviderSignal`]. Any change to the thread set is returned as a
//! [`ThreadTransition`] for the caller to apply.

use super::tracker::{ThreadTracker, ThreadTransition};
use super::ClassifyError;
use tracesieve_shared::headers::{
    decode, ImageLoadHeader, ProcessHeader, SampledProfileHeader, StackWalkHeader, ThreadHeader,
};
use tracesieve_shared::providers::opcodes;
use tracesieve_shared::{Pid, RawEvent};

/// Idle process
pub const IDLE_PID: Pid = 0;

/// System process
pub const SYSTEM_PID: Pid = 4;

/// Read-only state a classifier may consult
#[derive(Debug, Clone, Copy)]
pub struct ClassifyContext<'a> {
    pub target_pid: Pid,
    pub threads: &'a ThreadTracker,
}

/// Outcome of a provider classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProviderSignal {
    /// The provider rules alone say keep
    pub keep: bool,

    /// Thread set change to apply after the decision
    pub transition: Option<ThreadTransition>,
}

impl ProviderSignal {
    pub const DROP: Self = Self {
        keep: false,
        transition: None,
    };

    pub fn keep_if(keep: bool) -> Self {
        Self {
            keep,
            transition: None,
        }
    }
}

/// Decision rules for one provider
pub trait ProviderClassifier: Send + Sync {
    /// Provider name used in logs and statistics
    fn name(&self) -> &'static str;

    fn classify(
        &self,
        event: &RawEvent<'_>,
        ctx: &ClassifyContext<'_>,
    ) -> Result<ProviderSignal, ClassifyError>;
}

/// `EventTrace` and `EventTraceConfig`: header and system configuration
/// records are needed by every consumer of the trace.
#[derive(Debug)]
pub struct EventTraceClassifier {
    name: &'static str,
}

impl EventTraceClassifier {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

impl ProviderClassifier for EventTraceClassifier {
    fn name(&self) -> &'static str {
        self.name
    }

    fn classify(
        &self,
        _event: &RawEvent<'_>,
        _ctx: &ClassifyContext<'_>,
    ) -> Result<ProviderSignal, ClassifyError> {
        Ok(ProviderSignal::keep_if(true))
    }
}

/// `ImageLoad`: modules of the target plus kernel-side loads (idle and
/// System), which symbolization of any process needs.
#[derive(Debug, Default)]
pub struct ImageLoadClassifier;

impl ProviderClassifier for ImageLoadClassifier {
    fn name(&self) -> &'static str {
        "ImageLoad"
    }

    fn classify(
        &self,
        event: &RawEvent<'_>,
        ctx: &ClassifyContext<'_>,
    ) -> Result<ProviderSignal, ClassifyError> {
        match event.opcode {
            opcodes::LOAD | opcodes::END | opcodes::DC_START | opcodes::DC_END => {
                let keep = decode::<ImageLoadHeader>(event)
                    .map(|hdr| {
                        matches!(hdr.process_id, IDLE_PID | SYSTEM_PID)
                            || hdr.process_id == ctx.target_pid
                    })
                    .unwrap_or(false);
                Ok(ProviderSignal::keep_if(keep))
            }
            _ => Ok(ProviderSignal::DROP),
        }
    }
}

/// `PerfInfo`: sampled profile interrupts landing on a tracked thread.
#[derive(Debug, Default)]
pub struct PerfInfoClassifier;

impl ProviderClassifier for PerfInfoClassifier {
    fn name(&self) -> &'static str {
        "PerfInfo"
    }

    fn classify(
        &self,
        event: &RawEvent<'_>,
        ctx: &ClassifyContext<'_>,
    ) -> Result<ProviderSignal, ClassifyError> {
        if event.opcode != opcodes::SAMPLED_PROFILE {
            return Ok(ProviderSignal::DROP);
        }
        let keep = decode::<SampledProfileHeader>(event)
            .map(|hdr| ctx.threads.contains(hdr.thread_id))
            .unwrap_or(false);
        Ok(ProviderSignal::keep_if(keep))
    }
}

/// `StackWalk`: stacks captured in the target process.
///
/// The provider only ever logs the stack opcode; anything else means the
/// event schema is not the one this classifier was written for.
#[derive(Debug, Default)]
pub struct StackWalkClassifier;

impl ProviderClassifier for StackWalkClassifier {
    fn name(&self) -> &'static str {
        "StackWalk"
    }

    fn classify(
        &self,
        event: &RawEvent<'_>,
        ctx: &ClassifyContext<'_>,
    ) -> Result<ProviderSignal, ClassifyError> {
        if event.opcode != opcodes::STACK_WALK {
            return Err(ClassifyError::UnexpectedOpcode {
                provider: self.name(),
                opcode: event.opcode,
            });
        }
        let keep = decode::<StackWalkHeader>(event)
            .map(|hdr| hdr.stack_process == ctx.target_pid)
            .unwrap_or(false);
        Ok(ProviderSignal::keep_if(keep))
    }
}

/// `Thread`: lifecycle events of the target's threads. Drives the thread set.
#[derive(Debug, Default)]
pub struct ThreadClassifier;

impl ThreadClassifier {
    fn transition(opcode: u8, header: &ThreadHeader) -> Option<ThreadTransition> {
        match opcode {
            opcodes::START | opcodes::DC_START => Some(ThreadTransition::Track(header.thread_id)),
            opcodes::END => Some(ThreadTransition::Untrack(header.thread_id)),
            // Rundown at capture stop; the thread is still alive.
            _ => None,
        }
    }
}

impl ProviderClassifier for ThreadClassifier {
    fn name(&self) -> &'static str {
        "Thread"
    }

    fn classify(
        &self,
        event: &RawEvent<'_>,
        ctx: &ClassifyContext<'_>,
    ) -> Result<ProviderSignal, ClassifyError> {
        match event.opcode {
            opcodes::START | opcodes::END | opcodes::DC_START | opcodes::DC_END => {
                match decode::<ThreadHeader>(event) {
                    Some(hdr) if hdr.process_id == ctx.target_pid => Ok(ProviderSignal {
                        keep: true,
                        transition: Self::transition(event.opcode, &hdr),
                    }),
                    _ => Ok(ProviderSignal::DROP),
                }
            }
            _ => Ok(ProviderSignal::DROP),
        }
    }
}

/// `Process`: lifecycle events of the target process itself.
#[derive(Debug, Default)]
pub struct ProcessClassifier;

impl ProcessClassifier {
    /// Header versions sharing the `TypeGroup1` prefix
    const SUPPORTED_VERSIONS: std::ops::RangeInclusive<u8> = 1..=4;
}

impl ProviderClassifier for ProcessClassifier {
    fn name(&self) -> &'static str {
        "Process"
    }

    fn classify(
        &self,
        event: &RawEvent<'_>,
        ctx: &ClassifyContext<'_>,
    ) -> Result<ProviderSignal, ClassifyError> {
        match event.opcode {
            opcodes::START | opcodes::END | opcodes::DC_START | opcodes::DC_END
                if Self::SUPPORTED_VERSIONS.contains(&event.version) =>
            {
                let keep = decode::<ProcessHeader>(event)
                    .map(|hdr| hdr.process_id == ctx.target_pid)
                    .unwrap_or(false);
                Ok(ProviderSignal::keep_if(keep))
            }
            _ => Ok(ProviderSignal::DROP),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracesieve_shared::providers;
    use tracesieve_shared::EVENT_HEADER_FLAG_64_BIT_HEADER;

    const TARGET: Pid = 1234;

    fn ctx(threads: &ThreadTracker) -> ClassifyContext<'_> {
        ClassifyContext {
            target_pid: TARGET,
            threads,
        }
    }

    fn u32s(values: &[u32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn test_event_trace_always_kept() {
        let threads = ThreadTracker::new();
        let event = RawEvent::new(providers::EVENT_TRACE, 0, 2, 0, 999, &[]);
        let signal = EventTraceClassifier::new("EventTrace")
            .classify(&event, &ctx(&threads))
            .unwrap();
        assert!(signal.keep);
    }

    #[test]
    fn test_image_load_system_pids() {
        let threads = ThreadTracker::new();
        let classifier = ImageLoadClassifier;
        for (pid, expected) in [(0, true), (4, true), (TARGET, true), (77, false)] {
            // 32-bit: base, size, pid
            let data = u32s(&[0x1000, 0x2000, pid]);
            let event = RawEvent::new(providers::IMAGE_LOAD, opcodes::LOAD, 3, 0, 77, &data);
            let signal = classifier.classify(&event, &ctx(&threads)).unwrap();
            assert_eq!(signal.keep, expected, "pid {}", pid);
        }
    }

    #[test]
    fn test_image_load_unsupported_opcode() {
        let threads = ThreadTracker::new();
        let data = u32s(&[0x1000, 0x2000, TARGET]);
        let event = RawEvent::new(providers::IMAGE_LOAD, 33, 3, 0, 0, &data);
        let signal = ImageLoadClassifier.classify(&event, &ctx(&threads)).unwrap();
        assert!(!signal.keep);
    }

    #[test]
    fn test_image_load_short_payload_is_not_pid_zero() {
        let threads = ThreadTracker::new();
        let event = RawEvent::new(providers::IMAGE_LOAD, opcodes::LOAD, 3, 0, 0, &[0u8; 4]);
        let signal = ImageLoadClassifier.classify(&event, &ctx(&threads)).unwrap();
        assert!(!signal.keep);
    }

    #[test]
    fn test_perf_info_needs_tracked_thread() {
        let mut threads = ThreadTracker::new();
        let mut data = 0xffff_f800_0000_1000u64.to_le_bytes().to_vec();
        data.extend_from_slice(&u32s(&[42, 0]));
        let event = RawEvent::new(
            providers::PERF_INFO,
            opcodes::SAMPLED_PROFILE,
            2,
            EVENT_HEADER_FLAG_64_BIT_HEADER,
            0,
            &data,
        );

        assert!(!PerfInfoClassifier.classify(&event, &ctx(&threads)).unwrap().keep);
        threads.apply(ThreadTransition::Track(42));
        assert!(PerfInfoClassifier.classify(&event, &ctx(&threads)).unwrap().keep);

        let other = RawEvent { opcode: 47, ..event };
        assert!(!PerfInfoClassifier.classify(&other, &ctx(&threads)).unwrap().keep);
    }

    #[test]
    fn test_stack_walk_target_and_unexpected_opcode() {
        let threads = ThreadTracker::new();
        let mut data = 5u64.to_le_bytes().to_vec();
        data.extend_from_slice(&u32s(&[TARGET, 88]));
        let event = RawEvent::new(providers::STACK_WALK, opcodes::STACK_WALK, 2, 0, 0, &data);
        assert!(StackWalkClassifier.classify(&event, &ctx(&threads)).unwrap().keep);

        let odd = RawEvent { opcode: 33, ..event };
        let err = StackWalkClassifier.classify(&odd, &ctx(&threads)).unwrap_err();
        assert_eq!(
            err,
            ClassifyError::UnexpectedOpcode {
                provider: "StackWalk",
                opcode: 33
            }
        );
    }

    #[test]
    fn test_thread_transitions_per_opcode() {
        let threads = ThreadTracker::new();
        let data = u32s(&[TARGET, 501]);
        let cases = [
            (opcodes::START, Some(ThreadTransition::Track(501))),
            (opcodes::DC_START, Some(ThreadTransition::Track(501))),
            (opcodes::END, Some(ThreadTransition::Untrack(501))),
            (opcodes::DC_END, None),
        ];
        for (opcode, transition) in cases {
            let event = RawEvent::new(providers::THREAD, opcode, 3, 0, 0, &data);
            let signal = ThreadClassifier.classify(&event, &ctx(&threads)).unwrap();
            assert!(signal.keep);
            assert_eq!(signal.transition, transition, "opcode {}", opcode);
        }
    }

    #[test]
    fn test_thread_of_other_process_untouched() {
        let threads = ThreadTracker::new();
        let data = u32s(&[TARGET + 1, 501]);
        let event = RawEvent::new(providers::THREAD, opcodes::START, 3, 0, TARGET, &data);
        let signal = ThreadClassifier.classify(&event, &ctx(&threads)).unwrap();
        assert_eq!(signal, ProviderSignal::DROP);
    }

    #[test]
    fn test_wide_headers_require_full_struct() {
        let threads = ThreadTracker::new();
        let wide = EVENT_HEADER_FLAG_64_BIT_HEADER;

        // key(8) pid(4), no trailing padding
        let mut process = 0xffff_a000u64.to_le_bytes().to_vec();
        process.extend_from_slice(&u32s(&[TARGET]));
        let event = RawEvent::new(providers::PROCESS, opcodes::START, 3, wide, 0, &process);
        assert!(!ProcessClassifier.classify(&event, &ctx(&threads)).unwrap().keep);

        process.extend_from_slice(&[0; 4]);
        let event = RawEvent::new(providers::PROCESS, opcodes::START, 3, wide, 0, &process);
        assert!(ProcessClassifier.classify(&event, &ctx(&threads)).unwrap().keep);

        // base(8) size(8) pid(4), no trailing padding
        let mut image: Vec<u8> = [0x7ff8_0000u64, 0x1000]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        image.extend_from_slice(&u32s(&[TARGET]));
        let event = RawEvent::new(providers::IMAGE_LOAD, opcodes::LOAD, 3, wide, 0, &image);
        assert!(!ImageLoadClassifier.classify(&event, &ctx(&threads)).unwrap().keep);

        image.extend_from_slice(&[0; 4]);
        let event = RawEvent::new(providers::IMAGE_LOAD, opcodes::LOAD, 3, wide, 0, &image);
        assert!(ImageLoadClassifier.classify(&event, &ctx(&threads)).unwrap().keep);
    }

    #[test]
    fn test_process_versions() {
        let threads = ThreadTracker::new();
        let data = u32s(&[0xabcd, TARGET]);
        for version in 0..=6u8 {
            let event = RawEvent::new(providers::PROCESS, opcodes::START, version, 0, 0, &data);
            let signal = ProcessClassifier.classify(&event, &ctx(&threads)).unwrap();
            assert_eq!(signal.keep, (1..=4).contains(&version), "version {}", version);
        }
    }
}
