//! Kernel provider identifiers and opcodes
//!
//! The GUID values are fixed by the Windows kernel logger and must match
//! byte for byte. Opcodes are provider-local.

use super::guid::Guid;

/// `EventTraceGuid`: trace header and session bookkeeping events
pub const EVENT_TRACE: Guid = Guid::from_fields(
    0x68fdd900,
    0x4a3e,
    0x11d1,
    [0x84, 0xf4, 0x00, 0x00, 0xf8, 0x04, 0x64, 0xe3],
);

/// `EventTraceConfigGuid`: hardware/system configuration rundown
pub const EVENT_TRACE_CONFIG: Guid = Guid::from_fields(
    0x01853a65,
    0x418f,
    0x4f36,
    [0xae, 0xfc, 0xdc, 0x0f, 0x1d, 0x2f, 0xd2, 0x35],
);

/// `ImageLoadGuid`
pub const IMAGE_LOAD: Guid = Guid::from_fields(
    0x2cb15d1d,
    0x5fc1,
    0x11d2,
    [0xab, 0xe1, 0x00, 0xa0, 0xc9, 0x11, 0xf5, 0x18],
);

/// `PerfInfoGuid`: sampled profile interrupts among others
pub const PERF_INFO: Guid = Guid::from_fields(
    0xce1dbfb4,
    0x137e,
    0x4da6,
    [0x87, 0xb0, 0x3f, 0x59, 0xaa, 0x10, 0x2c, 0xbc],
);

/// `StackWalkGuid`
pub const STACK_WALK: Guid = Guid::from_fields(
    0xdef2fe46,
    0x7bd6,
    0x4b80,
    [0xbd, 0x94, 0xf5, 0x7f, 0xe2, 0x0d, 0x0c, 0xe3],
);

/// `ThreadGuid`
pub const THREAD: Guid = Guid::from_fields(
    0x3d6fa8d1,
    0xfe05,
    0x11d0,
    [0x9d, 0xda, 0x00, 0xc0, 0x4f, 0xd7, 0xba, 0x7c],
);

/// `ProcessGuid`
pub const PROCESS: Guid = Guid::from_fields(
    0x3d6fa8d0,
    0xfe05,
    0x11d0,
    [0x9d, 0xda, 0x00, 0xc0, 0x4f, 0xd7, 0xba, 0x7c],
);

/// Every provider the filter knows how to classify, with a display name.
pub const KNOWN_PROVIDERS: [(Guid, &str); 7] = [
    (EVENT_TRACE, "EventTrace"),
    (EVENT_TRACE_CONFIG, "EventTraceConfig"),
    (IMAGE_LOAD, "ImageLoad"),
    (PERF_INFO, "PerfInfo"),
    (STACK_WALK, "StackWalk"),
    (THREAD, "Thread"),
    (PROCESS, "Process"),
];

/// Human-readable name of a known provider
pub fn provider_name(guid: &Guid) -> Option<&'static str> {
    KNOWN_PROVIDERS
        .iter()
        .find(|(known, _)| known == guid)
        .map(|(_, name)| *name)
}

/// Generic `EVENT_TRACE_TYPE_*` opcodes plus the provider-specific ones used here.
pub mod opcodes {
    pub const START: u8 = 1;
    pub const END: u8 = 2;
    pub const DC_START: u8 = 3;
    pub const DC_END: u8 = 4;
    pub const LOAD: u8 = 10;

    /// PerfInfo `SampledProfile`
    pub const SAMPLED_PROFILE: u8 = 46;

    /// StackWalk `Stack`
    pub const STACK_WALK: u8 = 32;
}
