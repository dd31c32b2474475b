//! Event type definitions
//!
//! [`RawEvent`] is a borrowed view over one trace record as delivered by the
//! capture engine. It carries just enough of the `EVENT_HEADER` to classify
//! the record, plus the untyped user data.

use super::guid::Guid;
use serde::{Deserialize, Serialize};

/// Process ID
pub type Pid = u32;

/// Thread ID
pub type Tid = u32;

/// `EVENT_HEADER_FLAG_32_BIT_HEADER`
pub const EVENT_HEADER_FLAG_32_BIT_HEADER: u16 = 0x0020;

/// `EVENT_HEADER_FLAG_64_BIT_HEADER`
pub const EVENT_HEADER_FLAG_64_BIT_HEADER: u16 = 0x0040;

/// Size of pointer-sized fields inside an event payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PointerWidth {
    Bits32,
    Bits64,
}

impl PointerWidth {
    /// Resolve the width from the event header flags.
    ///
    /// Only the 64-bit flag is consulted; records without it use 32-bit
    /// pointers.
    pub fn from_header_flags(flags: u16) -> Self {
        if flags & EVENT_HEADER_FLAG_64_BIT_HEADER != 0 {
            PointerWidth::Bits64
        } else {
            PointerWidth::Bits32
        }
    }

    /// Header flag announcing this width
    pub fn header_flag(self) -> u16 {
        match self {
            PointerWidth::Bits32 => EVENT_HEADER_FLAG_32_BIT_HEADER,
            PointerWidth::Bits64 => EVENT_HEADER_FLAG_64_BIT_HEADER,
        }
    }

    /// Pointer size in bytes
    pub const fn size(self) -> usize {
        match self {
            PointerWidth::Bits32 => 4,
            PointerWidth::Bits64 => 8,
        }
    }
}

/// Borrowed view over one trace record
#[derive(Debug, Clone, Copy)]
pub struct RawEvent<'a> {
    /// Provider that emitted the event
    pub provider: Guid,

    /// Provider-local event sub-type
    pub opcode: u8,

    /// Event schema revision
    pub version: u8,

    /// `EVENT_HEADER.Flags`
    pub flags: u16,

    /// `EVENT_HEADER.ProcessId`, present on every record
    pub process_id: Pid,

    /// User data as handed over by the capture engine
    pub user_data: &'a [u8],

    /// `UserDataLength` as declared in the record
    pub user_data_length: u16,
}

impl<'a> RawEvent<'a> {
    /// Build a view whose declared length matches the user data.
    ///
    /// User data longer than `u16::MAX` is declared as `u16::MAX`.
    pub fn new(
        provider: Guid,
        opcode: u8,
        version: u8,
        flags: u16,
        process_id: Pid,
        user_data: &'a [u8],
    ) -> Self {
        Self {
            provider,
            opcode,
            version,
            flags,
            process_id,
            user_data,
            user_data_length: u16::try_from(user_data.len()).unwrap_or(u16::MAX),
        }
    }

    /// Pointer width announced by the header flags
    pub fn pointer_width(&self) -> PointerWidth {
        PointerWidth::from_header_flags(self.flags)
    }

    /// The payload bytes that may be interpreted: never more than the
    /// declared length, never more than what is actually present.
    pub fn payload(&self) -> &'a [u8] {
        let declared = usize::from(self.user_data_length);
        &self.user_data[..declared.min(self.user_data.len())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pointer_width_from_flags() {
        assert_eq!(PointerWidth::from_header_flags(0), PointerWidth::Bits32);
        assert_eq!(
            PointerWidth::from_header_flags(EVENT_HEADER_FLAG_32_BIT_HEADER),
            PointerWidth::Bits32
        );
        assert_eq!(
            PointerWidth::from_header_flags(EVENT_HEADER_FLAG_64_BIT_HEADER | 0x0200),
            PointerWidth::Bits64
        );
        assert_eq!(PointerWidth::Bits64.size(), 8);
    }

    #[test]
    fn test_payload_clamped_to_declared_length() {
        let data = [1u8, 2, 3, 4, 5, 6];
        let mut event = RawEvent::new(Guid::zero(), 0, 0, 0, 0, &data);
        assert_eq!(event.payload().len(), 6);

        event.user_data_length = 4;
        assert_eq!(event.payload(), &[1, 2, 3, 4]);

        // A declared length larger than the buffer never reads past it
        event.user_data_length = 64;
        assert_eq!(event.payload().len(), 6);
    }
}
