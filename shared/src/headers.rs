//! Kernel event header layouts
//!
//! Each kernel provider starts its user data with a small fixed-offset header.
//! Some of them contain pointer-sized fields whose width depends on the
//! bitness the event was logged with, announced by the record's header flags.
//!
//! Headers are decoded field by field with explicit bounds checks. A payload
//! shorter than the header yields `None`. All fields are little-endian.
//!
//! Header sizes are the C struct sizes, trailing padding included: layouts
//! with pointer fields are padded to pointer alignment.

use crate::types::events::{Pid, PointerWidth, RawEvent, Tid};

/// A header that can be read from the front of an event payload.
pub trait EventHeader: Sized {
    /// Minimum payload length for the header at the given width.
    fn size(width: PointerWidth) -> usize;

    /// Read the header fields. The cursor is guaranteed to hold at least
    /// [`EventHeader::size`] bytes.
    fn read(cursor: &mut FieldCursor<'_>) -> Option<Self>;

    /// Decode the header from raw user data at an explicit width.
    fn decode_bytes(bytes: &[u8], width: PointerWidth) -> Option<Self> {
        if bytes.len() < Self::size(width) {
            return None;
        }
        Self::read(&mut FieldCursor::new(bytes, width))
    }
}

/// Decode a header from an event, using the width from its header flags.
pub fn decode<H: EventHeader>(event: &RawEvent<'_>) -> Option<H> {
    H::decode_bytes(event.payload(), event.pointer_width())
}

/// Size of a struct whose fields end at `end`, padded to the pointer alignment.
fn pointer_aligned(end: usize, width: PointerWidth) -> usize {
    end.next_multiple_of(width.size())
}

/// Sequential little-endian reader over a payload
#[derive(Debug)]
pub struct FieldCursor<'a> {
    bytes: &'a [u8],
    offset: usize,
    width: PointerWidth,
}

impl<'a> FieldCursor<'a> {
    pub fn new(bytes: &'a [u8], width: PointerWidth) -> Self {
        Self {
            bytes,
            offset: 0,
            width,
        }
    }

    fn take<const N: usize>(&mut self) -> Option<[u8; N]> {
        let end = self.offset.checked_add(N)?;
        let field = self.bytes.get(self.offset..end)?;
        self.offset = end;
        field.try_into().ok()
    }

    pub fn read_u32(&mut self) -> Option<u32> {
        self.take::<4>().map(u32::from_le_bytes)
    }

    pub fn read_u64(&mut self) -> Option<u64> {
        self.take::<8>().map(u64::from_le_bytes)
    }

    /// Read a pointer-sized field, widened to 64 bits.
    pub fn read_pointer(&mut self) -> Option<u64> {
        match self.width {
            PointerWidth::Bits32 => self.read_u32().map(u64::from),
            PointerWidth::Bits64 => self.read_u64(),
        }
    }
}

/// `Process_V2_V3_V4_TypeGroup1` prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessHeader {
    pub unique_process_key: u64,
    pub process_id: Pid,
}

impl EventHeader for ProcessHeader {
    fn size(width: PointerWidth) -> usize {
        pointer_aligned(width.size() + 4, width)
    }

    fn read(cursor: &mut FieldCursor<'_>) -> Option<Self> {
        Some(Self {
            unique_process_key: cursor.read_pointer()?,
            process_id: cursor.read_u32()?,
        })
    }
}

/// `Thread_V1_V2_V3_V4_TypeGroup1` prefix. Fixed layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadHeader {
    pub process_id: Pid,
    pub thread_id: Tid,
}

impl EventHeader for ThreadHeader {
    fn size(_width: PointerWidth) -> usize {
        8
    }

    fn read(cursor: &mut FieldCursor<'_>) -> Option<Self> {
        Some(Self {
            process_id: cursor.read_u32()?,
            thread_id: cursor.read_u32()?,
        })
    }
}

/// `Image_Load` prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageLoadHeader {
    pub image_base: u64,
    pub image_size: u64,
    pub process_id: Pid,
}

impl EventHeader for ImageLoadHeader {
    fn size(width: PointerWidth) -> usize {
        pointer_aligned(width.size() * 2 + 4, width)
    }

    fn read(cursor: &mut FieldCursor<'_>) -> Option<Self> {
        Some(Self {
            image_base: cursor.read_pointer()?,
            image_size: cursor.read_pointer()?,
            process_id: cursor.read_u32()?,
        })
    }
}

/// `SampledProfile` prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampledProfileHeader {
    pub instruction_pointer: u64,
    pub thread_id: Tid,
}

impl EventHeader for SampledProfileHeader {
    fn size(width: PointerWidth) -> usize {
        pointer_aligned(width.size() + 4, width)
    }

    fn read(cursor: &mut FieldCursor<'_>) -> Option<Self> {
        Some(Self {
            instruction_pointer: cursor.read_pointer()?,
            thread_id: cursor.read_u32()?,
        })
    }
}

/// `StackWalk_Event` prefix.
///
/// Always decoded with the fixed layout: the leading fields are not
/// pointer-sized, so the record's bitness does not move them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackWalkHeader {
    pub event_timestamp: u64,
    pub stack_process: Pid,
    pub stack_thread: Tid,
}

impl EventHeader for StackWalkHeader {
    fn size(_width: PointerWidth) -> usize {
        16
    }

    fn read(cursor: &mut FieldCursor<'_>) -> Option<Self> {
        Some(Self {
            event_timestamp: cursor.read_u64()?,
            stack_process: cursor.read_u32()?,
            stack_thread: cursor.read_u32()?,
        })
    }
}
