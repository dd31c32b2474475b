//! Trace container framing.
//!
//! A container is a file header (magic + format version) followed by frames.
//! Each frame is a little-endian `u32` length and a bincode-encoded
//! [`TraceRecord`]. Bincode uses an explicit config (fixint encoding) so the
//! writer and reader always agree on the encoding of lengths and integers.

use crate::types::events::{Pid, RawEvent, Tid};
use crate::types::guid::Guid;
use bincode::Options;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use thiserror::Error;

/// Container magic
pub const MAGIC: &[u8; 8] = b"TSVTRACE";

/// Container format version
pub const FORMAT_VERSION: u32 = 1;

/// Upper bound for a single frame
pub const MAX_FRAME_LEN: u32 = 16 * 1024 * 1024;

fn wire_bincode() -> impl bincode::config::Options {
    bincode::config::DefaultOptions::new()
        .with_fixint_encoding()
        .allow_trailing_bytes()
}

#[derive(Debug, Error)]
pub enum WireError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("not a trace container (bad magic)")]
    BadMagic,

    #[error("unsupported container version {found}")]
    UnsupportedVersion { found: u32 },

    #[error("frame of {len} bytes exceeds the 16 MiB limit")]
    FrameTooLarge { len: u32 },

    #[error("container ends in the middle of a frame")]
    Truncated,

    #[error("failed to decode record: {0}")]
    Codec(#[from] bincode::Error),
}

/// One recorded kernel event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceRecord {
    pub provider: Guid,
    pub opcode: u8,
    pub version: u8,
    pub flags: u16,
    pub process_id: Pid,
    pub thread_id: Tid,
    pub timestamp: i64,
    pub user_data: Vec<u8>,
}

impl TraceRecord {
    /// Borrowed classification view of this record
    pub fn as_raw_event(&self) -> RawEvent<'_> {
        RawEvent::new(
            self.provider,
            self.opcode,
            self.version,
            self.flags,
            self.process_id,
            &self.user_data,
        )
    }
}

/// Writes records to a container file
pub struct TraceWriter<W: Write = BufWriter<File>> {
    inner: W,
    written: u64,
}

impl TraceWriter<BufWriter<File>> {
    /// Create (or truncate) a container file and write its header.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, WireError> {
        let file = File::create(path)?;
        Self::new(BufWriter::new(file))
    }
}

impl<W: Write> TraceWriter<W> {
    pub fn new(mut inner: W) -> Result<Self, WireError> {
        inner.write_all(MAGIC)?;
        inner.write_all(&FORMAT_VERSION.to_le_bytes())?;
        Ok(Self { inner, written: 0 })
    }

    pub fn write(&mut self, record: &TraceRecord) -> Result<(), WireError> {
        let bytes = wire_bincode().serialize(record)?;
        let len = u32::try_from(bytes.len())
            .ok()
            .filter(|len| *len <= MAX_FRAME_LEN)
            .ok_or(WireError::FrameTooLarge {
                len: u32::try_from(bytes.len()).unwrap_or(u32::MAX),
            })?;
        self.inner.write_all(&len.to_le_bytes())?;
        self.inner.write_all(&bytes)?;
        self.written += 1;
        Ok(())
    }

    /// Number of records written so far
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flush and hand back the underlying writer.
    pub fn finish(mut self) -> Result<W, WireError> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

/// Reads records from a container file
pub struct TraceReader<R: Read = BufReader<File>> {
    inner: R,
}

impl TraceReader<BufReader<File>> {
    /// Open a container file and validate its header.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, WireError> {
        let file = File::open(path)?;
        Self::new(BufReader::new(file))
    }
}

impl<R: Read> TraceReader<R> {
    pub fn new(mut inner: R) -> Result<Self, WireError> {
        let mut magic = [0u8; 8];
        read_exact_or(&mut inner, &mut magic, WireError::BadMagic)?;
        if &magic != MAGIC {
            return Err(WireError::BadMagic);
        }

        let mut version = [0u8; 4];
        read_exact_or(&mut inner, &mut version, WireError::Truncated)?;
        let found = u32::from_le_bytes(version);
        if found != FORMAT_VERSION {
            return Err(WireError::UnsupportedVersion { found });
        }

        Ok(Self { inner })
    }

    /// Read the next record; `Ok(None)` at a clean end of file.
    pub fn next_record(&mut self) -> Result<Option<TraceRecord>, WireError> {
        let mut len_bytes = [0u8; 4];
        let mut filled = 0;
        while filled < len_bytes.len() {
            match self.inner.read(&mut len_bytes[filled..]) {
                Ok(0) if filled == 0 => return Ok(None),
                Ok(0) => return Err(WireError::Truncated),
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        let len = u32::from_le_bytes(len_bytes);
        if len > MAX_FRAME_LEN {
            return Err(WireError::FrameTooLarge { len });
        }

        let mut frame = vec![0u8; len as usize];
        read_exact_or(&mut self.inner, &mut frame, WireError::Truncated)?;
        Ok(Some(wire_bincode().deserialize(&frame)?))
    }
}

impl<R: Read> Iterator for TraceReader<R> {
    type Item = Result<TraceRecord, WireError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

fn read_exact_or<R: Read>(
    reader: &mut R,
    buf: &mut [u8],
    eof: WireError,
) -> Result<(), WireError> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(eof),
        Err(e) => Err(e.into()),
    }
}
