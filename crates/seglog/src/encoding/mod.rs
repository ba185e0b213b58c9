//! On-disk byte formats for the write-ahead log.
//!
//! This module centralizes all serialization logic for segment files:
//!
//! - `entry_length`: the four interchangeable length-prefix encodings
//! - `entry_checksum`: the two interchangeable checksum schemes
//! - `header`: the fixed 16-byte segment header
//!
//! All on-disk integers are little-endian. Codecs are dispatched through
//! plain function pointers selected once from the segment header, and they
//! encode into caller-supplied scratch buffers so the hot path stays free of
//! allocations.

pub mod entry_checksum;
pub mod entry_length;
pub mod header;

pub use entry_checksum::{
    entry_checksum_reader, entry_checksum_writer, EntryChecksumReader, EntryChecksumType,
    EntryChecksumWriter, DEFAULT_ENTRY_CHECKSUM_TYPE, ENTRY_CHECKSUM_TYPES, MAX_CHECKSUM_SCRATCH,
};
pub use entry_length::{
    entry_length_reader, entry_length_writer, EntryLengthEncoding, EntryLengthReader,
    EntryLengthWriter, DEFAULT_ENTRY_LENGTH_ENCODING, ENTRY_LENGTH_ENCODINGS, MAX_LENGTH_SCRATCH,
};
pub use header::{read_header, write_header, Header, HEADER_SIZE, HEADER_VERSION, MAGIC};

use std::io::{self, Read};

use crate::error::{Result, WalError};

/// Scratch size sufficient for any length prefix or checksum.
pub const MAX_SCRATCH: usize = if MAX_LENGTH_SCRATCH > MAX_CHECKSUM_SCRATCH {
    MAX_LENGTH_SCRATCH
} else {
    MAX_CHECKSUM_SCRATCH
};

/// Fills `buf` completely, mapping any shortage to `UnexpectedEof`.
pub(crate) fn read_full(reader: &mut dyn Read, buf: &mut [u8]) -> Result<()> {
    read_full_inner(reader, buf, false)
}

/// Fills `buf` completely. A stream that is already exhausted before the
/// first byte surfaces as `Eof`; running dry part-way through surfaces as
/// `UnexpectedEof`. The distinction is what lets the segment reader tell a
/// clean end of segment from a torn tail.
pub(crate) fn read_full_or_eof(reader: &mut dyn Read, buf: &mut [u8]) -> Result<()> {
    read_full_inner(reader, buf, true)
}

fn read_full_inner(reader: &mut dyn Read, buf: &mut [u8], eof_at_start: bool) -> Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => {
                return Err(if filled == 0 && eof_at_start {
                    WalError::Eof
                } else {
                    WalError::UnexpectedEof
                });
            }
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(WalError::Io(err)),
        }
    }
    Ok(())
}
