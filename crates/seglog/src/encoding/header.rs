//! Segment file header.
//!
//! Every segment file starts with a fixed 16-byte header:
//!
//! ```text
//! offset  size  field
//! 0       4     magic = "WAL\0"
//! 4       2     version (little-endian u16) = 1
//! 6       1     entry length encoding (1=u16, 2=u32, 3=u64, 4=uvarint)
//! 7       1     entry checksum type (1=crc32, 2=crc64)
//! 8       8     first sequence number (little-endian u64)
//! ```

use std::io::{Read, Write};

use crate::encoding::entry_checksum::{EntryChecksumType, DEFAULT_ENTRY_CHECKSUM_TYPE};
use crate::encoding::entry_length::{EntryLengthEncoding, DEFAULT_ENTRY_LENGTH_ENCODING};
use crate::encoding::read_full;
use crate::error::{Result, WalError};

/// Size in bytes of the serialized header.
pub const HEADER_SIZE: usize = 16;

/// The magic bytes expected at the start of every segment file.
pub const MAGIC: [u8; 4] = *b"WAL\0";

/// The currently supported header version.
pub const HEADER_VERSION: u16 = 1;

/// The segment file header.
///
/// The first sequence number is stored both in the file name and in the
/// header so that accidental file renames are detected when a segment is
/// opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Magic bytes identifying a segment file, always [`MAGIC`].
    pub magic: [u8; 4],

    /// Format version, allowing the file format to evolve over time.
    pub version: u16,

    /// The way entry lengths are encoded in this segment.
    pub entry_length_encoding: EntryLengthEncoding,

    /// The checksum scheme applied to entries in this segment.
    pub entry_checksum_type: EntryChecksumType,

    /// The sequence number of the first entry in this segment.
    pub first_sequence_number: u64,
}

impl Header {
    /// Creates a header with the current magic and version.
    pub fn new(
        entry_length_encoding: EntryLengthEncoding,
        entry_checksum_type: EntryChecksumType,
        first_sequence_number: u64,
    ) -> Self {
        Header {
            magic: MAGIC,
            version: HEADER_VERSION,
            entry_length_encoding,
            entry_checksum_type,
            first_sequence_number,
        }
    }
}

impl Default for Header {
    fn default() -> Self {
        Header::new(DEFAULT_ENTRY_LENGTH_ENCODING, DEFAULT_ENTRY_CHECKSUM_TYPE, 0)
    }
}

/// Serializes the header into the scratch buffer and writes it out.
///
/// The scratch buffer must hold at least [`HEADER_SIZE`] bytes.
pub fn write_header(writer: &mut dyn Write, scratch: &mut [u8], header: &Header) -> Result<()> {
    scratch[..4].copy_from_slice(&header.magic);
    scratch[4..6].copy_from_slice(&header.version.to_le_bytes());
    scratch[6] = header.entry_length_encoding.as_u8();
    scratch[7] = header.entry_checksum_type.as_u8();
    scratch[8..16].copy_from_slice(&header.first_sequence_number.to_le_bytes());
    writer.write_all(&scratch[..HEADER_SIZE])?;
    Ok(())
}

/// Reads and validates a header.
///
/// Validation order: a short read surfaces as [`WalError::UnexpectedEof`],
/// then magic, version, length encoding and checksum type are checked in
/// that order.
pub fn read_header(reader: &mut dyn Read, scratch: &mut [u8]) -> Result<Header> {
    read_full(reader, &mut scratch[..HEADER_SIZE])?;

    if scratch[..4] != MAGIC {
        return Err(WalError::InvalidMagic);
    }
    let version = u16::from_le_bytes([scratch[4], scratch[5]]);
    if version != HEADER_VERSION {
        return Err(WalError::UnsupportedVersion(version));
    }
    let entry_length_encoding = EntryLengthEncoding::try_from(scratch[6])?;
    let entry_checksum_type = EntryChecksumType::try_from(scratch[7])?;
    let first_sequence_number =
        u64::from_le_bytes(scratch[8..16].try_into().expect("slice is eight bytes"));

    Ok(Header {
        magic: MAGIC,
        version,
        entry_length_encoding,
        entry_checksum_type,
        first_sequence_number,
    })
}
