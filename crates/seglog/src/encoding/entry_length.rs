//! Entry length-prefix encodings.
//!
//! Four interchangeable encodings are supported: fixed-width little-endian
//! u16/u32/u64 and LEB128-style uvarint. Every segment records its encoding
//! in the header, and the reader/writer pick the matching codec function
//! once at open time.

use std::fmt;
use std::io::Read;

use crate::encoding::{read_full, read_full_or_eof};
use crate::error::{Result, WalError};

/// Scratch size sufficient for the widest length encoding (a 10-byte uvarint).
pub const MAX_LENGTH_SCRATCH: usize = 10;

/// The way the length of an entry is encoded on disk.
///
/// Discriminants start at 1 so that a zeroed header byte is detected as
/// missing rather than silently decoding to a valid variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EntryLengthEncoding {
    /// Fixed two-byte little-endian length. Maximum payload 65535 bytes.
    U16 = 1,
    /// Fixed four-byte little-endian length.
    U32 = 2,
    /// Fixed eight-byte little-endian length.
    U64 = 3,
    /// Variable-width unsigned varint, one to ten bytes.
    Uvarint = 4,
}

/// The length encoding used when nothing else is configured.
pub const DEFAULT_ENTRY_LENGTH_ENCODING: EntryLengthEncoding = EntryLengthEncoding::U32;

/// All supported length encodings, for tests and benchmarks that iterate
/// over every possibility.
pub const ENTRY_LENGTH_ENCODINGS: [EntryLengthEncoding; 4] = [
    EntryLengthEncoding::U16,
    EntryLengthEncoding::U32,
    EntryLengthEncoding::U64,
    EntryLengthEncoding::Uvarint,
];

impl EntryLengthEncoding {
    /// The header byte for this encoding.
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for EntryLengthEncoding {
    type Error = WalError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(EntryLengthEncoding::U16),
            2 => Ok(EntryLengthEncoding::U32),
            3 => Ok(EntryLengthEncoding::U64),
            4 => Ok(EntryLengthEncoding::Uvarint),
            other => Err(WalError::UnsupportedLengthEncoding(other)),
        }
    }
}

impl fmt::Display for EntryLengthEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntryLengthEncoding::U16 => "u16",
            EntryLengthEncoding::U32 => "u32",
            EntryLengthEncoding::U64 => "u64",
            EntryLengthEncoding::Uvarint => "uvarint",
        };
        f.write_str(name)
    }
}

/// Encodes a length into the scratch buffer and returns the encoded width.
///
/// Fails with [`WalError::LengthOverflow`] when the length exceeds the
/// encoding's capacity. The scratch buffer must hold at least
/// [`MAX_LENGTH_SCRATCH`] bytes.
pub type EntryLengthWriter = fn(scratch: &mut [u8], length: u64) -> Result<usize>;

/// Decodes a length from the reader, using the scratch buffer as temporary
/// space. Returns `(length, bytes_consumed)`.
///
/// A stream that ends before the first byte of the prefix surfaces as
/// [`WalError::Eof`]; a stream that ends inside the prefix surfaces as
/// [`WalError::UnexpectedEof`].
pub type EntryLengthReader = fn(reader: &mut dyn Read, scratch: &mut [u8]) -> Result<(u64, usize)>;

/// Returns the writer function matching the encoding.
pub fn entry_length_writer(encoding: EntryLengthEncoding) -> EntryLengthWriter {
    match encoding {
        EntryLengthEncoding::U16 => write_entry_length_u16,
        EntryLengthEncoding::U32 => write_entry_length_u32,
        EntryLengthEncoding::U64 => write_entry_length_u64,
        EntryLengthEncoding::Uvarint => write_entry_length_uvarint,
    }
}

/// Returns the reader function matching the encoding.
pub fn entry_length_reader(encoding: EntryLengthEncoding) -> EntryLengthReader {
    match encoding {
        EntryLengthEncoding::U16 => read_entry_length_u16,
        EntryLengthEncoding::U32 => read_entry_length_u32,
        EntryLengthEncoding::U64 => read_entry_length_u64,
        EntryLengthEncoding::Uvarint => read_entry_length_uvarint,
    }
}

fn write_entry_length_u16(scratch: &mut [u8], length: u64) -> Result<usize> {
    let value = u16::try_from(length).map_err(|_| WalError::LengthOverflow)?;
    scratch[..2].copy_from_slice(&value.to_le_bytes());
    Ok(2)
}

fn read_entry_length_u16(reader: &mut dyn Read, scratch: &mut [u8]) -> Result<(u64, usize)> {
    read_full_or_eof(reader, &mut scratch[..2])?;
    let value = u16::from_le_bytes([scratch[0], scratch[1]]);
    Ok((u64::from(value), 2))
}

fn write_entry_length_u32(scratch: &mut [u8], length: u64) -> Result<usize> {
    let value = u32::try_from(length).map_err(|_| WalError::LengthOverflow)?;
    scratch[..4].copy_from_slice(&value.to_le_bytes());
    Ok(4)
}

fn read_entry_length_u32(reader: &mut dyn Read, scratch: &mut [u8]) -> Result<(u64, usize)> {
    read_full_or_eof(reader, &mut scratch[..4])?;
    let value = u32::from_le_bytes(scratch[..4].try_into().expect("slice is four bytes"));
    Ok((u64::from(value), 4))
}

fn write_entry_length_u64(scratch: &mut [u8], length: u64) -> Result<usize> {
    scratch[..8].copy_from_slice(&length.to_le_bytes());
    Ok(8)
}

fn read_entry_length_u64(reader: &mut dyn Read, scratch: &mut [u8]) -> Result<(u64, usize)> {
    read_full_or_eof(reader, &mut scratch[..8])?;
    let value = u64::from_le_bytes(scratch[..8].try_into().expect("slice is eight bytes"));
    Ok((value, 8))
}

fn write_entry_length_uvarint(scratch: &mut [u8], mut length: u64) -> Result<usize> {
    let mut written = 0;
    while length >= 0x80 {
        scratch[written] = (length as u8) | 0x80;
        length >>= 7;
        written += 1;
    }
    scratch[written] = length as u8;
    Ok(written + 1)
}

fn read_entry_length_uvarint(reader: &mut dyn Read, scratch: &mut [u8]) -> Result<(u64, usize)> {
    let mut value: u64 = 0;
    let mut shift: u32 = 0;
    for index in 0..MAX_LENGTH_SCRATCH {
        let byte_slot = &mut scratch[index..index + 1];
        if index == 0 {
            read_full_or_eof(reader, byte_slot)?;
        } else {
            read_full(reader, byte_slot)?;
        }
        let byte = scratch[index];
        if byte < 0x80 {
            if index == MAX_LENGTH_SCRATCH - 1 && byte > 1 {
                // The tenth byte can only contribute a single bit.
                return Err(WalError::LengthOverflow);
            }
            return Ok((value | (u64::from(byte) << shift), index + 1));
        }
        value |= u64::from(byte & 0x7f) << shift;
        shift += 7;
    }
    Err(WalError::LengthOverflow)
}
