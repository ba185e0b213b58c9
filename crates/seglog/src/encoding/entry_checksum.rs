//! Entry checksum schemes.
//!
//! Two interchangeable checksums are supported: CRC-32 with the IEEE
//! polynomial and CRC-64 with the ISO polynomial. The checksum always covers
//! the encoded length prefix concatenated with the payload, never the
//! payload alone, so a corrupted length field fails verification too.

use std::fmt;
use std::io::Read;
use std::sync::OnceLock;

use crate::encoding::read_full;
use crate::error::{Result, WalError};

/// Scratch size sufficient for the widest checksum (CRC-64).
pub const MAX_CHECKSUM_SCRATCH: usize = 8;

/// The checksum scheme applied to every entry of a segment.
///
/// Discriminants start at 1 so that a zeroed header byte is detected as
/// missing rather than silently decoding to a valid variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EntryChecksumType {
    /// CRC-32, IEEE polynomial, serialized as four little-endian bytes.
    Crc32 = 1,
    /// CRC-64, ISO polynomial, serialized as eight little-endian bytes.
    Crc64 = 2,
}

/// The checksum type used when nothing else is configured.
pub const DEFAULT_ENTRY_CHECKSUM_TYPE: EntryChecksumType = EntryChecksumType::Crc32;

/// All supported checksum types, for tests and benchmarks that iterate over
/// every possibility.
pub const ENTRY_CHECKSUM_TYPES: [EntryChecksumType; 2] =
    [EntryChecksumType::Crc32, EntryChecksumType::Crc64];

impl EntryChecksumType {
    /// The header byte for this checksum type.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// The serialized width of this checksum in bytes.
    pub fn width(self) -> usize {
        match self {
            EntryChecksumType::Crc32 => 4,
            EntryChecksumType::Crc64 => 8,
        }
    }
}

impl TryFrom<u8> for EntryChecksumType {
    type Error = WalError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(EntryChecksumType::Crc32),
            2 => Ok(EntryChecksumType::Crc64),
            other => Err(WalError::UnsupportedChecksumType(other)),
        }
    }
}

impl fmt::Display for EntryChecksumType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntryChecksumType::Crc32 => "crc32",
            EntryChecksumType::Crc64 => "crc64",
        };
        f.write_str(name)
    }
}

/// Computes the checksum over `data`, serializes it into the scratch buffer
/// and returns the serialized width. Infallible; I/O happens at the caller.
pub type EntryChecksumWriter = fn(scratch: &mut [u8], data: &[u8]) -> usize;

/// Reads the stored checksum from the reader, recomputes it over `data` and
/// compares. Returns the number of bytes consumed, or
/// [`WalError::ChecksumMismatch`] when verification fails.
pub type EntryChecksumReader =
    fn(reader: &mut dyn Read, scratch: &mut [u8], data: &[u8]) -> Result<usize>;

/// Returns the writer function matching the checksum type.
pub fn entry_checksum_writer(checksum_type: EntryChecksumType) -> EntryChecksumWriter {
    match checksum_type {
        EntryChecksumType::Crc32 => write_entry_checksum_crc32,
        EntryChecksumType::Crc64 => write_entry_checksum_crc64,
    }
}

/// Returns the reader function matching the checksum type.
pub fn entry_checksum_reader(checksum_type: EntryChecksumType) -> EntryChecksumReader {
    match checksum_type {
        EntryChecksumType::Crc32 => read_entry_checksum_crc32,
        EntryChecksumType::Crc64 => read_entry_checksum_crc64,
    }
}

fn crc32_checksum(data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

fn write_entry_checksum_crc32(scratch: &mut [u8], data: &[u8]) -> usize {
    scratch[..4].copy_from_slice(&crc32_checksum(data).to_le_bytes());
    4
}

fn read_entry_checksum_crc32(
    reader: &mut dyn Read,
    scratch: &mut [u8],
    data: &[u8],
) -> Result<usize> {
    read_full(reader, &mut scratch[..4])?;
    let stored = u32::from_le_bytes(scratch[..4].try_into().expect("slice is four bytes"));
    let computed = crc32_checksum(data);
    if stored != computed {
        return Err(WalError::ChecksumMismatch {
            stored: u64::from(stored),
            computed: u64::from(computed),
        });
    }
    Ok(4)
}

/// The CRC-64 ISO polynomial in reflected form.
const CRC64_ISO_POLYNOMIAL: u64 = 0xD800_0000_0000_0000;

fn crc64_table() -> &'static [u64; 256] {
    static TABLE: OnceLock<[u64; 256]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = [0u64; 256];
        for (index, slot) in table.iter_mut().enumerate() {
            let mut crc = index as u64;
            for _ in 0..8 {
                crc = if crc & 1 == 1 {
                    (crc >> 1) ^ CRC64_ISO_POLYNOMIAL
                } else {
                    crc >> 1
                };
            }
            *slot = crc;
        }
        table
    })
}

fn crc64_checksum(data: &[u8]) -> u64 {
    let table = crc64_table();
    let mut crc = !0u64;
    for &byte in data {
        crc = table[((crc ^ u64::from(byte)) & 0xff) as usize] ^ (crc >> 8);
    }
    !crc
}

fn write_entry_checksum_crc64(scratch: &mut [u8], data: &[u8]) -> usize {
    scratch[..8].copy_from_slice(&crc64_checksum(data).to_le_bytes());
    8
}

fn read_entry_checksum_crc64(
    reader: &mut dyn Read,
    scratch: &mut [u8],
    data: &[u8],
) -> Result<usize> {
    read_full(reader, &mut scratch[..8])?;
    let stored = u64::from_le_bytes(scratch[..8].try_into().expect("slice is eight bytes"));
    let computed = crc64_checksum(data);
    if stored != computed {
        return Err(WalError::ChecksumMismatch { stored, computed });
    }
    Ok(8)
}
