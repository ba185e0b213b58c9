//! Error taxonomy for the write-ahead log.
//!
//! Every fallible operation in this crate returns [`WalError`]. The variants
//! are deliberately fine-grained so that callers can pattern-match on the
//! failure kind: header validation problems, per-entry decoding problems and
//! cursor-level signals (`Eof`, `NotAnEntry`) are all distinct.

use std::io;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, WalError>;

/// Errors produced by the write-ahead log.
#[derive(Debug, thiserror::Error)]
pub enum WalError {
    /// Underlying file system error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A read ended before all required bytes were available.
    #[error("Unexpected end of file while more bytes were required")]
    UnexpectedEof,

    /// Clean end of a segment: the cursor stood exactly at the end of the
    /// file when the next entry was requested. Distinct from a partial or
    /// corrupt tail, which surfaces as [`WalError::UnexpectedEof`] or
    /// [`WalError::ChecksumMismatch`] instead.
    #[error("End of segment")]
    Eof,

    /// The segment file does not start with the expected magic bytes.
    #[error("Invalid magic bytes in segment header")]
    InvalidMagic,

    /// The segment header carries a format version this build cannot read.
    #[error("Unsupported segment header version {0}")]
    UnsupportedVersion(u16),

    /// The segment header names an unknown entry length encoding.
    #[error("Unsupported entry length encoding {0}")]
    UnsupportedLengthEncoding(u8),

    /// The segment header names an unknown entry checksum type.
    #[error("Unsupported entry checksum type {0}")]
    UnsupportedChecksumType(u8),

    /// The first sequence number in the header disagrees with the segment
    /// file name. This usually means the file was renamed by accident.
    #[error("Segment header declares first sequence number {found}, expected {expected}")]
    HeaderSeqMismatch {
        /// The first sequence number derived from the file name.
        expected: u64,
        /// The first sequence number stored in the header.
        found: u64,
    },

    /// The payload length exceeds what the configured length encoding can
    /// represent, or a uvarint stream encoded more than 64 bits.
    #[error("Entry length overflows the configured length encoding")]
    LengthOverflow,

    /// A decoded length field would require reading past the end of the
    /// segment file. Checked before allocating, so that a corrupt length
    /// cannot trigger an excessive allocation.
    #[error("Entry length {length} exceeds the {remaining} bytes remaining in the segment")]
    OversizedEntry {
        /// The length decoded from the entry prefix.
        length: u64,
        /// The bytes remaining between the cursor and the end of the file.
        remaining: u64,
    },

    /// The stored entry checksum did not match the checksum computed over
    /// the length prefix and payload.
    #[error("Entry checksum mismatch: stored {stored:#x}, computed {computed:#x}")]
    ChecksumMismatch {
        /// The checksum read from the segment file.
        stored: u64,
        /// The checksum computed over the bytes that were read.
        computed: u64,
    },

    /// Wrapper attached by the segment reader to every failed attempt to
    /// read an entry. Callers can cheaply distinguish "the cursor made no
    /// progress" from success; [`WalError::is_eof`] looks through it.
    #[error("Not a WAL entry")]
    NotAnEntry(#[source] Box<WalError>),

    /// No segment covers the requested sequence number.
    #[error("No segment covers sequence number {0}")]
    SegmentNotFound(u64),

    /// The API was used outside its contract, for example converting a
    /// reader into a writer before reading the segment to its end.
    #[error("Usage error: {0}")]
    UsageError(String),
}

impl WalError {
    /// Reports whether this error signals a clean end of segment, looking
    /// through the [`WalError::NotAnEntry`] wrapper.
    ///
    /// The multi-segment reader uses this to decide between "open the next
    /// segment" and "stop with an error".
    pub fn is_eof(&self) -> bool {
        match self {
            WalError::Eof => true,
            WalError::NotAnEntry(inner) => inner.is_eof(),
            _ => false,
        }
    }

    /// Reports whether this error carries the per-entry failure wrapper.
    pub(crate) fn is_not_an_entry(&self) -> bool {
        matches!(self, WalError::NotAnEntry(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_eof_plain() {
        assert!(WalError::Eof.is_eof());
        assert!(!WalError::UnexpectedEof.is_eof());
        assert!(!WalError::InvalidMagic.is_eof());
    }

    #[test]
    fn test_is_eof_wrapped() {
        let wrapped = WalError::NotAnEntry(Box::new(WalError::Eof));
        assert!(wrapped.is_eof());

        let corrupt = WalError::NotAnEntry(Box::new(WalError::ChecksumMismatch {
            stored: 1,
            computed: 2,
        }));
        assert!(!corrupt.is_eof());
    }

    #[test]
    fn test_source_chain_through_wrapper() {
        use std::error::Error;

        let wrapped = WalError::NotAnEntry(Box::new(WalError::UnexpectedEof));
        let source = wrapped.source().expect("wrapper should expose its inner error");
        assert!(source.to_string().contains("Unexpected end of file"));
    }
}
