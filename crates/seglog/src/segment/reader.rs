//! Single-segment read cursor.
//!
//! A `SegmentReader` is a pull-style cursor over the entries of one segment
//! file. Every failed attempt to read an entry rewinds the file position to
//! where the entry started, so that a writer taking over the file resumes
//! exactly after the last valid entry. This is what makes torn and
//! pre-allocated tails safe to append over.
//!
//! Instances are NOT safe for concurrent use.

use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::{debug, error};

use crate::encoding::{
    entry_checksum_reader, entry_length_reader, read_header, EntryChecksumReader,
    EntryLengthReader, Header, HEADER_SIZE, MAX_CHECKSUM_SCRATCH, MAX_LENGTH_SCRATCH,
};
use crate::error::{Result, WalError};
use crate::metrics::wal_metrics;
use crate::segment::paths::segment_path;
use crate::segment::writer::SegmentWriter;

/// Initial capacity of the entry data buffer.
const INITIAL_DATA_CAPACITY: usize = 4 * 1024;

/// A single entry as returned by a reader.
///
/// The payload borrows the reader's internal buffer and is valid until the
/// next call to `next()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry<'a> {
    /// The sequence number assigned to this entry when it was appended.
    pub sequence_number: u64,

    /// The payload bytes exactly as they were appended.
    pub data: &'a [u8],
}

/// Pull-style cursor over the entries of a single segment file.
#[derive(Debug)]
pub struct SegmentReader {
    /// The segment file, opened read-write so that the handle can later be
    /// transferred into a writer.
    file: std::fs::File,

    /// Path of the segment file.
    path: PathBuf,

    /// The header read from the start of the file.
    header: Header,

    /// Current offset in bytes from the start of the file. Restored on every
    /// failed read so the position stays at the end of the last valid entry.
    offset: u64,

    /// The sequence number the next entry will receive.
    next_sequence_number: u64,

    length_reader: EntryLengthReader,
    checksum_reader: EntryChecksumReader,

    /// Buffer holding the encoded entry currently in view. The length
    /// prefix, payload and checksum scratch all live here so that a single
    /// allocation serves the whole hot path.
    data: Vec<u8>,

    /// Total size of the file in bytes, used to reject length fields that
    /// would read past the end of the segment.
    file_size: u64,

    /// Start of the current payload within `data`.
    value_start: usize,

    /// Length of the current payload.
    value_len: usize,

    /// Sequence number of the current entry.
    current_sequence_number: u64,

    /// The error of the last failed `next()` call.
    err: Option<WalError>,
}

impl SegmentReader {
    /// Opens the segment whose first entry has `first_sequence_number`.
    ///
    /// The header is validated against the file name: a mismatch surfaces as
    /// [`WalError::HeaderSeqMismatch`] and usually means the file was
    /// renamed by accident.
    pub fn open(directory: &Path, first_sequence_number: u64) -> Result<Self> {
        let path = segment_path(directory, first_sequence_number);

        let mut file = OpenOptions::new().read(true).write(true).open(&path)?;

        let mut scratch = [0u8; HEADER_SIZE];
        let header = read_header(&mut file, &mut scratch)?;
        if header.first_sequence_number != first_sequence_number {
            return Err(WalError::HeaderSeqMismatch {
                expected: first_sequence_number,
                found: header.first_sequence_number,
            });
        }

        let file_size = file.metadata()?.len();
        let offset = file.stream_position()?;

        debug!(
            path = %path.display(),
            first_sequence_number,
            file_size,
            "Opened segment for reading"
        );

        Ok(SegmentReader {
            file,
            path,
            length_reader: entry_length_reader(header.entry_length_encoding),
            checksum_reader: entry_checksum_reader(header.entry_checksum_type),
            header,
            offset,
            next_sequence_number: first_sequence_number,
            data: vec![0u8; INITIAL_DATA_CAPACITY],
            file_size,
            value_start: 0,
            value_len: 0,
            current_sequence_number: 0,
            err: None,
        })
    }

    /// The segment file header.
    pub fn header(&self) -> Header {
        self.header
    }

    /// The path of the segment file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current offset in bytes from the start of the file.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// The sequence number the next entry will receive.
    pub fn next_sequence_number(&self) -> u64 {
        self.next_sequence_number
    }

    /// Advances the cursor to the next entry.
    ///
    /// Returns `true` when an entry was read; [`SegmentReader::value`] is
    /// then valid. Returns `false` when no entry could be read; the reason
    /// is available through [`SegmentReader::err`], wrapped in
    /// [`WalError::NotAnEntry`], and the file position has been rewound to
    /// the start of the failed entry.
    pub fn next(&mut self) -> bool {
        match self.read_entry() {
            Ok(()) => {
                let metrics = wal_metrics();
                metrics.read_entry_total.inc();
                metrics.read_entry_bytes_total.add(self.value_len as u64);
                self.err = None;
                true
            }
            Err(err) => {
                if let Err(seek_err) = self.file.seek(SeekFrom::Start(self.offset)) {
                    // The rewind itself failed; the cursor position is now
                    // unreliable and converting to a writer must not happen.
                    error!(
                        path = %self.path.display(),
                        offset = self.offset,
                        error = %seek_err,
                        "Failed to rewind segment after unreadable entry"
                    );
                    self.err = Some(WalError::Io(seek_err));
                    return false;
                }
                self.err = Some(WalError::NotAnEntry(Box::new(err)));
                false
            }
        }
    }

    fn read_entry(&mut self) -> Result<()> {
        // Decode the length prefix. The data buffer doubles as scratch
        // space; it always holds at least the widest prefix.
        let (length, length_bytes) =
            (self.length_reader)(&mut self.file, &mut self.data[..MAX_LENGTH_SCRATCH])?;

        // Validate against the bytes actually left in the file before
        // allocating anything, so a corrupt length cannot trigger an
        // excessive allocation.
        let remaining = self.file_size - self.offset;
        if length > remaining {
            return Err(WalError::OversizedEntry { length, remaining });
        }

        // Grow the buffer to hold prefix scratch, payload and checksum
        // scratch. Growth is 1.5x, computed as x + (x >> 1) to avoid
        // overflow, rounded up to a 4 KiB boundary so allocations amortize
        // and align with page sizes.
        let needed = (MAX_LENGTH_SCRATCH + MAX_CHECKSUM_SCRATCH) as u64 + length;
        if (self.data.len() as u64) < needed {
            let grown = needed + (needed >> 1);
            let grown = (grown + 4095) & !4095;
            let mut new_data = vec![0u8; grown as usize];
            new_data[..length_bytes].copy_from_slice(&self.data[..length_bytes]);
            self.data = new_data;
        }

        // Read the payload. Running dry here is a torn entry, never a clean
        // end of segment, because the length prefix was already consumed.
        let data_end = length_bytes + length as usize;
        crate::encoding::read_full(&mut self.file, &mut self.data[length_bytes..data_end])?;

        // Read the stored checksum and verify it over prefix and payload.
        let (entry_bytes, checksum_scratch) = self.data.split_at_mut(data_end);
        let checksum_bytes =
            (self.checksum_reader)(&mut self.file, checksum_scratch, entry_bytes)?;

        self.value_start = length_bytes;
        self.value_len = length as usize;
        self.current_sequence_number = self.next_sequence_number;
        self.offset += (data_end + checksum_bytes) as u64;
        self.next_sequence_number += 1;
        Ok(())
    }

    /// The entry read by the last successful `next()` call.
    ///
    /// Only valid after `next()` returned `true`.
    pub fn value(&self) -> Entry<'_> {
        Entry {
            sequence_number: self.current_sequence_number,
            data: &self.data[self.value_start..self.value_start + self.value_len],
        }
    }

    /// The error of the last `next()` call, if it failed.
    pub fn err(&self) -> Option<&WalError> {
        self.err.as_ref()
    }

    /// Converts the reader into a writer that appends exactly after the last
    /// valid entry.
    ///
    /// Allowed only after `next()` has returned `false`, which guarantees
    /// that the cursor stands at the end of the readable entries and the
    /// file position has been rewound there. Taking `self` by value makes
    /// use-after-conversion unrepresentable.
    pub fn into_writer(self) -> Result<SegmentWriter> {
        match self.err {
            Some(ref err) if err.is_not_an_entry() => {}
            _ => {
                return Err(WalError::UsageError(
                    "the segment must be read to its end before converting to a writer"
                        .to_string(),
                ));
            }
        }

        SegmentWriter::from_parts(
            self.file,
            self.path,
            self.header,
            self.offset,
            self.next_sequence_number,
        )
    }
}
