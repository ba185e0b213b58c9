//! Multi-segment read cursor.
//!
//! The reader abstracts away the fact that the log is spread over many
//! segment files: reaching the clean end of one segment makes the cursor
//! open the segment whose first sequence number continues where the current
//! one ended. When no such segment exists, the end of the log has been
//! reached and the reader can be converted into a writer.
//!
//! Instances are NOT safe for concurrent use.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::encoding::Header;
use crate::error::{Result, WalError};
use crate::segment::{segment_for_sequence, Entry, SegmentReader};
use crate::wal::writer::{Writer, WriterOptions};

/// Read cursor over the whole write-ahead log.
#[derive(Debug)]
pub struct Reader {
    directory: PathBuf,

    /// The segment currently being read.
    segment_reader: SegmentReader,

    /// Errors raised by the reader itself, for example a failure to open
    /// the follow-up segment. Per-entry errors stay in the segment reader.
    err: Option<WalError>,
}

impl Reader {
    /// Opens the log for reading, positioned so that the next entry
    /// returned carries `sequence_number`.
    ///
    /// The segment containing the target is located by binary search and
    /// entries before the target are skipped. Fails with
    /// [`WalError::SegmentNotFound`] when the target lies before the oldest
    /// segment, inside a gap, or past the end of the log.
    pub fn new(directory: impl AsRef<Path>, sequence_number: u64) -> Result<Self> {
        let directory = directory.as_ref().to_path_buf();

        let first_sequence_number = segment_for_sequence(&directory, sequence_number)?;
        let segment_reader = SegmentReader::open(&directory, first_sequence_number)?;

        let mut reader = Reader {
            directory,
            segment_reader,
            err: None,
        };
        while reader.next_sequence_number() < sequence_number && reader.next() {
            // Skip entries until the cursor stands on the target.
        }
        if reader.next_sequence_number() != sequence_number {
            if let Some(err) = reader.err() {
                warn!(
                    sequence_number,
                    error = %err,
                    "Requested sequence number is not reachable"
                );
            }
            return Err(WalError::SegmentNotFound(sequence_number));
        }
        Ok(reader)
    }

    /// The header of the segment currently being read.
    pub fn header(&self) -> Header {
        self.segment_reader.header()
    }

    /// The path of the segment file currently being read.
    pub fn file_path(&self) -> &Path {
        self.segment_reader.path()
    }

    /// Current offset in bytes from the start of the current segment file.
    pub fn offset(&self) -> u64 {
        self.segment_reader.offset()
    }

    /// The sequence number the next entry will receive.
    pub fn next_sequence_number(&self) -> u64 {
        self.segment_reader.next_sequence_number()
    }

    /// Advances the cursor to the next entry, crossing segment boundaries
    /// as needed.
    ///
    /// Returns `true` when an entry was read. Returns `false` at the end of
    /// the log or on an error; [`Reader::err`] tells the two apart. The end
    /// of the log is an error that satisfies [`WalError::is_eof`] (the last
    /// segment ended cleanly and no follow-up segment exists) or wraps the
    /// torn tail of the last segment.
    pub fn next(&mut self) -> bool {
        self.err = None;
        loop {
            if self.segment_reader.next() {
                return true;
            }

            if !self.segment_reader.err().is_some_and(WalError::is_eof) {
                // A torn tail or corruption: no follow-up segment can
                // legitimately continue this one.
                return false;
            }

            // Clean end of segment: the log continues in the segment whose
            // first sequence number is our next sequence number, if any.
            let next_first = self.segment_reader.next_sequence_number();
            match SegmentReader::open(&self.directory, next_first) {
                Ok(next_reader) => {
                    debug!(
                        path = %next_reader.path().display(),
                        "Crossed into next segment"
                    );
                    self.segment_reader = next_reader;
                }
                Err(WalError::Io(err)) if err.kind() == io::ErrorKind::NotFound => {
                    // End of the log. The segment reader keeps its EOF
                    // signal so that conversion to a writer stays possible.
                    return false;
                }
                Err(open_err) => {
                    self.err = Some(open_err);
                    return false;
                }
            }
        }
    }

    /// The entry read by the last successful [`Reader::next`] call.
    pub fn value(&self) -> Entry<'_> {
        self.segment_reader.value()
    }

    /// The error of the last [`Reader::next`] call, if it failed.
    pub fn err(&self) -> Option<&WalError> {
        self.err.as_ref().or_else(|| self.segment_reader.err())
    }

    /// Converts the reader into a writer appending exactly after the last
    /// valid entry.
    ///
    /// Only allowed once [`Reader::next`] has returned `false` with the
    /// cursor on the last segment, which is the only way to know that all
    /// entries have been read. Taking `self` by value makes any use of the
    /// reader after conversion unrepresentable.
    pub fn into_writer(self, options: WriterOptions) -> Result<Writer> {
        if let Some(err) = &self.err {
            return Err(WalError::UsageError(format!(
                "the reader did not reach the end of the log: {err}"
            )));
        }

        let segment_writer = self.segment_reader.into_writer()?;
        Writer::from_segment_writer(self.directory, segment_writer, options)
    }

    /// Closes the underlying segment file.
    pub fn close(self) -> Result<()> {
        drop(self.segment_reader);
        Ok(())
    }
}
