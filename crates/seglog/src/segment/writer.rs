//! Single-segment append cursor.
//!
//! A `SegmentWriter` owns the file handle of exactly one segment and tracks
//! the byte offset and the sequence number the next entry will receive.
//! It never flushes on its own; durability is the sync policy's concern.
//!
//! Instances are NOT safe for concurrent use. The multi-segment writer
//! serializes access with its own lock.

use std::fs::{self, OpenOptions};
use std::io::{self, Seek, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info};

use crate::encoding::{
    entry_checksum_writer, entry_length_writer, write_header, EntryChecksumType,
    EntryChecksumWriter, EntryLengthEncoding, EntryLengthWriter, Header, HEADER_SIZE, MAX_SCRATCH,
};
use crate::error::Result;
use crate::metrics::wal_metrics;
use crate::segment::paths::{rename_open_segment, segment_path, TEMP_SUFFIX};

/// Configuration for creating a new segment file.
#[derive(Debug, Clone)]
pub struct SegmentConfig {
    /// Bytes to pre-extend the new segment file by. Zero disables
    /// pre-allocation.
    pub pre_allocation_size: u64,

    /// Length encoding recorded in the header and used for all entries.
    pub entry_length_encoding: EntryLengthEncoding,

    /// Checksum type recorded in the header and used for all entries.
    pub entry_checksum_type: EntryChecksumType,
}

/// Append cursor over a single segment file.
#[derive(Debug)]
pub struct SegmentWriter {
    /// The segment file. The handle is positioned at `offset`.
    file: fs::File,

    /// Final path of the segment file.
    path: PathBuf,

    /// The header written at the start of the file. Immutable after
    /// construction.
    header: Header,

    /// Current offset in bytes from the start of the file.
    offset: u64,

    /// The sequence number the next entry will receive.
    next_sequence_number: u64,

    length_writer: EntryLengthWriter,
    checksum_writer: EntryChecksumWriter,

    /// Scratch space for length and checksum serialization.
    scratch: [u8; MAX_SCRATCH],

    /// Reusable buffer combining length prefix, payload and checksum into a
    /// single write call.
    buffer: Vec<u8>,
}

impl SegmentWriter {
    /// Creates a new segment file in `directory`.
    ///
    /// The file is created under a temporary `.new` name, pre-allocated,
    /// given its header, flushed, and only then renamed to its final name.
    /// Readers therefore never observe a segment without a valid header.
    pub fn create(
        directory: &Path,
        first_sequence_number: u64,
        config: &SegmentConfig,
    ) -> Result<Self> {
        let final_path = segment_path(directory, first_sequence_number);
        let temp_path = {
            let mut name = final_path.as_os_str().to_owned();
            name.push(TEMP_SUFFIX);
            PathBuf::from(name)
        };

        // A leftover temporary file from an earlier failed creation attempt
        // must not survive into the new attempt.
        match fs::remove_file(&temp_path) {
            Ok(()) => debug!(path = %temp_path.display(), "Removed stale temporary segment file"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }

        let mut open_options = OpenOptions::new();
        open_options.create(true).truncate(true).read(true).write(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            open_options.mode(0o664);
        }
        let mut file = open_options.open(&temp_path)?;

        if config.pre_allocation_size > 0 {
            file.set_len(config.pre_allocation_size)?;
        }

        let header = Header::new(
            config.entry_length_encoding,
            config.entry_checksum_type,
            first_sequence_number,
        );
        let mut scratch = [0u8; HEADER_SIZE];
        write_header(&mut file, &mut scratch, &header)?;
        file.sync_all()?;

        let mut file = rename_open_segment(file, HEADER_SIZE as u64, &temp_path, &final_path)?;
        let offset = file.stream_position()?;

        info!(
            path = %final_path.display(),
            first_sequence_number,
            pre_allocation_size = config.pre_allocation_size,
            "Created segment"
        );

        Self::from_parts(file, final_path, header, offset, first_sequence_number)
    }

    /// Builds a writer from an already-open segment file.
    ///
    /// Used by [`SegmentReader::into_writer`](crate::segment::SegmentReader::into_writer)
    /// to continue appending exactly after the last valid entry.
    pub(crate) fn from_parts(
        file: fs::File,
        path: PathBuf,
        header: Header,
        offset: u64,
        next_sequence_number: u64,
    ) -> Result<Self> {
        Ok(SegmentWriter {
            file,
            path,
            length_writer: entry_length_writer(header.entry_length_encoding),
            checksum_writer: entry_checksum_writer(header.entry_checksum_type),
            header,
            offset,
            next_sequence_number,
            scratch: [0u8; MAX_SCRATCH],
            buffer: Vec::with_capacity(1024),
        })
    }

    /// The segment file header.
    pub fn header(&self) -> Header {
        self.header
    }

    /// Current offset in bytes from the start of the file.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// The sequence number the next entry will receive.
    pub fn next_sequence_number(&self) -> u64 {
        self.next_sequence_number
    }

    /// The path of the segment file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends the payload as a new entry and returns its sequence number.
    ///
    /// The length prefix, payload and checksum are assembled into one
    /// contiguous blob and written with a single write call. The entry is
    /// not flushed; call [`SegmentWriter::sync`] (or rely on the sync
    /// policy) for durability.
    pub fn append_entry(&mut self, payload: &[u8]) -> Result<u64> {
        self.buffer.clear();
        let length_bytes = (self.length_writer)(&mut self.scratch, payload.len() as u64)?;
        self.buffer.extend_from_slice(&self.scratch[..length_bytes]);
        self.buffer.extend_from_slice(payload);
        // The checksum covers the length prefix and the payload, which is
        // exactly what the buffer holds at this point.
        let checksum_bytes = (self.checksum_writer)(&mut self.scratch, &self.buffer);
        self.buffer.extend_from_slice(&self.scratch[..checksum_bytes]);

        self.file.write_all(&self.buffer)?;

        let sequence_number = self.next_sequence_number;
        self.next_sequence_number += 1;
        self.offset += self.buffer.len() as u64;

        let metrics = wal_metrics();
        metrics.append_entry_total.inc();
        metrics.append_entry_bytes_total.add(payload.len() as u64);

        Ok(sequence_number)
    }

    /// Flushes all written data to stable storage.
    pub fn sync(&mut self) -> Result<()> {
        let started = Instant::now();
        self.file.sync_all()?;

        let metrics = wal_metrics();
        metrics.sync_total.inc();
        metrics
            .sync_duration_seconds
            .observe(started.elapsed().as_secs_f64());
        Ok(())
    }

    /// Truncates the file at the current offset, discarding any
    /// pre-allocated tail. Used at rollover and at normal close so that the
    /// file size equals the bytes actually written.
    pub fn truncate(&mut self) -> Result<()> {
        self.file.set_len(self.offset)?;
        Ok(())
    }

    /// Closes the segment file without flushing. The sync policy's shutdown
    /// runs before this and owns the final flush.
    pub fn close(self) -> Result<()> {
        drop(self.file);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::{
        DEFAULT_ENTRY_CHECKSUM_TYPE, DEFAULT_ENTRY_LENGTH_ENCODING, MAGIC,
    };
    use tempfile::tempdir;

    fn test_config() -> SegmentConfig {
        SegmentConfig {
            pre_allocation_size: 0,
            entry_length_encoding: DEFAULT_ENTRY_LENGTH_ENCODING,
            entry_checksum_type: DEFAULT_ENTRY_CHECKSUM_TYPE,
        }
    }

    #[test]
    fn test_create_writes_header_and_renames() {
        let dir = tempdir().unwrap();
        let writer = SegmentWriter::create(dir.path(), 0, &test_config()).unwrap();

        assert_eq!(writer.offset(), HEADER_SIZE as u64);
        assert_eq!(writer.next_sequence_number(), 0);
        assert!(writer.path().exists());
        assert!(!dir.path().join("00000000000000000000.wal.new").exists());

        let bytes = std::fs::read(writer.path()).unwrap();
        assert_eq!(&bytes[..4], &MAGIC);
    }

    #[test]
    fn test_create_removes_stale_temp_file() {
        let dir = tempdir().unwrap();
        let stale = dir.path().join("00000000000000000005.wal.new");
        std::fs::write(&stale, b"leftover").unwrap();

        let writer = SegmentWriter::create(dir.path(), 5, &test_config()).unwrap();
        assert!(!stale.exists());
        assert_eq!(writer.header().first_sequence_number, 5);
    }

    #[test]
    fn test_pre_allocation() {
        let dir = tempdir().unwrap();
        let config = SegmentConfig {
            pre_allocation_size: 4096,
            ..test_config()
        };
        let writer = SegmentWriter::create(dir.path(), 0, &config).unwrap();

        let size = std::fs::metadata(writer.path()).unwrap().len();
        assert_eq!(size, 4096);
        // The cursor still sits right after the header.
        assert_eq!(writer.offset(), HEADER_SIZE as u64);
    }

    #[test]
    fn test_append_advances_offset_and_sequence() {
        let dir = tempdir().unwrap();
        let mut writer = SegmentWriter::create(dir.path(), 0, &test_config()).unwrap();

        let seq = writer.append_entry(b"foo").unwrap();
        assert_eq!(seq, 0);
        // u32 length prefix (4) + payload (3) + crc32 (4)
        assert_eq!(writer.offset(), HEADER_SIZE as u64 + 11);

        let seq = writer.append_entry(b"").unwrap();
        assert_eq!(seq, 1);
        assert_eq!(writer.offset(), HEADER_SIZE as u64 + 11 + 8);
        assert_eq!(writer.next_sequence_number(), 2);
    }

    #[test]
    fn test_truncate_discards_pre_allocated_tail() {
        let dir = tempdir().unwrap();
        let config = SegmentConfig {
            pre_allocation_size: 8192,
            ..test_config()
        };
        let mut writer = SegmentWriter::create(dir.path(), 0, &config).unwrap();
        writer.append_entry(b"payload").unwrap();

        let offset = writer.offset();
        writer.truncate().unwrap();

        let size = std::fs::metadata(writer.path()).unwrap().len();
        assert_eq!(size, offset);
    }

    #[test]
    fn test_length_overflow_leaves_writer_usable() {
        let dir = tempdir().unwrap();
        let config = SegmentConfig {
            entry_length_encoding: EntryLengthEncoding::U16,
            ..test_config()
        };
        let mut writer = SegmentWriter::create(dir.path(), 0, &config).unwrap();

        let oversized = vec![0u8; usize::from(u16::MAX) + 1];
        let err = writer.append_entry(&oversized).unwrap_err();
        assert!(matches!(err, crate::WalError::LengthOverflow));

        // The failed append must not have advanced the cursor.
        assert_eq!(writer.offset(), HEADER_SIZE as u64);
        assert_eq!(writer.next_sequence_number(), 0);
        assert_eq!(writer.append_entry(b"ok").unwrap(), 0);
    }
}
