//! Write-ahead log initialization.
//!
//! A directory is initialized when it holds at least one segment file. The
//! very first segment is created through the same atomic protocol used at
//! rollover, so even initialization cannot leave a half-written segment
//! visible.

use std::fs;
use std::path::Path;

use tracing::info;

use crate::encoding::entry_checksum::DEFAULT_ENTRY_CHECKSUM_TYPE;
use crate::encoding::entry_length::DEFAULT_ENTRY_LENGTH_ENCODING;
use crate::error::{Result, WalError};
use crate::segment::{list_segments, SegmentConfig, SegmentWriter};
use crate::wal::writer::WriterOptions;

/// Reports whether the directory already holds a write-ahead log.
pub fn is_initialized(directory: impl AsRef<Path>) -> Result<bool> {
    Ok(!list_segments(directory.as_ref())?.is_empty())
}

/// Initializes a new write-ahead log in the directory.
///
/// Creates the directory if needed and writes the first segment, whose
/// first sequence number, codecs and pre-allocation come from `options`.
/// Refuses with [`WalError::UsageError`] when the directory already holds
/// segments.
pub fn init(directory: impl AsRef<Path>, options: WriterOptions) -> Result<()> {
    let directory = directory.as_ref();
    fs::create_dir_all(directory)?;

    if !list_segments(directory)?.is_empty() {
        return Err(WalError::UsageError(format!(
            "a write-ahead log is already initialized in {}",
            directory.display()
        )));
    }

    let config = SegmentConfig {
        pre_allocation_size: options.pre_allocation_size,
        entry_length_encoding: options
            .entry_length_encoding
            .unwrap_or(DEFAULT_ENTRY_LENGTH_ENCODING),
        entry_checksum_type: options
            .entry_checksum_type
            .unwrap_or(DEFAULT_ENTRY_CHECKSUM_TYPE),
    };
    let segment = SegmentWriter::create(directory, options.first_sequence_number, &config)?;
    segment.close()?;

    info!(directory = %directory.display(), "Initialized write-ahead log");
    Ok(())
}

/// Initializes the directory with default options unless it already holds a
/// write-ahead log.
pub fn init_if_required(directory: impl AsRef<Path>) -> Result<()> {
    let directory = directory.as_ref();
    fs::create_dir_all(directory)?;
    if is_initialized(directory)? {
        return Ok(());
    }
    init(directory, WriterOptions::new())
}
