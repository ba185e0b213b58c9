//! Segment file naming and directory discovery.
//!
//! Segment files are named after the sequence number of their first entry,
//! zero-padded to 20 decimal digits with the `.wal` suffix, for example
//! `00000000000000000042.wal`. Temporary files created during the atomic
//! segment creation protocol carry the additional `.new` suffix. Anything
//! else in the directory is ignored.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use crate::error::{Result, WalError};

/// Suffix of every segment file.
pub const SEGMENT_SUFFIX: &str = ".wal";

/// Additional suffix of temporary segment files during creation.
pub const TEMP_SUFFIX: &str = ".new";

const SEQUENCE_DIGITS: usize = 20;

/// Returns the file name for the segment starting at `first_sequence_number`.
pub fn segment_file_name(first_sequence_number: u64) -> String {
    format!("{first_sequence_number:020}{SEGMENT_SUFFIX}")
}

/// Returns the full path for the segment starting at `first_sequence_number`.
pub fn segment_path(directory: &Path, first_sequence_number: u64) -> PathBuf {
    directory.join(segment_file_name(first_sequence_number))
}

/// Parses a directory entry name back into a first sequence number.
///
/// Returns `None` for anything that does not match the segment naming
/// scheme exactly.
fn parse_segment_file_name(name: &str) -> Option<u64> {
    let digits = name.strip_suffix(SEGMENT_SUFFIX)?;
    if digits.len() != SEQUENCE_DIGITS || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Lists the first sequence numbers of all segments in the directory,
/// sorted ascending.
pub fn list_segments(directory: &Path) -> Result<Vec<u64>> {
    let mut result = Vec::new();
    for entry in fs::read_dir(directory)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if let Some(first_sequence_number) = parse_segment_file_name(name) {
            result.push(first_sequence_number);
        }
    }
    result.sort_unstable();
    Ok(result)
}

/// Finds the segment containing `sequence_number`: the segment with the
/// greatest first sequence number that is less than or equal to the target.
///
/// Fails with [`WalError::SegmentNotFound`] when the directory holds no such
/// segment, which happens when the directory is empty or the target lies
/// before the oldest segment.
pub fn segment_for_sequence(directory: &Path, sequence_number: u64) -> Result<u64> {
    let segments = list_segments(directory)?;
    match segments.binary_search(&sequence_number) {
        Ok(index) => Ok(segments[index]),
        Err(0) => Err(WalError::SegmentNotFound(sequence_number)),
        Err(index) => Ok(segments[index - 1]),
    }
}

/// Renames a segment file that is still open, preserving the handle.
///
/// On Unix the open handle survives the rename unchanged.
#[cfg(not(windows))]
pub(crate) fn rename_open_segment(
    file: File,
    _offset: u64,
    from: &Path,
    to: &Path,
) -> Result<File> {
    fs::rename(from, to)?;
    Ok(file)
}

/// Renames a segment file that is still open.
///
/// Windows refuses to rename open files, so the handle is closed, the file
/// renamed, and a fresh handle opened and positioned at the previous offset.
#[cfg(windows)]
pub(crate) fn rename_open_segment(file: File, offset: u64, from: &Path, to: &Path) -> Result<File> {
    use std::io::{Seek, SeekFrom};

    drop(file);
    fs::rename(from, to)?;
    let mut file = fs::OpenOptions::new().read(true).write(true).open(to)?;
    file.seek(SeekFrom::Start(offset))?;
    Ok(file)
}
