//! Single-segment cursors and segment file management.
//!
//! - `paths`: the segment filename scheme and directory discovery
//! - `writer`: append cursor over one segment file
//! - `reader`: pull cursor over one segment file, convertible into a writer
//!
//! The multi-segment types in [`crate::wal`] compose these into a log that
//! spans many files.

pub mod paths;
pub mod reader;
pub mod writer;

pub use paths::{list_segments, segment_file_name, segment_for_sequence, segment_path};
pub use reader::{Entry, SegmentReader};
pub use writer::{SegmentConfig, SegmentWriter};
