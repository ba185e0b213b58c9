//! Multi-segment write-ahead log.
//!
//! - `reader`: read cursor chaining across segment files
//! - `writer`: append handle with automatic rollover into new segments
//! - `init`: directory initialization
//!
//! The intended lifecycle: [`init`](crate::wal::init::init) the directory
//! once, construct a [`Reader`] at a known sequence number, replay until
//! exhausted, then convert it into a [`Writer`] with
//! [`Reader::into_writer`]. Conversion is the only way to obtain a writer,
//! which guarantees that appending always resumes exactly after the last
//! valid entry.

pub mod init;
pub mod reader;
pub mod writer;

pub use init::{init, init_if_required, is_initialized};
pub use reader::Reader;
pub use writer::{
    RolloverCallback, Writer, WriterOptions, DEFAULT_MAX_SEGMENT_SIZE,
    DEFAULT_PRE_ALLOCATION_SIZE,
};
