//! Append-only segmented write-ahead log.
//!
//! `seglog` persists an ordered sequence of opaque binary payloads to disk
//! under a caller-chosen durability policy and replays them later from any
//! known sequence number. It is meant to be embedded in a larger system (a
//! database, a state machine, an event store) that owns the meaning of the
//! entries.
//!
//! # Concepts
//!
//! - **Entry**: a payload plus the dense, strictly monotonic 64-bit
//!   sequence number assigned when it was appended.
//! - **Segment**: one file holding a fixed 16-byte header followed by a
//!   contiguous run of checksummed entries. Segments are named after the
//!   sequence number of their first entry.
//! - **Rollover**: when the active segment reaches the configured maximum
//!   size, the writer closes it and continues in a freshly created segment,
//!   without a gap in the numbering.
//! - **Sync policy**: when data is flushed to stable storage: never, after
//!   every entry, periodically, or grouped across concurrent appenders.
//!
//! # Lifecycle
//!
//! Writing is only possible after reading everything that is already there,
//! which is what makes resuming after a restart safe:
//!
//! ```no_run
//! use seglog::{Reader, WriterOptions};
//!
//! # fn main() -> seglog::Result<()> {
//! let dir = "/var/lib/myapp/wal";
//! seglog::init_if_required(dir)?;
//!
//! let mut reader = Reader::new(dir, 0)?;
//! while reader.next() {
//!     let entry = reader.value();
//!     // apply entry.data to the application state
//! }
//!
//! let writer = reader.into_writer(WriterOptions::new())?;
//! let sequence = writer.append_entry(b"payload")?;
//! assert_eq!(sequence, writer.next_sequence_number() - 1);
//! writer.close()?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod encoding;
pub mod error;
pub mod metrics;
pub mod segment;
pub mod sync;
pub mod wal;

pub use encoding::{EntryChecksumType, EntryLengthEncoding, Header, HEADER_SIZE};
pub use error::{Result, WalError};
pub use segment::{Entry, SegmentReader, SegmentWriter};
pub use sync::SyncPolicy;
pub use wal::{
    init, init_if_required, is_initialized, Reader, RolloverCallback, Writer, WriterOptions,
};
