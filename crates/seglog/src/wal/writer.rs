//! Multi-segment append handle with automatic rollover.
//!
//! The writer owns the active segment and the installed sync policy. When
//! an append finds the current segment at or past the configured maximum
//! size, it rolls over: the policy is shut down (flushing one last time),
//! the outgoing segment is truncated at its observed end offset and closed,
//! the next segment is created with the continuing sequence number, and the
//! policy is started against it.
//!
//! `append_entry` is safe to call from many threads concurrently; sequence
//! numbers are assigned in lock acquisition order.

use std::fmt;
use std::mem;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info, warn};

use crate::encoding::{EntryChecksumType, EntryLengthEncoding, Header, HEADER_SIZE};
use crate::error::Result;
use crate::metrics::wal_metrics;
use crate::segment::{SegmentConfig, SegmentWriter};
use crate::sync::{build_strategy, SyncCursor, SyncPolicy, SyncStrategy, WriterShared, WriterState};

/// Default number of bytes new segment files are pre-allocated with.
pub const DEFAULT_PRE_ALLOCATION_SIZE: u64 = 64 * 1024 * 1024;

/// Default segment size threshold that triggers rollover.
pub const DEFAULT_MAX_SEGMENT_SIZE: u64 = 64 * 1024 * 1024;

/// Callback invoked after every rollover with the first sequence numbers of
/// the previous and the next segment.
pub type RolloverCallback = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Configuration for a [`Writer`].
///
/// Built with `with_*` methods; every field has a sensible default.
///
/// ```no_run
/// use std::time::Duration;
/// use seglog::{SyncPolicy, WriterOptions};
///
/// let options = WriterOptions::new()
///     .with_max_segment_size(16 * 1024 * 1024)
///     .with_sync_policy(SyncPolicy::Grouped {
///         window: Duration::from_millis(1),
///     });
/// ```
#[derive(Clone)]
pub struct WriterOptions {
    pub(crate) pre_allocation_size: u64,
    pub(crate) max_segment_size: u64,
    pub(crate) entry_length_encoding: Option<EntryLengthEncoding>,
    pub(crate) entry_checksum_type: Option<EntryChecksumType>,
    pub(crate) first_sequence_number: u64,
    pub(crate) sync_policy: SyncPolicy,
    pub(crate) rollover_callback: Option<RolloverCallback>,
}

impl WriterOptions {
    /// Options with all defaults: 64 MiB pre-allocation and maximum segment
    /// size, codecs inherited from the segment being converted, grouped
    /// sync with a 10 ms window, no rollover callback.
    pub fn new() -> Self {
        WriterOptions {
            pre_allocation_size: DEFAULT_PRE_ALLOCATION_SIZE,
            max_segment_size: DEFAULT_MAX_SEGMENT_SIZE,
            entry_length_encoding: None,
            entry_checksum_type: None,
            first_sequence_number: 0,
            sync_policy: SyncPolicy::default(),
            rollover_callback: None,
        }
    }

    /// Sets the number of bytes new segment files are pre-extended by.
    /// Zero disables pre-allocation.
    pub fn with_pre_allocation_size(mut self, pre_allocation_size: u64) -> Self {
        self.pre_allocation_size = pre_allocation_size;
        self
    }

    /// Sets the segment size threshold that triggers rollover. Clamped to
    /// at least one byte more than the header, so that every segment holds
    /// at least one entry and no two segments can share a file name.
    pub fn with_max_segment_size(mut self, max_segment_size: u64) -> Self {
        self.max_segment_size = max_segment_size.max(HEADER_SIZE as u64 + 1);
        self
    }

    /// Sets the entry length encoding for newly created segments. Defaults
    /// to the encoding of the segment the reader was converted from.
    pub fn with_entry_length_encoding(mut self, encoding: EntryLengthEncoding) -> Self {
        self.entry_length_encoding = Some(encoding);
        self
    }

    /// Sets the entry checksum type for newly created segments. Defaults to
    /// the checksum type of the segment the reader was converted from.
    pub fn with_entry_checksum_type(mut self, checksum_type: EntryChecksumType) -> Self {
        self.entry_checksum_type = Some(checksum_type);
        self
    }

    /// Sets the sequence number the first entry of a freshly initialized
    /// log receives. Only consulted by [`init`](crate::wal::init::init).
    pub fn with_first_sequence_number(mut self, first_sequence_number: u64) -> Self {
        self.first_sequence_number = first_sequence_number;
        self
    }

    /// Sets the durability policy.
    pub fn with_sync_policy(mut self, sync_policy: SyncPolicy) -> Self {
        self.sync_policy = sync_policy;
        self
    }

    /// Installs a callback invoked after every rollover with
    /// `(previous_first_sequence, next_first_sequence)`.
    pub fn with_rollover_callback(
        mut self,
        callback: impl Fn(u64, u64) + Send + Sync + 'static,
    ) -> Self {
        self.rollover_callback = Some(Arc::new(callback));
        self
    }
}

impl Default for WriterOptions {
    fn default() -> Self {
        WriterOptions::new()
    }
}

impl fmt::Debug for WriterOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriterOptions")
            .field("pre_allocation_size", &self.pre_allocation_size)
            .field("max_segment_size", &self.max_segment_size)
            .field("entry_length_encoding", &self.entry_length_encoding)
            .field("entry_checksum_type", &self.entry_checksum_type)
            .field("first_sequence_number", &self.first_sequence_number)
            .field("sync_policy", &self.sync_policy)
            .field(
                "rollover_callback",
                &self.rollover_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

/// Append handle over the write-ahead log.
///
/// Obtained through [`crate::wal::Reader::into_writer`], which guarantees
/// that all existing entries were read first. Safe for concurrent
/// `append_entry` calls.
pub struct Writer {
    /// The writer lock plus the condition variable the grouped sync policy
    /// broadcasts on. Background flush tasks share this very lock.
    shared: Arc<WriterShared>,

    /// Serializes rollovers so the writer lock can be dropped across the
    /// background-task join without two threads rolling at once.
    rollover_lock: Mutex<()>,

    strategy: Box<dyn SyncStrategy>,

    directory: PathBuf,
    pre_allocation_size: u64,
    max_segment_size: u64,
    entry_length_encoding: EntryLengthEncoding,
    entry_checksum_type: EntryChecksumType,
    rollover_callback: Option<RolloverCallback>,

    closed: AtomicBool,
}

impl fmt::Debug for Writer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Writer")
            .field("directory", &self.directory)
            .field("pre_allocation_size", &self.pre_allocation_size)
            .field("max_segment_size", &self.max_segment_size)
            .field("entry_length_encoding", &self.entry_length_encoding)
            .field("entry_checksum_type", &self.entry_checksum_type)
            .field("closed", &self.closed)
            .finish()
    }
}

impl Writer {
    /// Wraps a segment writer into a full write-ahead log writer and starts
    /// the sync policy.
    pub(crate) fn from_segment_writer(
        directory: PathBuf,
        segment: SegmentWriter,
        options: WriterOptions,
    ) -> Result<Self> {
        let entry_length_encoding = options
            .entry_length_encoding
            .unwrap_or(segment.header().entry_length_encoding);
        let entry_checksum_type = options
            .entry_checksum_type
            .unwrap_or(segment.header().entry_checksum_type);

        let next_sequence_number = segment.next_sequence_number();
        let shared = Arc::new(WriterShared {
            state: Mutex::new(WriterState {
                segment,
                sync: SyncCursor::new(next_sequence_number),
            }),
            flushed: Condvar::new(),
        });

        let strategy = build_strategy(options.sync_policy, Arc::clone(&shared));
        strategy.startup()?;

        info!(
            directory = %directory.display(),
            policy = strategy.name(),
            next_sequence_number,
            "Opened write-ahead log for writing"
        );

        Ok(Writer {
            shared,
            rollover_lock: Mutex::new(()),
            strategy,
            directory,
            pre_allocation_size: options.pre_allocation_size,
            max_segment_size: options.max_segment_size.max(HEADER_SIZE as u64 + 1),
            entry_length_encoding,
            entry_checksum_type,
            rollover_callback: options.rollover_callback,
            closed: AtomicBool::new(false),
        })
    }

    /// The header of the active segment.
    pub fn header(&self) -> Header {
        self.shared.state.lock().segment.header()
    }

    /// The path of the active segment file.
    pub fn file_path(&self) -> PathBuf {
        self.shared.state.lock().segment.path().to_path_buf()
    }

    /// Current offset in bytes from the start of the active segment file.
    pub fn offset(&self) -> u64 {
        self.shared.state.lock().segment.offset()
    }

    /// The sequence number the next entry will receive.
    pub fn next_sequence_number(&self) -> u64 {
        self.shared.state.lock().segment.next_sequence_number()
    }

    /// Appends the payload as a new entry and returns its sequence number.
    ///
    /// Rolls over into a new segment first when the active segment has
    /// reached the maximum segment size. The sync policy's post-append hook
    /// runs after the writer lock has been released, so a grouped policy
    /// can block this caller without starving the others.
    pub fn append_entry(&self, payload: &[u8]) -> Result<u64> {
        let sequence_number = loop {
            let mut state = self.shared.state.lock();
            if state.segment.offset() >= self.max_segment_size {
                drop(state);
                self.rollover()?;
                continue;
            }
            let sequence_number = state.segment.append_entry(payload)?;
            // Recorded under the writer lock so that a rollover's final
            // flush covers this entry even when the post-append hook has
            // not run yet.
            state.sync.pending = sequence_number + 1;
            state.sync.unsynced_entries = state.sync.unsynced_entries.saturating_add(1);
            break sequence_number;
        };

        self.strategy.entry_appended(sequence_number)?;
        Ok(sequence_number)
    }

    /// Closes the current segment and creates the next one, continuing the
    /// sequence numbering without a gap.
    fn rollover(&self) -> Result<()> {
        let _serialize = self.rollover_lock.lock();

        // Another appender may have completed the rollover while this one
        // waited for the rollover lock.
        {
            let state = self.shared.state.lock();
            if state.segment.offset() < self.max_segment_size {
                return Ok(());
            }
        }

        wal_metrics().rollover_total.inc();
        let started = Instant::now();

        // The shutdown joins the policy's background task (without the
        // writer lock held) and flushes the outgoing segment one last time.
        self.strategy.shutdown()?;

        let (previous_first, next_first) = {
            let mut state = self.shared.state.lock();
            let previous_first = state.segment.header().first_sequence_number;
            state.segment.truncate()?;
            let next_first = state.segment.next_sequence_number();

            let config = SegmentConfig {
                pre_allocation_size: self.pre_allocation_size,
                entry_length_encoding: self.entry_length_encoding,
                entry_checksum_type: self.entry_checksum_type,
            };
            let next_segment = SegmentWriter::create(&self.directory, next_first, &config)?;
            let outgoing = mem::replace(&mut state.segment, next_segment);
            outgoing.close()?;
            (previous_first, next_first)
        };

        self.strategy.startup()?;

        if let Some(callback) = &self.rollover_callback {
            callback(previous_first, next_first);
        }

        let elapsed = started.elapsed();
        debug!(
            previous_first,
            next_first,
            seconds = elapsed.as_secs_f64(),
            "Rolled over into next segment"
        );
        if elapsed > Duration::from_secs(1) {
            warn!(
                seconds = elapsed.as_secs_f64(),
                "Segment rollover took longer than one second"
            );
        }
        wal_metrics()
            .rollover_duration_seconds
            .observe(elapsed.as_secs_f64());
        Ok(())
    }

    /// Shuts down the sync policy and closes the active segment. The final
    /// flush of the shutdown covers all appended entries; the segment file
    /// is truncated at its observed end offset.
    pub fn close(self) -> Result<()> {
        self.close_inner()
    }

    fn close_inner(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let shutdown_result = self.strategy.shutdown();
        let truncate_result = {
            let mut state = self.shared.state.lock();
            state.segment.truncate()
        };

        info!(directory = %self.directory.display(), "Closed write-ahead log writer");
        shutdown_result.and(truncate_result)
    }

    /// The directory this writer appends into.
    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

impl Drop for Writer {
    fn drop(&mut self) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        if let Err(err) = self.close_inner() {
            error!(error = %err, "Implicit close of write-ahead log writer failed");
        }
    }
}
