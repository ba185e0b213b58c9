//! Sync policy engine.
//!
//! Durability is governed by a pluggable policy chosen when the writer is
//! created:
//!
//! - `none`: never flushes; the kernel decides when data reaches disk
//! - `immediate`: fsync after every single entry
//! - `periodic`: fsync after N entries or after a time interval
//! - `grouped`: one fsync amortized over all appenders inside a time window
//!
//! Policies that run a background task coordinate with foreground appenders
//! through the writer's own lock: [`WriterShared`] bundles the mutex over
//! the writer state with the condition variable the grouped policy
//! broadcasts on. Holding a single lock keeps the append counters, the
//! active segment and the flush bookkeeping consistent without a second
//! mutex.
//!
//! Once a background flush fails, the policy stays poisoned: parked
//! appenders and all later appends surface the failure instead of silently
//! retrying against a file in an unknown state.

mod grouped;
mod immediate;
mod none;
mod periodic;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::error::Result;
use crate::segment::SegmentWriter;

pub(crate) use grouped::SyncGrouped;
pub(crate) use immediate::SyncImmediate;
pub(crate) use none::SyncNone;
pub(crate) use periodic::SyncPeriodic;

/// Background flush intervals and windows are clamped to this minimum.
pub const MIN_SYNC_INTERVAL: Duration = Duration::from_micros(100);

/// The durability policy applied to a write-ahead log writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPolicy {
    /// Never flush. Fastest, but data is lost on a crash until the kernel
    /// writes it back on its own schedule.
    None,

    /// Flush after every entry. Strongest durability, highest latency.
    Immediate,

    /// Flush after `entries` appended entries or after `interval`,
    /// whichever comes first. Up to `entries` entries or `interval` worth
    /// of data may be lost on a crash.
    Periodic {
        /// Number of unsynced entries that triggers a synchronous flush.
        entries: usize,
        /// Interval of the background flush ticker.
        interval: Duration,
    },

    /// Collect all entries appended within `window` and flush them with a
    /// single fsync. Every append blocks until the flush covering it has
    /// completed, so the durability guarantee matches `Immediate` while the
    /// fsync cost is shared by all appenders inside the window.
    Grouped {
        /// Width of the grouping window.
        window: Duration,
    },
}

impl Default for SyncPolicy {
    fn default() -> Self {
        SyncPolicy::Grouped {
            window: Duration::from_millis(10),
        }
    }
}

impl fmt::Display for SyncPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncPolicy::None => "none",
            SyncPolicy::Immediate => "immediate",
            SyncPolicy::Periodic { .. } => "periodic",
            SyncPolicy::Grouped { .. } => "grouped",
        };
        f.write_str(name)
    }
}

/// The state shared between the writer, its appenders and the sync policy's
/// background task. The mutex here IS the writer's exclusive lock.
pub(crate) struct WriterShared {
    pub(crate) state: Mutex<WriterState>,
    pub(crate) flushed: Condvar,
}

/// Everything guarded by the writer lock: the active segment and the flush
/// bookkeeping.
pub(crate) struct WriterState {
    pub(crate) segment: SegmentWriter,
    pub(crate) sync: SyncCursor,
}

/// Flush bookkeeping.
///
/// `pending` and `synced` are exclusive upper bounds: every sequence number
/// below them awaits a flush, respectively is already on stable storage.
/// Exclusive bounds make sequence number 0 behave like any other. The
/// writer updates `pending` and `unsynced_entries` under its lock as part
/// of every append, so a policy shutdown always knows about entries whose
/// post-append hook has not run yet.
pub(crate) struct SyncCursor {
    /// Entries appended since the last flush (periodic policy).
    pub(crate) unsynced_entries: usize,

    /// Sequence numbers below this have been appended (grouped policy).
    pub(crate) pending: u64,

    /// Sequence numbers below this are on stable storage (grouped policy).
    pub(crate) synced: u64,

    /// Whether a grouped flush cycle is currently armed.
    pub(crate) timer_armed: bool,

    /// Set when a background flush failed; poisons all later appends.
    pub(crate) failure: Option<String>,
}

impl SyncCursor {
    pub(crate) fn new(next_sequence_number: u64) -> Self {
        SyncCursor {
            unsynced_entries: 0,
            pending: next_sequence_number,
            synced: next_sequence_number,
            timer_armed: false,
            failure: None,
        }
    }
}

impl WriterState {
    /// Flushes the active segment and marks everything pending as synced.
    pub(crate) fn flush(&mut self) -> Result<()> {
        self.segment.sync()?;
        self.sync.synced = self.sync.synced.max(self.sync.pending);
        self.sync.unsynced_entries = 0;
        Ok(())
    }
}

/// The contract every sync policy implements.
///
/// `startup` runs before the first append against a fresh segment,
/// `entry_appended` runs after every append with the writer lock released,
/// and `shutdown` stops any background task (joining it without the writer
/// lock held) and performs one final flush. The rollover path tears a policy
/// down and starts it up again against the next segment.
pub(crate) trait SyncStrategy: Send + Sync {
    fn startup(&self) -> Result<()>;
    fn entry_appended(&self, sequence_number: u64) -> Result<()>;
    fn shutdown(&self) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Builds the strategy implementing the given policy, bound to the writer's
/// shared state.
pub(crate) fn build_strategy(
    policy: SyncPolicy,
    shared: Arc<WriterShared>,
) -> Box<dyn SyncStrategy> {
    match policy {
        SyncPolicy::None => Box::new(SyncNone),
        SyncPolicy::Immediate => Box::new(SyncImmediate::new(shared)),
        SyncPolicy::Periodic { entries, interval } => {
            Box::new(SyncPeriodic::new(entries, interval, shared))
        }
        SyncPolicy::Grouped { window } => Box::new(SyncGrouped::new(window, shared)),
    }
}
