//! The `periodic` sync policy: flush after N entries or after a time
//! interval, whichever comes first.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, error};

use crate::error::Result;
use crate::sync::{SyncStrategy, WriterShared, MIN_SYNC_INTERVAL};

/// Flushes after a number of unsynced entries (synchronously, from the
/// appender that crosses the threshold) or after a time interval (from a
/// background ticker). Entries below the threshold may be lost within the
/// interval on a crash.
pub(crate) struct SyncPeriodic {
    entries: usize,
    interval: Duration,
    shared: Arc<WriterShared>,
    task: Mutex<Option<PeriodicTask>>,
}

struct PeriodicTask {
    stop: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl SyncPeriodic {
    pub(crate) fn new(entries: usize, interval: Duration, shared: Arc<WriterShared>) -> Self {
        SyncPeriodic {
            entries: entries.max(1),
            interval: interval.max(MIN_SYNC_INTERVAL),
            shared,
            task: Mutex::new(None),
        }
    }
}

impl SyncStrategy for SyncPeriodic {
    fn startup(&self) -> Result<()> {
        let (stop_tx, stop_rx) = mpsc::channel();
        let shared = Arc::clone(&self.shared);
        let interval = self.interval;
        let handle = thread::Builder::new()
            .name("seglog-periodic-sync".to_string())
            .spawn(move || {
                debug!("Periodic sync task started");
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => tick(&shared),
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                debug!("Periodic sync task exiting");
            })?;

        {
            let mut state = self.shared.state.lock();
            state.sync.failure = None;
        }
        *self.task.lock() = Some(PeriodicTask {
            stop: stop_tx,
            handle,
        });
        Ok(())
    }

    fn entry_appended(&self, _sequence_number: u64) -> Result<()> {
        let mut state = self.shared.state.lock();
        if state.sync.unsynced_entries < self.entries {
            return Ok(());
        }
        state.flush()
    }

    fn shutdown(&self) -> Result<()> {
        if let Some(task) = self.task.lock().take() {
            let _ = task.stop.send(());
            // The join must happen without the writer lock held: the ticker
            // may be blocked acquiring it for a flush.
            let _ = task.handle.join();
        }

        let mut state = self.shared.state.lock();
        if state.sync.unsynced_entries == 0 {
            return Ok(());
        }
        state.flush()
    }

    fn name(&self) -> &'static str {
        "periodic"
    }
}

fn tick(shared: &WriterShared) {
    let mut state = shared.state.lock();
    if state.sync.unsynced_entries == 0 || state.sync.failure.is_some() {
        return;
    }
    if let Err(err) = state.flush() {
        error!(error = %err, "Periodic sync failed");
        state.sync.failure = Some(err.to_string());
    }
}
