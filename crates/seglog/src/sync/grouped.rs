//! The `grouped` sync policy: one fsync amortized over all appenders inside
//! a time window.
//!
//! Every append parks on the shared condition variable until a flush
//! covering its sequence number has completed, so the durability guarantee
//! equals `immediate` while the fsync cost is shared. The first append
//! after a completed flush cycle arms a one-shot timer; when it fires, the
//! background task takes the writer lock, flushes once, and wakes everyone.

use std::io;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, error};

use crate::error::{Result, WalError};
use crate::sync::{SyncStrategy, WriterShared, MIN_SYNC_INTERVAL};

/// Groups all entries appended within `window` into a single fsync.
pub(crate) struct SyncGrouped {
    window: Duration,
    shared: Arc<WriterShared>,
    task: Mutex<Option<GroupedTask>>,
}

struct GroupedTask {
    arm: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl SyncGrouped {
    pub(crate) fn new(window: Duration, shared: Arc<WriterShared>) -> Self {
        SyncGrouped {
            window: window.max(MIN_SYNC_INTERVAL),
            shared,
            task: Mutex::new(None),
        }
    }
}

impl SyncStrategy for SyncGrouped {
    fn startup(&self) -> Result<()> {
        let (arm_tx, arm_rx) = mpsc::channel::<()>();
        let shared = Arc::clone(&self.shared);
        let window = self.window;
        let handle = thread::Builder::new()
            .name("seglog-grouped-sync".to_string())
            .spawn(move || {
                debug!("Grouped sync task started");
                while arm_rx.recv().is_ok() {
                    thread::sleep(window);
                    flush_cycle(&shared);
                }
                debug!("Grouped sync task exiting");
            })?;

        {
            let mut state = self.shared.state.lock();
            state.sync.failure = None;
            state.sync.timer_armed = true;
        }
        // Arm a cycle right away. A no-op flush is harmless, and appenders
        // that queued up while a rollover swapped segments are guaranteed a
        // timer that will release them.
        let _ = arm_tx.send(());
        *self.task.lock() = Some(GroupedTask {
            arm: arm_tx,
            handle,
        });
        Ok(())
    }

    fn entry_appended(&self, sequence_number: u64) -> Result<()> {
        // Clone the arm sender before taking the writer lock; shutdown holds
        // the task slot while joining a thread that needs the writer lock.
        let arm = self.task.lock().as_ref().map(|task| task.arm.clone());

        let mut state = self.shared.state.lock();
        if !state.sync.timer_armed {
            state.sync.timer_armed = true;
            if let Some(arm) = &arm {
                let _ = arm.send(());
            }
        }
        while state.sync.synced <= sequence_number {
            if let Some(message) = &state.sync.failure {
                return Err(WalError::Io(io::Error::other(message.clone())));
            }
            self.shared.flushed.wait(&mut state);
        }
        Ok(())
    }

    fn shutdown(&self) -> Result<()> {
        if let Some(task) = self.task.lock().take() {
            // Dropping the sender ends the background loop after any cycle
            // still in flight. The join must happen without the writer lock
            // held: the task may be blocked acquiring it for a flush.
            drop(task.arm);
            let _ = task.handle.join();
        }

        let mut state = self.shared.state.lock();
        state.sync.timer_armed = false;
        let result = if state.sync.synced < state.sync.pending {
            state.flush()
        } else {
            Ok(())
        };
        drop(state);
        // Wake appenders whose cycle never fired; the final flush above
        // covers them.
        self.shared.flushed.notify_all();
        result
    }

    fn name(&self) -> &'static str {
        "grouped"
    }
}

fn flush_cycle(shared: &WriterShared) {
    let mut state = shared.state.lock();
    state.sync.timer_armed = false;
    if state.sync.synced >= state.sync.pending || state.sync.failure.is_some() {
        drop(state);
        shared.flushed.notify_all();
        return;
    }
    if let Err(err) = state.flush() {
        error!(error = %err, "Grouped sync failed");
        state.sync.failure = Some(err.to_string());
    }
    drop(state);
    shared.flushed.notify_all();
}
