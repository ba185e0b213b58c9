//! The `immediate` sync policy: flush after every entry.

use std::sync::Arc;

use crate::error::Result;
use crate::sync::{SyncStrategy, WriterShared};

/// Flushes the segment synchronously after every appended entry. No
/// background task. Strongest durability, highest per-append latency.
pub(crate) struct SyncImmediate {
    shared: Arc<WriterShared>,
}

impl SyncImmediate {
    pub(crate) fn new(shared: Arc<WriterShared>) -> Self {
        SyncImmediate { shared }
    }
}

impl SyncStrategy for SyncImmediate {
    fn startup(&self) -> Result<()> {
        Ok(())
    }

    fn entry_appended(&self, _sequence_number: u64) -> Result<()> {
        let mut state = self.shared.state.lock();
        state.flush()
    }

    fn shutdown(&self) -> Result<()> {
        // The final flush covers an appender whose post-append hook has not
        // run yet when a rollover takes the segment away.
        let mut state = self.shared.state.lock();
        state.flush()
    }

    fn name(&self) -> &'static str {
        "immediate"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::test_support::{append, shared_with_segment};
    use crate::sync::SyncStrategy;
    use tempfile::tempdir;

    #[test]
    fn test_every_entry_is_flushed() {
        let dir = tempdir().unwrap();
        let shared = shared_with_segment(dir.path());
        let strategy = SyncImmediate::new(Arc::clone(&shared));
        strategy.startup().unwrap();

        let sequence = append(&shared, b"durable");
        strategy.entry_appended(sequence).unwrap();

        let state = shared.state.lock();
        assert!(state.sync.synced > sequence);
        assert_eq!(state.sync.unsynced_entries, 0);
    }
}
