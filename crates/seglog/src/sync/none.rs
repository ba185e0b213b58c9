//! The `none` sync policy: never flush.

use crate::error::Result;
use crate::sync::SyncStrategy;

/// Never flushes the segment. Data reaches stable storage whenever the
/// kernel decides to write it back, so a crash can lose anything not yet
/// written by the OS.
pub(crate) struct SyncNone;

impl SyncStrategy for SyncNone {
    fn startup(&self) -> Result<()> {
        Ok(())
    }

    fn entry_appended(&self, _sequence_number: u64) -> Result<()> {
        Ok(())
    }

    fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "none"
    }
}
