//! Concurrency behavior of the grouped sync policy.
//!
//! The assertions on the process-wide sync counter require that no other
//! test flushes concurrently, so every test here serializes on a shared
//! lock and this file stays the only fsync-heavy binary in the suite.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use seglog::metrics::wal_metrics;
use seglog::{Reader, SyncPolicy, WriterOptions};
use tempfile::tempdir;

static SYNC_COUNTER_LOCK: Mutex<()> = Mutex::new(());

const APPENDERS: usize = 32;

#[test]
fn test_concurrent_grouped_appends() {
    let _isolated = SYNC_COUNTER_LOCK.lock().unwrap();

    let dir = tempdir().unwrap();
    seglog::init(dir.path(), WriterOptions::new().with_pre_allocation_size(0)).unwrap();

    let mut reader = Reader::new(dir.path(), 0).unwrap();
    assert!(!reader.next());
    let writer = reader
        .into_writer(WriterOptions::new().with_sync_policy(SyncPolicy::Grouped {
            window: Duration::from_millis(2),
        }))
        .unwrap();

    let results: Mutex<Vec<(u64, Vec<u8>)>> = Mutex::new(Vec::new());
    let syncs_before = wal_metrics().sync_total.get();

    thread::scope(|scope| {
        for index in 0..APPENDERS {
            let writer = &writer;
            let results = &results;
            scope.spawn(move || {
                let payload = format!("appender-{index:02}").into_bytes();
                let sequence = writer.append_entry(&payload).unwrap();
                results.lock().unwrap().push((sequence, payload));
            });
        }
    });

    let syncs_after = wal_metrics().sync_total.get();

    // Every appender received a distinct sequence number and together they
    // cover 0..APPENDERS densely.
    let mut results = results.into_inner().unwrap();
    results.sort_by_key(|(sequence, _)| *sequence);
    let sequences: Vec<u64> = results.iter().map(|(sequence, _)| *sequence).collect();
    assert_eq!(sequences, (0..APPENDERS as u64).collect::<Vec<u64>>());

    // The burst fits into a handful of grouping windows, so the number of
    // fsyncs stays well below the number of appenders.
    assert!(
        syncs_after - syncs_before < APPENDERS as u64,
        "expected grouped flushing, got {} fsyncs for {} appends",
        syncs_after - syncs_before,
        APPENDERS
    );

    writer.close().unwrap();

    // Crash-restart simulation: everything is recoverable after reopening,
    // and each sequence number carries the payload of the appender that
    // observed it.
    let expected: BTreeMap<u64, Vec<u8>> = results.into_iter().collect();
    let mut reader = Reader::new(dir.path(), 0).unwrap();
    let mut recovered = BTreeMap::new();
    while reader.next() {
        recovered.insert(reader.value().sequence_number, reader.value().data.to_vec());
    }
    assert_eq!(recovered, expected);
}

#[test]
fn test_grouped_append_returns_after_flush() {
    let _isolated = SYNC_COUNTER_LOCK.lock().unwrap();

    let dir = tempdir().unwrap();
    seglog::init(dir.path(), WriterOptions::new().with_pre_allocation_size(0)).unwrap();

    let mut reader = Reader::new(dir.path(), 0).unwrap();
    assert!(!reader.next());
    let writer = reader
        .into_writer(WriterOptions::new().with_sync_policy(SyncPolicy::Grouped {
            window: Duration::from_millis(1),
        }))
        .unwrap();

    let syncs_before = wal_metrics().sync_total.get();
    writer.append_entry(b"lonely").unwrap();
    let syncs_after = wal_metrics().sync_total.get();

    // When the append returns, its flush cycle has completed.
    assert!(syncs_after > syncs_before);
    writer.close().unwrap();
}
