//! Write-ahead log benchmarks.
//!
//! - `wal_append/*`: append throughput per payload size and sync policy
//! - `wal_replay/*`: full-log replay throughput
//! - `codec/*`: length and checksum codec micro-benchmarks
//!
//! Append benchmarks label their sync policy explicitly so that baseline
//! comparisons are not invalidated by durability changes. `sync_none`
//! measures the pure encode-and-write path; `sync_grouped` includes the
//! amortized fsync cost.
//!
//! ```bash
//! cargo bench --bench wal_bench
//! cargo bench --bench wal_bench -- "wal_append"
//! ```

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tempfile::TempDir;

use seglog::encoding::{
    entry_checksum_reader, entry_checksum_writer, entry_length_reader, entry_length_writer,
    EntryChecksumType, EntryLengthEncoding, MAX_CHECKSUM_SCRATCH, MAX_LENGTH_SCRATCH,
};
use seglog::{Reader, SyncPolicy, Writer, WriterOptions};

const PAYLOAD_SIZES: [usize; 3] = [64, 1024, 16 * 1024];

fn open_writer(dir: &TempDir, policy: SyncPolicy) -> Writer {
    seglog::init(dir.path(), WriterOptions::new().with_pre_allocation_size(0)).unwrap();
    let mut reader = Reader::new(dir.path(), 0).unwrap();
    while reader.next() {}
    reader
        .into_writer(
            WriterOptions::new()
                .with_pre_allocation_size(0)
                .with_max_segment_size(u64::MAX)
                .with_sync_policy(policy),
        )
        .unwrap()
}

fn bench_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("wal_append");

    for size in PAYLOAD_SIZES {
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(BenchmarkId::new("sync_none", size), &size, |b, &size| {
            let dir = TempDir::new().unwrap();
            let writer = open_writer(&dir, SyncPolicy::None);
            let payload = vec![0x5au8; size];
            b.iter(|| black_box(writer.append_entry(&payload).unwrap()));
            writer.close().unwrap();
        });

        group.bench_with_input(BenchmarkId::new("sync_grouped", size), &size, |b, &size| {
            let dir = TempDir::new().unwrap();
            let writer = open_writer(
                &dir,
                SyncPolicy::Grouped {
                    window: Duration::from_micros(100),
                },
            );
            let payload = vec![0x5au8; size];
            b.iter(|| black_box(writer.append_entry(&payload).unwrap()));
            writer.close().unwrap();
        });
    }

    group.finish();
}

fn bench_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("wal_replay");

    const ENTRIES: u64 = 10_000;
    for size in [64usize, 1024] {
        group.throughput(Throughput::Bytes(ENTRIES * size as u64));

        group.bench_with_input(BenchmarkId::new("entries_10k", size), &size, |b, &size| {
            let dir = TempDir::new().unwrap();
            let writer = open_writer(&dir, SyncPolicy::None);
            let payload = vec![0x5au8; size];
            for _ in 0..ENTRIES {
                writer.append_entry(&payload).unwrap();
            }
            writer.close().unwrap();

            b.iter(|| {
                let mut reader = Reader::new(dir.path(), 0).unwrap();
                let mut count = 0u64;
                while reader.next() {
                    black_box(reader.value().data);
                    count += 1;
                }
                assert_eq!(count, ENTRIES);
            });
        });
    }

    group.finish();
}

fn bench_codecs(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");

    for encoding in [
        EntryLengthEncoding::U16,
        EntryLengthEncoding::U32,
        EntryLengthEncoding::U64,
        EntryLengthEncoding::Uvarint,
    ] {
        group.bench_function(BenchmarkId::new("length_roundtrip", encoding), |b| {
            let write = entry_length_writer(encoding);
            let read = entry_length_reader(encoding);
            let mut scratch = [0u8; MAX_LENGTH_SCRATCH];
            b.iter(|| {
                let written = write(&mut scratch, black_box(4096)).unwrap();
                let encoded = scratch;
                let mut cursor = &encoded[..written];
                let mut read_scratch = [0u8; MAX_LENGTH_SCRATCH];
                black_box(read(&mut cursor, &mut read_scratch).unwrap())
            });
        });
    }

    let data = vec![0xa5u8; 4096];
    for checksum_type in [EntryChecksumType::Crc32, EntryChecksumType::Crc64] {
        group.throughput(Throughput::Bytes(data.len() as u64));
        group.bench_function(BenchmarkId::new("checksum_verify", checksum_type), |b| {
            let write = entry_checksum_writer(checksum_type);
            let read = entry_checksum_reader(checksum_type);
            let mut scratch = [0u8; MAX_CHECKSUM_SCRATCH];
            let written = write(&mut scratch, &data);
            let encoded = scratch;
            b.iter(|| {
                let mut cursor = &encoded[..written];
                let mut read_scratch = [0u8; MAX_CHECKSUM_SCRATCH];
                black_box(read(&mut cursor, &mut read_scratch, black_box(&data)).unwrap())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_append, bench_replay, bench_codecs);
criterion_main!(benches);
