//! Process-wide counters and histograms for the write-ahead log.
//!
//! The metric names are stable and intended to be re-exported verbatim by
//! the embedding system's metrics endpoint:
//!
//! - `wal_read_entry_total` / `wal_read_entry_bytes_total`
//! - `wal_append_entry_total` / `wal_append_entry_bytes_total`
//! - `wal_sync_total` / `wal_sync_duration_seconds`
//! - `wal_rollover_total` / `wal_rollover_duration_seconds`
//!
//! All values use relaxed atomics; metrics are eventually consistent and
//! never on the failure path of an append or read.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

/// Number of histogram buckets.
pub const HISTOGRAM_BUCKETS: usize = 16;

/// Smallest histogram bucket upper bound in seconds (100 microseconds).
pub const HISTOGRAM_START: f64 = 0.0001;

/// Factor between adjacent histogram bucket upper bounds.
pub const HISTOGRAM_FACTOR: f64 = 2.0;

/// Monotonic counter.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    /// Increment the counter by one.
    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    /// Add an arbitrary amount to the counter.
    pub fn add(&self, amount: u64) {
        self.0.fetch_add(amount, Ordering::Relaxed);
    }

    /// Read the current value.
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Fixed-bucket histogram with exponential bucket bounds.
///
/// Buckets have upper bounds `HISTOGRAM_START * HISTOGRAM_FACTOR^i` for
/// `i` in `0..HISTOGRAM_BUCKETS`. Observations above the last bound land in
/// the implicit overflow bucket, which is only visible through `count`.
/// The sum is tracked in whole microseconds to stay within an atomic word.
#[derive(Debug, Default)]
pub struct Histogram {
    buckets: [AtomicU64; HISTOGRAM_BUCKETS],
    sum_micros: AtomicU64,
    count: AtomicU64,
}

impl Histogram {
    /// Record an observation in seconds.
    pub fn observe(&self, seconds: f64) {
        let mut bound = HISTOGRAM_START;
        for bucket in &self.buckets {
            if seconds <= bound {
                bucket.fetch_add(1, Ordering::Relaxed);
                break;
            }
            bound *= HISTOGRAM_FACTOR;
        }
        self.sum_micros
            .fetch_add((seconds * 1_000_000.0) as u64, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Total number of observations.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Sum of all observations in seconds.
    pub fn sum_seconds(&self) -> f64 {
        self.sum_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0
    }

    /// Cumulative bucket counts as `(upper_bound_seconds, count_le)` pairs.
    pub fn cumulative_buckets(&self) -> [(f64, u64); HISTOGRAM_BUCKETS] {
        let mut result = [(0.0, 0); HISTOGRAM_BUCKETS];
        let mut bound = HISTOGRAM_START;
        let mut running = 0;
        for (i, bucket) in self.buckets.iter().enumerate() {
            running += bucket.load(Ordering::Relaxed);
            result[i] = (bound, running);
            bound *= HISTOGRAM_FACTOR;
        }
        result
    }
}

/// All write-ahead log metrics.
#[derive(Debug, Default)]
pub struct WalMetrics {
    /// Total number of entries read.
    pub read_entry_total: Counter,
    /// Total number of payload bytes read (excluding framing).
    pub read_entry_bytes_total: Counter,
    /// Total number of entries appended.
    pub append_entry_total: Counter,
    /// Total number of payload bytes appended (excluding framing).
    pub append_entry_bytes_total: Counter,
    /// Total number of fsyncs executed.
    pub sync_total: Counter,
    /// Duration of fsyncs in seconds.
    pub sync_duration_seconds: Histogram,
    /// Total number of segment rollovers executed.
    pub rollover_total: Counter,
    /// Duration of segment rollovers in seconds.
    pub rollover_duration_seconds: Histogram,
}

/// A point-in-time export of all counters, keyed by stable metric name.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    /// `(metric_name, value)` pairs for every counter.
    pub counters: Vec<(&'static str, u64)>,
    /// `(metric_name, count, sum_seconds)` triples for every histogram.
    pub histograms: Vec<(&'static str, u64, f64)>,
}

impl WalMetrics {
    /// Export all metrics under their stable names.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            counters: vec![
                ("wal_read_entry_total", self.read_entry_total.get()),
                ("wal_read_entry_bytes_total", self.read_entry_bytes_total.get()),
                ("wal_append_entry_total", self.append_entry_total.get()),
                (
                    "wal_append_entry_bytes_total",
                    self.append_entry_bytes_total.get(),
                ),
                ("wal_sync_total", self.sync_total.get()),
                ("wal_rollover_total", self.rollover_total.get()),
            ],
            histograms: vec![
                (
                    "wal_sync_duration_seconds",
                    self.sync_duration_seconds.count(),
                    self.sync_duration_seconds.sum_seconds(),
                ),
                (
                    "wal_rollover_duration_seconds",
                    self.rollover_duration_seconds.count(),
                    self.rollover_duration_seconds.sum_seconds(),
                ),
            ],
        }
    }
}

/// The process-wide metrics instance.
pub fn wal_metrics() -> &'static WalMetrics {
    static METRICS: OnceLock<WalMetrics> = OnceLock::new();
    METRICS.get_or_init(WalMetrics::default)
}
