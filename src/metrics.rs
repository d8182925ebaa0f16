//! Process-wide throughput metrics: counters for files processed/failed,
//! nodes emitted, and bytes processed, exposed as a single accumulating
//! snapshot.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// A point-in-time read of the accumulated counters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub files_processed: u64,
    pub files_failed: u64,
    pub nodes_emitted: u64,
    pub bytes_processed: u64,
    pub elapsed_ms: u64,
    pub recorded_at_epoch_secs: u64,
}

impl MetricsSnapshot {
    pub fn throughput_files_per_sec(&self) -> f64 {
        if self.elapsed_ms == 0 {
            return 0.0;
        }
        self.files_processed as f64 / (self.elapsed_ms as f64 / 1000.0)
    }

    pub fn success_rate(&self) -> f64 {
        let total = self.files_processed + self.files_failed;
        if total == 0 {
            return 1.0;
        }
        self.files_processed as f64 / total as f64
    }
}

#[derive(Default)]
struct Counters {
    files_processed: AtomicU64,
    files_failed: AtomicU64,
    nodes_emitted: AtomicU64,
    bytes_processed: AtomicU64,
    elapsed_ms: AtomicU64,
}

/// Process-wide counters, recorded by the batch processor as files
/// complete. Callers wanting test isolation build their own `Metrics`
/// instead of using [`global`].
pub struct Metrics {
    counters: Counters,
}

impl Default for Metrics {
    fn default() -> Self {
        Self {
            counters: Counters::default(),
        }
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn global() -> &'static Metrics {
        static GLOBAL: OnceLock<Metrics> = OnceLock::new();
        GLOBAL.get_or_init(Metrics::default)
    }

    pub fn record_file(&self, succeeded: bool, node_count: u64, byte_count: u64, elapsed_ms: u64) {
        if succeeded {
            self.counters.files_processed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.counters.files_failed.fetch_add(1, Ordering::Relaxed);
        }
        self.counters.nodes_emitted.fetch_add(node_count, Ordering::Relaxed);
        self.counters.bytes_processed.fetch_add(byte_count, Ordering::Relaxed);
        self.counters.elapsed_ms.fetch_add(elapsed_ms, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            files_processed: self.counters.files_processed.load(Ordering::Relaxed),
            files_failed: self.counters.files_failed.load(Ordering::Relaxed),
            nodes_emitted: self.counters.nodes_emitted.load(Ordering::Relaxed),
            bytes_processed: self.counters.bytes_processed.load(Ordering::Relaxed),
            elapsed_ms: self.counters.elapsed_ms.load(Ordering::Relaxed),
            recorded_at_epoch_secs: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_snapshots_counters() {
        let metrics = Metrics::new();
        metrics.record_file(true, 10, 1024, 5);
        metrics.record_file(false, 0, 512, 2);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.files_processed, 1);
        assert_eq!(snapshot.files_failed, 1);
        assert_eq!(snapshot.nodes_emitted, 10);
        assert_eq!(snapshot.bytes_processed, 1536);
        assert_eq!(snapshot.success_rate(), 0.5);
    }
}
