//! Ingestion statistics shared by all pool workers.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Counters updated concurrently by the upload router.
#[derive(Debug, Default)]
pub struct IngestStats {
    rows: AtomicU64,
    inline_files: AtomicU64,
    inline_bytes: AtomicU64,
    external_files: AtomicU64,
    external_bytes: AtomicU64,
    failed_files: AtomicU64,
}

impl IngestStats {
    pub fn record_row(&self) {
        self.rows.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_inline(&self, bytes: u64) {
        self.inline_files.fetch_add(1, Ordering::Relaxed);
        self.inline_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_external(&self, bytes: u64) {
        self.external_files.fetch_add(1, Ordering::Relaxed);
        self.external_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failed_files.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            rows: self.rows.load(Ordering::Relaxed),
            inline_files: self.inline_files.load(Ordering::Relaxed),
            inline_bytes: self.inline_bytes.load(Ordering::Relaxed),
            external_files: self.external_files.load(Ordering::Relaxed),
            external_bytes: self.external_bytes.load(Ordering::Relaxed),
            failed_files: self.failed_files.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`IngestStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Rows whose metadata was written
    pub rows: u64,
    pub inline_files: u64,
    pub inline_bytes: u64,
    pub external_files: u64,
    pub external_bytes: u64,
    pub failed_files: u64,
}

impl StatsSnapshot {
    pub fn total_bytes(&self) -> u64 {
        self.inline_bytes + self.external_bytes
    }

    /// Share of stored bytes kept inline, as a percentage.
    pub fn inline_pct(&self) -> f64 {
        if self.total_bytes() > 0 {
            (self.inline_bytes as f64 / self.total_bytes() as f64) * 100.0
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn concurrent_updates_are_not_lost() {
        let stats = Arc::new(IngestStats::default());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let stats = Arc::clone(&stats);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        stats.record_row();
                        stats.record_inline(2);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snap = stats.snapshot();
        assert_eq!(snap.rows, 8000);
        assert_eq!(snap.inline_files, 8000);
        assert_eq!(snap.inline_bytes, 16000);
    }

    #[test]
    fn inline_share() {
        let snap = StatsSnapshot {
            inline_bytes: 25,
            external_bytes: 75,
            ..Default::default()
        };
        assert_eq!(snap.total_bytes(), 100);
        assert!((snap.inline_pct() - 25.0).abs() < f64::EPSILON);
        assert_eq!(StatsSnapshot::default().inline_pct(), 0.0);
    }
}
