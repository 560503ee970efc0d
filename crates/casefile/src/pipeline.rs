//! Directory walk feeding a bounded pool of upload workers.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rayon::ThreadPoolBuilder;
use rayon::iter::{ParallelBridge, ParallelIterator};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::record::normalize;
use crate::router::UploadRouter;
use crate::stats::StatsSnapshot;

/// Worker count used when none is configured.
pub const DEFAULT_WORKERS: usize = 10;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Input directory not found: {0:?}")]
    RootNotFound(PathBuf),

    #[error("Failed to start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Stops a running pipeline from dispatching further entries.
///
/// Uploads already in progress run to completion.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Result of one pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineSummary {
    /// Entries handed to the upload router
    pub dispatched: u64,
    pub uploaded: u64,
    pub failed: u64,
    /// Entries that could not be walked or stat-ed
    pub skipped: u64,
    /// Entries seen after cancellation
    pub cancelled: u64,
    pub stats: StatsSnapshot,
}

enum EntryOutcome {
    Uploaded,
    Failed,
    Skipped,
    Cancelled,
}

#[derive(Default)]
struct Tally {
    uploaded: u64,
    failed: u64,
    skipped: u64,
    cancelled: u64,
}

impl Tally {
    fn add(mut self, outcome: EntryOutcome) -> Self {
        match outcome {
            EntryOutcome::Uploaded => self.uploaded += 1,
            EntryOutcome::Failed => self.failed += 1,
            EntryOutcome::Skipped => self.skipped += 1,
            EntryOutcome::Cancelled => self.cancelled += 1,
        }
        self
    }

    fn merge(self, other: Self) -> Self {
        Self {
            uploaded: self.uploaded + other.uploaded,
            failed: self.failed + other.failed,
            skipped: self.skipped + other.skipped,
            cancelled: self.cancelled + other.cancelled,
        }
    }
}

pub struct Pipeline {
    workers: usize,
    cancel: CancelFlag,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(DEFAULT_WORKERS)
    }
}

impl Pipeline {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            cancel: CancelFlag::default(),
        }
    }

    /// A handle that can cancel this pipeline from another thread.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Upload every entry beneath `root` (not `root` itself) through `router`.
    ///
    /// Blocks until all dispatched uploads have finished. Per-entry failures
    /// are logged and counted; they never abort the run.
    pub fn run(
        &self,
        root: &Path,
        router: &UploadRouter<'_>,
    ) -> Result<PipelineSummary, PipelineError> {
        if !root.is_dir() {
            return Err(PipelineError::RootNotFound(root.to_path_buf()));
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("ingest-{i}"))
            .build()?;

        info!(?root, workers = self.workers, "Starting ingestion");

        let tally = pool.install(|| {
            WalkDir::new(root)
                .min_depth(1)
                .follow_links(false)
                .into_iter()
                .par_bridge()
                .map(|entry| self.process(entry, root, router))
                .fold(Tally::default, Tally::add)
                .reduce(Tally::default, Tally::merge)
        });

        let summary = PipelineSummary {
            dispatched: tally.uploaded + tally.failed,
            uploaded: tally.uploaded,
            failed: tally.failed,
            skipped: tally.skipped,
            cancelled: tally.cancelled,
            stats: router.stats().snapshot(),
        };

        if summary.failed > 0 {
            warn!(failed = summary.failed, "Some files were skipped due to errors");
        }
        if summary.cancelled > 0 {
            warn!(cancelled = summary.cancelled, "Ingestion was cancelled");
        }
        info!(
            dispatched = summary.dispatched,
            uploaded = summary.uploaded,
            skipped = summary.skipped,
            "Ingestion finished"
        );

        Ok(summary)
    }

    fn process(
        &self,
        entry: walkdir::Result<DirEntry>,
        root: &Path,
        router: &UploadRouter<'_>,
    ) -> EntryOutcome {
        if self.cancel.is_cancelled() {
            return EntryOutcome::Cancelled;
        }

        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(path = ?err.path(), %err, "Skipping unreadable entry");
                return EntryOutcome::Skipped;
            }
        };
        let path = entry.path();

        let record = match normalize(path, root) {
            Ok(record) => record,
            Err(err) => {
                debug!(?path, %err, "Skipping entry without file attributes");
                return EntryOutcome::Skipped;
            }
        };

        match router.upload(&record, path) {
            Ok(_) => EntryOutcome::Uploaded,
            Err(err) => {
                warn!(?path, row_key = err.row_key(), %err, "Skipping file due to error");
                EntryOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_flag_is_shared() {
        let pipeline = Pipeline::new(2);
        let flag = pipeline.cancel_flag();
        assert!(!pipeline.cancel.is_cancelled());
        flag.cancel();
        assert!(pipeline.cancel.is_cancelled());
    }

    #[test]
    fn zero_workers_means_one() {
        assert_eq!(Pipeline::new(0).workers, 1);
        assert_eq!(Pipeline::default().workers, DEFAULT_WORKERS);
    }

    #[test]
    fn tally_merges() {
        let a = Tally::default()
            .add(EntryOutcome::Uploaded)
            .add(EntryOutcome::Failed);
        let b = Tally::default()
            .add(EntryOutcome::Uploaded)
            .add(EntryOutcome::Skipped)
            .add(EntryOutcome::Cancelled);
        let total = a.merge(b);
        assert_eq!(total.uploaded, 2);
        assert_eq!(total.failed, 1);
        assert_eq!(total.skipped, 1);
        assert_eq!(total.cancelled, 1);
    }
}
