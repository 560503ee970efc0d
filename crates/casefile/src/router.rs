//! Per-file upload into the data table, with large content tiered out to
//! the blob store.
//!
//! Each entry becomes one row. The `metadata` family is always written;
//! regular files additionally get their bytes inline in the `content`
//! family, or, above [`INLINE_THRESHOLD`], a pointer to a blob-store copy.
//!
//! Metadata and content are separate writes. A failure (or crash) between
//! the two leaves a regular-file row with no content columns;
//! [`crate::verify`] finds those.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;
use tracing::{debug, trace};

use crate::record::{FileKind, FileRecord};
use crate::registry::Exhibit;
use crate::rowkey;
use crate::schema::{CONTENT_FAMILY, DATA_TABLE, METADATA_FAMILY, content_columns, metadata_cells};
use crate::stats::IngestStats;
use crate::store::{BlobStore, RowStore, StoreError, join_remote};

/// Largest file stored inline: a 10 MiB cell limit minus room for the key.
pub const INLINE_THRESHOLD: u64 = 10_485_660;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Failed to read {path:?} for row {row_key}: {source}")]
    Read {
        path: PathBuf,
        row_key: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write row {row_key}: {source}")]
    Row {
        row_key: String,
        #[source]
        source: StoreError,
    },

    #[error("Failed to copy {path:?} to {remote_path} for row {row_key}: {source}")]
    Blob {
        path: PathBuf,
        remote_path: String,
        row_key: String,
        #[source]
        source: StoreError,
    },
}

impl UploadError {
    /// The row the failed upload was targeting.
    pub fn row_key(&self) -> &str {
        match self {
            UploadError::Read { row_key, .. }
            | UploadError::Row { row_key, .. }
            | UploadError::Blob { row_key, .. } => row_key,
        }
    }
}

/// Where an entry's content ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// Directories, symlinks and other non-regular entries
    MetadataOnly,
    Inline { bytes: u64 },
    External { bytes: u64, remote_path: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub row_key: String,
    pub placement: Placement,
}

/// Uploads entries of one exhibit.
pub struct UploadRouter<'a> {
    rows: &'a dyn RowStore,
    blobs: &'a dyn BlobStore,
    namespace: String,
    base_path: String,
    next_sequence: AtomicU64,
    threshold: u64,
    stats: IngestStats,
}

impl<'a> UploadRouter<'a> {
    /// Router for a freshly registered exhibit; its rows start at sequence 0.
    pub fn new(rows: &'a dyn RowStore, blobs: &'a dyn BlobStore, exhibit: &Exhibit) -> Self {
        Self {
            rows,
            blobs,
            namespace: exhibit.id.clone(),
            base_path: exhibit.base_path.clone(),
            next_sequence: AtomicU64::new(0),
            threshold: INLINE_THRESHOLD,
            stats: IngestStats::default(),
        }
    }

    /// Continue numbering rows from `sequence`.
    pub fn starting_at(self, sequence: u64) -> Self {
        self.next_sequence.store(sequence, Ordering::Relaxed);
        self
    }

    /// Override the inline size limit.
    pub fn with_threshold(mut self, threshold: u64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }

    /// Store one entry. `local_path` is where its content can be read.
    pub fn upload(
        &self,
        record: &FileRecord,
        local_path: &Path,
    ) -> Result<UploadOutcome, UploadError> {
        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
        let row_key = rowkey::allocate(&self.namespace, sequence);

        match self.store(record, local_path, &row_key) {
            Ok(placement) => {
                trace!(%row_key, path = %record.relative_path, ?placement, "Uploaded entry");
                Ok(UploadOutcome { row_key, placement })
            }
            Err(err) => {
                self.stats.record_failure();
                Err(err)
            }
        }
    }

    fn store(
        &self,
        record: &FileRecord,
        local_path: &Path,
        row_key: &str,
    ) -> Result<Placement, UploadError> {
        self.rows
            .put_row(DATA_TABLE, row_key, METADATA_FAMILY, &metadata_cells(record))
            .map_err(|source| UploadError::Row {
                row_key: row_key.to_string(),
                source,
            })?;
        self.stats.record_row();

        if record.kind != FileKind::Regular {
            return Ok(Placement::MetadataOnly);
        }

        let read_err = |source: io::Error| UploadError::Read {
            path: local_path.to_path_buf(),
            row_key: row_key.to_string(),
            source,
        };

        let mut file = File::open(local_path).map_err(read_err)?;
        let mut head = Vec::new();
        if record.size.unwrap_or(0) <= self.threshold {
            // Read one byte past the limit to notice a file that grew since it was stat-ed
            file.by_ref()
                .take(self.threshold + 1)
                .read_to_end(&mut head)
                .map_err(read_err)?;

            if head.len() as u64 <= self.threshold {
                let bytes = head.len() as u64;
                let digest = blake3::hash(&head).to_hex().to_string();
                self.put_content(
                    row_key,
                    &[
                        (content_columns::INLINE, head),
                        (content_columns::BLAKE3, digest.into_bytes()),
                    ],
                )?;
                self.stats.record_inline(bytes);
                return Ok(Placement::Inline { bytes });
            }
            debug!(%row_key, path = ?local_path, "File grew past the inline limit");
        }

        let remote_path = join_remote(&self.base_path, row_key);
        let mut source = HashingReader::new(io::Cursor::new(head).chain(file));

        // Copy first so the pointer never names a blob that was not written
        let bytes = self
            .blobs
            .copy_from_reader(&mut source, &remote_path)
            .map_err(|source| UploadError::Blob {
                path: local_path.to_path_buf(),
                remote_path: remote_path.clone(),
                row_key: row_key.to_string(),
                source,
            })?;
        let digest = source.finalize_hex();
        debug!(%row_key, %remote_path, bytes, "Stored content externally");

        self.put_content(
            row_key,
            &[
                (content_columns::EXTERNAL, remote_path.clone().into_bytes()),
                (content_columns::BLAKE3, digest.into_bytes()),
            ],
        )?;
        self.stats.record_external(bytes);
        Ok(Placement::External { bytes, remote_path })
    }

    fn put_content(&self, row_key: &str, cells: &[(&str, Vec<u8>)]) -> Result<(), UploadError> {
        self.rows
            .put_row(DATA_TABLE, row_key, CONTENT_FAMILY, cells)
            .map_err(|source| UploadError::Row {
                row_key: row_key.to_string(),
                source,
            })
    }
}

/// Feeds every byte read through it into a BLAKE3 hasher, so the digest
/// covers exactly what was stored.
struct HashingReader<R> {
    inner: R,
    hasher: blake3::Hasher,
}

impl<R: Read> HashingReader<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: blake3::Hasher::new(),
        }
    }

    fn finalize_hex(&self) -> String {
        self.hasher.finalize().to_hex().to_string()
    }
}

impl<R: Read> Read for HashingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }
}
