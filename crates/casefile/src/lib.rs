//! Casefile - tiered forensic evidence ingestion
//!
//! This library ingests a directory tree into a wide-column row store,
//! keeping small files inline and moving large file content to a blob store.
//! Every import is registered as an exhibit of a forensic case.

pub mod config;
pub mod import;
pub mod pipeline;
pub mod record;
pub mod registry;
pub mod router;
pub mod rowkey;
pub mod schema;
pub mod stats;
pub mod store;
pub mod verify;

pub use config::{BlobStoreConfig, ConfigError, RowStoreConfig};
pub use import::{DEFAULT_DESTINATION, ImportError, ImportReport, ImportRequest, run_import};
pub use pipeline::{CancelFlag, DEFAULT_WORKERS, Pipeline, PipelineError, PipelineSummary};
pub use record::{FileKind, FileRecord, NormalizeError, normalize};
pub use registry::{Case, CaseRegistry, Exhibit, NewExhibit, PurgeReport, RegistryError};
pub use router::{INLINE_THRESHOLD, Placement, UploadError, UploadOutcome, UploadRouter};
pub use rowkey::{BUCKETS, allocate};
pub use stats::{IngestStats, StatsSnapshot};
pub use store::{BlobStore, FsBlobStore, Row, RowStore, SqliteRowStore, StoreError};
pub use verify::{VerifyReport, verify};
