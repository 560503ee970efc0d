//! One complete import run.

use std::path::PathBuf;

use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::pipeline::{Pipeline, PipelineError, PipelineSummary};
use crate::registry::{CaseRegistry, Exhibit, NewExhibit, RegistryError};
use crate::router::UploadRouter;
use crate::store::{BlobStore, RowStore, StoreError};

/// Blob-store base path used when none is given.
pub const DEFAULT_DESTINATION: &str = "/forensic";

/// Failures that stop an import before or around the pipeline.
///
/// Per-file problems are not errors at this level; they show up in the
/// summary counts.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Input directory not found: {0:?}")]
    InputNotFound(PathBuf),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Blob store error: {0}")]
    BlobStore(#[from] StoreError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub input_dir: PathBuf,
    /// Blob-store base path; the exhibit gets a directory beneath it
    pub destination: String,
    /// Generated if absent
    pub case_number: Option<String>,
    pub case_name: Option<String>,
    pub examiner: Option<String>,
    pub exhibit_name: Option<String>,
}

impl ImportRequest {
    pub fn new(input_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            destination: DEFAULT_DESTINATION.to_string(),
            case_number: None,
            case_name: None,
            examiner: None,
            exhibit_name: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImportReport {
    pub case_id: String,
    pub case_number: String,
    pub exhibit: Exhibit,
    pub summary: PipelineSummary,
}

/// Register the case and exhibit, then ingest `request.input_dir`.
pub fn run_import(
    rows: &dyn RowStore,
    blobs: &dyn BlobStore,
    request: &ImportRequest,
    pipeline: &Pipeline,
) -> Result<ImportReport, ImportError> {
    let input_dir = request
        .input_dir
        .canonicalize()
        .map_err(|_| ImportError::InputNotFound(request.input_dir.clone()))?;
    if !input_dir.is_dir() {
        return Err(ImportError::InputNotFound(request.input_dir.clone()));
    }

    let registry = CaseRegistry::new(rows);
    registry.create_schema()?;

    let case_number = request
        .case_number
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let case_id = registry.register_case(
        &case_number,
        request.case_name.as_deref(),
        request.examiner.as_deref(),
    )?;

    let source_path = input_dir.to_string_lossy();
    let import_host = hostname::get().ok().and_then(|h| h.into_string().ok());
    let exhibit = registry.register_exhibit(
        &case_id,
        &NewExhibit {
            name: request.exhibit_name.as_deref(),
            import_date: None,
            base_path: &request.destination,
            source_path: Some(&*source_path),
            import_host: import_host.as_deref(),
        },
    )?;
    blobs.ensure_directory(&exhibit.base_path)?;

    info!(
        %case_id,
        %case_number,
        exhibit_id = %exhibit.id,
        source = ?input_dir,
        "Importing exhibit"
    );

    let router = UploadRouter::new(rows, blobs, &exhibit);
    let summary = pipeline.run(&input_dir, &router)?;
    registry.record_totals(&exhibit.id, &summary.stats)?;

    Ok(ImportReport {
        case_id,
        case_number,
        exhibit: Exhibit {
            totals: Some(summary.stats),
            ..exhibit
        },
        summary,
    })
}
