//! Consistency check of the data table.
//!
//! Metadata and content are written separately, so an interrupted upload
//! can leave a regular-file row without content, and a lost blob leaves a
//! dangling pointer. This pass reports both; it does not modify anything.

use tracing::{info, warn};

use crate::record::FileKind;
use crate::rowkey;
use crate::schema::{CONTENT_FAMILY, DATA_TABLE, KIND_COLUMN, METADATA_FAMILY, content_columns};
use crate::store::{BlobStore, RowStore, StoreError};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyReport {
    /// Regular-file rows examined
    pub checked: u64,
    /// Regular-file rows with no inline or external content
    pub missing_content: Vec<String>,
    /// Rows whose external pointer names a missing blob
    pub missing_blobs: Vec<String>,
}

impl VerifyReport {
    pub fn is_clean(&self) -> bool {
        self.missing_content.is_empty() && self.missing_blobs.is_empty()
    }
}

/// Check every regular-file row, or only those of one exhibit.
pub fn verify(
    rows: &dyn RowStore,
    blobs: &dyn BlobStore,
    exhibit_id: Option<&str>,
) -> Result<VerifyReport, StoreError> {
    let mut report = VerifyReport::default();

    let regular = rows
        .scan(DATA_TABLE, METADATA_FAMILY, Some(KIND_COLUMN))?
        .into_iter()
        .filter(|row| {
            row.get_str(KIND_COLUMN).and_then(FileKind::parse) == Some(FileKind::Regular)
        })
        .filter(|row| exhibit_id.is_none_or(|ns| rowkey::in_namespace(&row.key, ns)));

    for row in regular {
        report.checked += 1;

        let Some(content) = rows.get(DATA_TABLE, &row.key, CONTENT_FAMILY)? else {
            warn!(row_key = %row.key, "Regular file row has no content");
            report.missing_content.push(row.key);
            continue;
        };

        if let Some(remote_path) = content.get_str(content_columns::EXTERNAL) {
            if !blobs.exists(remote_path)? {
                warn!(row_key = %row.key, %remote_path, "External content is missing");
                report.missing_blobs.push(row.key);
            }
        } else if content.get(content_columns::INLINE).is_none() {
            warn!(row_key = %row.key, "Regular file row has no content");
            report.missing_content.push(row.key);
        }
    }

    info!(
        checked = report.checked,
        missing_content = report.missing_content.len(),
        missing_blobs = report.missing_blobs.len(),
        "Verification finished"
    );
    Ok(report)
}
