//! Case and exhibit registry.
//!
//! Case ids are sequence numbers (`0`, `1`, ...) and exhibit ids append a
//! per-case sequence (`{case_id}_{n}`). Both sequences come from counting
//! the rows already present, so they are only correct with a single writer:
//! registrations are serialised within this process, and running two
//! ingestion processes against one row store at the same time can hand out
//! the same id twice.

use std::sync::{Mutex, PoisonError};

use jiff::Timestamp;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::rowkey;
use crate::schema::{
    CASE_TABLE, COMMON_FAMILY, CONTENT_FAMILY, DATA_TABLE, EXHIBIT_TABLE, METADATA_FAMILY,
    PATH_COLUMN, case_columns, data_split_keys, exhibit_columns,
};
use crate::stats::StatsSnapshot;
use crate::store::{Row, RowStore, StoreError, join_remote};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Row store error: {0}")]
    Store(#[from] StoreError),

    #[error("Case number must not be empty")]
    EmptyCaseNumber,

    #[error("Case not found: {0}")]
    UnknownCase(String),
}

/// A registered forensic case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Case {
    pub id: String,
    pub number: String,
    pub name: Option<String>,
    pub examiner: Option<String>,
    pub created: Option<String>,
}

/// One import run belonging to a case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Exhibit {
    pub id: String,
    pub case_id: String,
    pub name: Option<String>,
    pub import_date: String,
    /// Blob-store directory for this exhibit's external content
    pub base_path: String,
    pub source_path: Option<String>,
    pub import_host: Option<String>,
    /// Run totals, once the import has finished
    pub totals: Option<StatsSnapshot>,
}

/// Parameters of a new exhibit.
#[derive(Debug, Clone, Default)]
pub struct NewExhibit<'a> {
    pub name: Option<&'a str>,
    /// Defaults to the current time
    pub import_date: Option<&'a str>,
    /// Blob-store base path; the exhibit id is appended to it
    pub base_path: &'a str,
    pub source_path: Option<&'a str>,
    pub import_host: Option<&'a str>,
}

/// What an administrative purge removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub exhibits: Vec<String>,
    pub data_rows: u64,
    /// Blob-store directories that were left in place
    pub blob_paths: Vec<String>,
}

/// Held from counting existing ids until the new row is written.
static REGISTRATION: Mutex<()> = Mutex::new(());

pub struct CaseRegistry<'a> {
    rows: &'a dyn RowStore,
}

impl<'a> CaseRegistry<'a> {
    pub fn new(rows: &'a dyn RowStore) -> Self {
        Self { rows }
    }

    /// Create the registry and data tables. Existing tables are left alone.
    pub fn create_schema(&self) -> Result<(), RegistryError> {
        let tables: [(&str, &[&str], Vec<String>); 3] = [
            (CASE_TABLE, &[COMMON_FAMILY], Vec::new()),
            (EXHIBIT_TABLE, &[COMMON_FAMILY], Vec::new()),
            (
                DATA_TABLE,
                &[METADATA_FAMILY, CONTENT_FAMILY],
                data_split_keys(),
            ),
        ];

        for (table, families, split_keys) in tables {
            if self.rows.create_table(table, families, &split_keys)? {
                info!(table, "Created table");
            } else {
                info!(table, "Table already exists");
            }
        }
        Ok(())
    }

    /// Drop the registry and data tables. Missing tables are skipped.
    pub fn drop_schema(&self) -> Result<(), RegistryError> {
        for table in [CASE_TABLE, EXHIBIT_TABLE, DATA_TABLE] {
            if self.rows.delete_table(table)? {
                info!(table, "Dropped table");
            } else {
                info!(table, "Table does not exist");
            }
        }
        Ok(())
    }

    /// Find or create the case with this case number, returning its id.
    pub fn register_case(
        &self,
        case_number: &str,
        name: Option<&str>,
        examiner: Option<&str>,
    ) -> Result<String, RegistryError> {
        if case_number.is_empty() {
            return Err(RegistryError::EmptyCaseNumber);
        }
        let _guard = REGISTRATION.lock().unwrap_or_else(PoisonError::into_inner);

        let existing = self
            .rows
            .scan(CASE_TABLE, COMMON_FAMILY, Some(case_columns::CASE_NUMBER))?;
        if let Some(row) = existing
            .iter()
            .find(|row| row.get_str(case_columns::CASE_NUMBER) == Some(case_number))
        {
            debug!(case_id = %row.key, case_number, "Case already registered");
            return Ok(row.key.clone());
        }

        let count = self.rows.count_rows(CASE_TABLE, None)?;
        let case_id = self.next_free_key(CASE_TABLE, count, |n| n.to_string())?;

        let created = Timestamp::now().to_string();
        let mut cells = vec![
            (case_columns::CASE_NUMBER, case_number.as_bytes().to_vec()),
            (case_columns::CREATED, created.into_bytes()),
        ];
        if let Some(name) = name {
            cells.push((case_columns::CASE_NAME, name.as_bytes().to_vec()));
        }
        if let Some(examiner) = examiner {
            cells.push((case_columns::EXAMINER, examiner.as_bytes().to_vec()));
        }
        self.rows
            .put_row(CASE_TABLE, &case_id, COMMON_FAMILY, &cells)?;

        info!(%case_id, case_number, "Registered case");
        Ok(case_id)
    }

    /// Register a new exhibit under an existing case.
    pub fn register_exhibit(
        &self,
        case_id: &str,
        exhibit: &NewExhibit<'_>,
    ) -> Result<Exhibit, RegistryError> {
        let _guard = REGISTRATION.lock().unwrap_or_else(PoisonError::into_inner);

        if self.rows.get(CASE_TABLE, case_id, COMMON_FAMILY)?.is_none() {
            return Err(RegistryError::UnknownCase(case_id.to_string()));
        }

        let prefix = format!("{case_id}_");
        let count = self.rows.count_rows(EXHIBIT_TABLE, Some(&prefix))?;
        let id = self.next_free_key(EXHIBIT_TABLE, count, |n| format!("{prefix}{n}"))?;

        let import_date = exhibit
            .import_date
            .map(str::to_string)
            .unwrap_or_else(|| Timestamp::now().to_string());
        let base_path = join_remote(exhibit.base_path, &id);

        let mut cells = vec![
            (exhibit_columns::IMPORT_DATE, import_date.as_bytes().to_vec()),
            (exhibit_columns::BASE_PATH, base_path.as_bytes().to_vec()),
        ];
        for (column, value) in [
            (exhibit_columns::EXHIBIT_NAME, exhibit.name),
            (exhibit_columns::SOURCE_PATH, exhibit.source_path),
            (exhibit_columns::IMPORT_HOST, exhibit.import_host),
        ] {
            if let Some(value) = value {
                cells.push((column, value.as_bytes().to_vec()));
            }
        }
        self.rows.put_row(EXHIBIT_TABLE, &id, COMMON_FAMILY, &cells)?;

        info!(exhibit_id = %id, %base_path, "Registered exhibit");
        Ok(Exhibit {
            id,
            case_id: case_id.to_string(),
            name: exhibit.name.map(str::to_string),
            import_date,
            base_path,
            source_path: exhibit.source_path.map(str::to_string),
            import_host: exhibit.import_host.map(str::to_string),
            totals: None,
        })
    }

    /// Store the totals of a finished import on its exhibit row.
    pub fn record_totals(
        &self,
        exhibit_id: &str,
        totals: &StatsSnapshot,
    ) -> Result<(), RegistryError> {
        let cells: Vec<(&str, Vec<u8>)> = [
            (exhibit_columns::ROW_COUNT, totals.rows),
            (exhibit_columns::INLINE_FILES, totals.inline_files),
            (exhibit_columns::INLINE_BYTES, totals.inline_bytes),
            (exhibit_columns::EXTERNAL_FILES, totals.external_files),
            (exhibit_columns::EXTERNAL_BYTES, totals.external_bytes),
            (exhibit_columns::FAILED_FILES, totals.failed_files),
        ]
        .into_iter()
        .map(|(column, value)| (column, value.to_string().into_bytes()))
        .collect();

        self.rows
            .put_row(EXHIBIT_TABLE, exhibit_id, COMMON_FAMILY, &cells)?;
        Ok(())
    }

    /// Every case with its exhibits, ordered by id.
    pub fn list_cases_and_exhibits(&self) -> Result<Vec<(Case, Vec<Exhibit>)>, RegistryError> {
        let mut cases: Vec<Case> = self
            .rows
            .scan(CASE_TABLE, COMMON_FAMILY, None)?
            .iter()
            .map(case_from_row)
            .collect();
        cases.sort_by_key(|c| id_sort_key(&c.id));

        let mut exhibits: Vec<Exhibit> = self
            .rows
            .scan(EXHIBIT_TABLE, COMMON_FAMILY, None)?
            .iter()
            .filter_map(exhibit_from_row)
            .collect();
        exhibits.sort_by_key(|e| id_sort_key(&e.id));

        let listing = cases
            .into_iter()
            .map(|case| {
                let prefix = format!("{}_", case.id);
                let owned = exhibits
                    .iter()
                    .filter(|e| e.id.starts_with(&prefix))
                    .cloned()
                    .collect();
                (case, owned)
            })
            .collect();
        Ok(listing)
    }

    /// Remove a case, its exhibits and their data rows.
    ///
    /// Blob-store content is not touched; the report names the directories
    /// that still hold it.
    pub fn purge_case(&self, case_id: &str) -> Result<PurgeReport, RegistryError> {
        let _guard = REGISTRATION.lock().unwrap_or_else(PoisonError::into_inner);

        if self.rows.get(CASE_TABLE, case_id, COMMON_FAMILY)?.is_none() {
            return Err(RegistryError::UnknownCase(case_id.to_string()));
        }

        let mut report = PurgeReport::default();

        let data_keys: Vec<String> = self
            .rows
            .scan(DATA_TABLE, METADATA_FAMILY, Some(PATH_COLUMN))?
            .into_iter()
            .map(|row| row.key)
            .filter(|key| rowkey::in_case(key, case_id))
            .collect();
        for key in &data_keys {
            self.rows.delete_row(DATA_TABLE, key)?;
        }
        report.data_rows = data_keys.len() as u64;

        let prefix = format!("{case_id}_");
        for row in self.rows.scan(EXHIBIT_TABLE, COMMON_FAMILY, None)? {
            if !row.key.starts_with(&prefix) {
                continue;
            }
            if let Some(path) = row.get_str(exhibit_columns::BASE_PATH) {
                report.blob_paths.push(path.to_string());
            }
            self.rows.delete_row(EXHIBIT_TABLE, &row.key)?;
            report.exhibits.push(row.key);
        }

        self.rows.delete_row(CASE_TABLE, case_id)?;

        if !report.blob_paths.is_empty() {
            warn!(
                %case_id,
                paths = ?report.blob_paths,
                "Blob-store content left in place after purge"
            );
        }
        info!(
            %case_id,
            exhibits = report.exhibits.len(),
            data_rows = report.data_rows,
            "Purged case"
        );
        Ok(report)
    }

    /// First key at or after sequence `start` that is not in use.
    ///
    /// Counts only equal the next free sequence when no rows were purged, so
    /// skip over any survivors of a gap.
    fn next_free_key(
        &self,
        table: &str,
        start: u64,
        key_for: impl Fn(u64) -> String,
    ) -> Result<String, RegistryError> {
        let mut seq = start;
        loop {
            let key = key_for(seq);
            if self.rows.get(table, &key, COMMON_FAMILY)?.is_none() {
                return Ok(key);
            }
            seq += 1;
        }
    }
}

fn text(row: &Row, column: &str) -> Option<String> {
    row.get_str(column).map(str::to_string)
}

fn number(row: &Row, column: &str) -> Option<u64> {
    row.get_str(column).and_then(|s| s.parse().ok())
}

fn case_from_row(row: &Row) -> Case {
    Case {
        id: row.key.clone(),
        number: text(row, case_columns::CASE_NUMBER).unwrap_or_default(),
        name: text(row, case_columns::CASE_NAME),
        examiner: text(row, case_columns::EXAMINER),
        created: text(row, case_columns::CREATED),
    }
}

fn exhibit_from_row(row: &Row) -> Option<Exhibit> {
    let (case_id, _) = row.key.rsplit_once('_')?;

    let totals = number(row, exhibit_columns::ROW_COUNT).map(|rows| StatsSnapshot {
        rows,
        inline_files: number(row, exhibit_columns::INLINE_FILES).unwrap_or(0),
        inline_bytes: number(row, exhibit_columns::INLINE_BYTES).unwrap_or(0),
        external_files: number(row, exhibit_columns::EXTERNAL_FILES).unwrap_or(0),
        external_bytes: number(row, exhibit_columns::EXTERNAL_BYTES).unwrap_or(0),
        failed_files: number(row, exhibit_columns::FAILED_FILES).unwrap_or(0),
    });

    Some(Exhibit {
        id: row.key.clone(),
        case_id: case_id.to_string(),
        name: text(row, exhibit_columns::EXHIBIT_NAME),
        import_date: text(row, exhibit_columns::IMPORT_DATE).unwrap_or_default(),
        base_path: text(row, exhibit_columns::BASE_PATH).unwrap_or_default(),
        source_path: text(row, exhibit_columns::SOURCE_PATH),
        import_host: text(row, exhibit_columns::IMPORT_HOST),
        totals,
    })
}

/// Order ids like `2` before `10` and `1_2` before `1_10`.
fn id_sort_key(id: &str) -> Vec<(u64, String)> {
    id.split('_')
        .map(|part| match part.parse::<u64>() {
            Ok(n) => (n, String::new()),
            Err(_) => (u64::MAX, part.to_string()),
        })
        .collect()
}
