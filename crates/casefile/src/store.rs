//! Backend capabilities used by the ingestion engine.
//!
//! The row store is a sparse wide-column table keyed by a string row key;
//! the blob store is a path-addressed bulk filesystem. Both are shared by
//! every pool worker, so implementations must be `Send + Sync`.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

mod fs;
mod sqlite;
mod types;

pub use fs::FsBlobStore;
pub use sqlite::SqliteRowStore;
pub use types::StoreError;

/// The cells of one row within one column family.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    pub key: String,
    pub cells: BTreeMap<String, Vec<u8>>,
}

impl Row {
    pub fn get(&self, column: &str) -> Option<&[u8]> {
        self.cells.get(column).map(Vec::as_slice)
    }

    /// Get a column as UTF-8 text; `None` if absent or not valid text.
    pub fn get_str(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(|v| std::str::from_utf8(v).ok())
    }
}

pub trait RowStore: Send + Sync {
    /// Create a table with the given column families and region split keys.
    /// Returns Ok(true) if newly created, Ok(false) if it already existed.
    fn create_table(
        &self,
        name: &str,
        families: &[&str],
        split_keys: &[String],
    ) -> Result<bool, StoreError>;

    /// Delete a table and all its rows.
    /// Returns Ok(true) if deleted, Ok(false) if it did not exist.
    fn delete_table(&self, name: &str) -> Result<bool, StoreError>;

    fn table_exists(&self, name: &str) -> Result<bool, StoreError>;

    /// Write a single cell.
    fn put(
        &self,
        table: &str,
        row_key: &str,
        family: &str,
        column: &str,
        value: &[u8],
    ) -> Result<(), StoreError>;

    /// Write several cells of one row and family as a single mutation.
    fn put_row(
        &self,
        table: &str,
        row_key: &str,
        family: &str,
        cells: &[(&str, Vec<u8>)],
    ) -> Result<(), StoreError> {
        for (column, value) in cells {
            self.put(table, row_key, family, column, value)?;
        }
        Ok(())
    }

    /// Read one row's cells within a family.
    fn get(&self, table: &str, row_key: &str, family: &str) -> Result<Option<Row>, StoreError>;

    /// Scan every row that has cells in `family` (restricted to `column` if
    /// given), in row key order.
    fn scan(
        &self,
        table: &str,
        family: &str,
        column: Option<&str>,
    ) -> Result<Vec<Row>, StoreError>;

    /// Count distinct row keys, optionally only those starting with `prefix`.
    fn count_rows(&self, table: &str, prefix: Option<&str>) -> Result<u64, StoreError>;

    /// Delete every cell of a row. Deleting a missing row is not an error.
    fn delete_row(&self, table: &str, row_key: &str) -> Result<(), StoreError>;
}

pub trait BlobStore: Send + Sync {
    /// Write everything `source` yields to `remote_path`, replacing anything
    /// already there. Returns the number of bytes written.
    fn copy_from_reader(
        &self,
        source: &mut dyn Read,
        remote_path: &str,
    ) -> Result<u64, StoreError>;

    /// Copy a local file to `remote_path`, replacing anything already there.
    /// Returns the number of bytes copied.
    fn copy_local_file_to(&self, local_path: &Path, remote_path: &str) -> Result<u64, StoreError> {
        let mut source = File::open(local_path)?;
        self.copy_from_reader(&mut source, remote_path)
    }

    /// Create `remote_path` and all its parents as directories.
    fn ensure_directory(&self, remote_path: &str) -> Result<(), StoreError>;

    fn exists(&self, remote_path: &str) -> Result<bool, StoreError>;
}

/// Join a blob-store path and a child name with a single `/`.
pub fn join_remote(base: &str, child: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), child.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_remote_paths() {
        assert_eq!(join_remote("/forensic", "0_0"), "/forensic/0_0");
        assert_eq!(join_remote("/forensic/", "0_0"), "/forensic/0_0");
        assert_eq!(join_remote("/", "0_0"), "/0_0");
        assert_eq!(join_remote("/forensic/0_0", "/01_0_0_1"), "/forensic/0_0/01_0_0_1");
    }

    #[test]
    fn row_text_accessors() {
        let row = Row {
            key: "k".into(),
            cells: BTreeMap::from([
                ("text".to_string(), b"hello".to_vec()),
                ("bin".to_string(), vec![0xff, 0xfe]),
            ]),
        };
        assert_eq!(row.get_str("text"), Some("hello"));
        assert_eq!(row.get_str("bin"), None);
        assert_eq!(row.get("bin"), Some(&[0xff, 0xfe][..]));
        assert_eq!(row.get("missing"), None);
    }
}
