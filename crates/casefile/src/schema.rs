//! Table layout of the row store.
//!
//! Two registry tables hold cases and exhibits in a single `common` family.
//! The data table holds one row per ingested entry, split into a `metadata`
//! family (one column per file attribute) and a `content` family (inline
//! bytes or a blob-store pointer, never both).

use crate::record::FileRecord;
use crate::rowkey::BUCKETS;

pub const CASE_TABLE: &str = "forensicCase";
pub const EXHIBIT_TABLE: &str = "forensicExhibit";
pub const DATA_TABLE: &str = "forensicData";

pub const COMMON_FAMILY: &str = "common";
pub const METADATA_FAMILY: &str = "metadata";
pub const CONTENT_FAMILY: &str = "content";

/// Columns of the `common` family in the case table.
pub mod case_columns {
    pub const CASE_NUMBER: &str = "caseNumber";
    pub const CASE_NAME: &str = "caseName";
    pub const EXAMINER: &str = "examiner";
    pub const CREATED: &str = "created";
}

/// Columns of the `common` family in the exhibit table.
pub mod exhibit_columns {
    pub const EXHIBIT_NAME: &str = "exhibitName";
    pub const IMPORT_DATE: &str = "importDate";
    pub const BASE_PATH: &str = "basePath";
    pub const SOURCE_PATH: &str = "sourcePath";
    pub const IMPORT_HOST: &str = "importHost";

    pub const ROW_COUNT: &str = "rowCount";
    pub const INLINE_FILES: &str = "inlineFiles";
    pub const INLINE_BYTES: &str = "inlineBytes";
    pub const EXTERNAL_FILES: &str = "externalFiles";
    pub const EXTERNAL_BYTES: &str = "externalBytes";
    pub const FAILED_FILES: &str = "failedFiles";
}

/// Columns of the `content` family in the data table.
pub mod content_columns {
    /// Raw file bytes, for files at or under the inline threshold.
    pub const INLINE: &str = "inline";
    /// Blob-store path of the file bytes, for files above the threshold.
    pub const EXTERNAL: &str = "external";
    /// Hex BLAKE3 digest of the file bytes.
    pub const BLAKE3: &str = "blake3";
}

/// Name of the metadata column carrying the file kind.
pub const KIND_COLUMN: &str = "kind";
/// Name of the metadata column carrying the relative path.
pub const PATH_COLUMN: &str = "path";

/// One entry of the attribute-to-column mapping.
pub struct MetadataColumn {
    pub name: &'static str,
    pub value: fn(&FileRecord) -> Option<String>,
}

/// Every metadata column written for a [`FileRecord`], in write order.
///
/// Optional attributes that are absent produce no cell.
pub const METADATA_COLUMNS: &[MetadataColumn] = &[
    MetadataColumn {
        name: PATH_COLUMN,
        value: |r| Some(r.relative_path.clone()),
    },
    MetadataColumn {
        name: KIND_COLUMN,
        value: |r| Some(r.kind.as_str().to_string()),
    },
    MetadataColumn {
        name: "size",
        value: |r| r.size.map(|s| s.to_string()),
    },
    MetadataColumn {
        name: "owner",
        value: |r| Some(r.owner.clone()),
    },
    MetadataColumn {
        name: "group",
        value: |r| Some(r.group.clone()),
    },
    MetadataColumn {
        name: "permissions",
        value: |r| Some(r.permissions.clone()),
    },
    MetadataColumn {
        name: "modified",
        value: |r| Some(r.modified.clone()),
    },
    MetadataColumn {
        name: "accessed",
        value: |r| Some(r.accessed.clone()),
    },
    MetadataColumn {
        name: "changed",
        value: |r| r.changed.clone(),
    },
    MetadataColumn {
        name: "created",
        value: |r| Some(r.created.clone()),
    },
    MetadataColumn {
        name: "linkTarget",
        value: |r| r.link_target.clone(),
    },
];

/// Build the metadata cells for a record.
pub fn metadata_cells(record: &FileRecord) -> Vec<(&'static str, Vec<u8>)> {
    METADATA_COLUMNS
        .iter()
        .filter_map(|col| (col.value)(record).map(|v| (col.name, v.into_bytes())))
        .collect()
}

/// Split keys for the data table: one region per bucket prefix.
///
/// `BUCKETS - 1` boundaries (`01`..`29`) cut the key space into `BUCKETS`
/// regions whose start keys are `00`..`29`.
pub fn data_split_keys() -> Vec<String> {
    (1..BUCKETS).map(|b| format!("{b:02}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FileKind;

    fn record(kind: FileKind, size: Option<u64>) -> FileRecord {
        FileRecord {
            relative_path: "a/b.txt".into(),
            kind,
            size,
            owner: "root".into(),
            group: "wheel".into(),
            permissions: "rw-r--r--".into(),
            modified: "2024-01-01T00:00:00Z".into(),
            accessed: "2024-01-02T00:00:00Z".into(),
            changed: None,
            created: "2024-01-01T00:00:00Z".into(),
            link_target: None,
        }
    }

    #[test]
    fn split_keys_cover_every_bucket() {
        let keys = data_split_keys();
        assert_eq!(keys.len() as u64, BUCKETS - 1);
        assert_eq!(keys.first().map(String::as_str), Some("01"));
        assert_eq!(keys.last().map(String::as_str), Some("29"));
    }

    #[test]
    fn absent_attributes_produce_no_cells() {
        let cells = metadata_cells(&record(FileKind::Directory, None));
        let names: Vec<_> = cells.iter().map(|(n, _)| *n).collect();
        assert!(!names.contains(&"size"));
        assert!(!names.contains(&"changed"));
        assert!(!names.contains(&"linkTarget"));
        assert!(names.contains(&"path"));
        assert!(names.contains(&"kind"));
    }

    #[test]
    fn regular_file_cells() {
        let cells = metadata_cells(&record(FileKind::Regular, Some(42)));
        let size = cells.iter().find(|(n, _)| *n == "size").map(|(_, v)| v.clone());
        assert_eq!(size, Some(b"42".to_vec()));
        let kind = cells.iter().find(|(n, _)| *n == "kind").map(|(_, v)| v.clone());
        assert_eq!(kind, Some(b"regular".to_vec()));
    }
}
