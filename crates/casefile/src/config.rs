//! Backend configuration files.
//!
//! Each backend reads an optional JSON document; absent files and absent
//! fields fall back to the defaults below.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RowStoreConfig {
    /// SQLite database holding the row-store tables
    pub path: PathBuf,
}

impl Default for RowStoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("casefile.db"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlobStoreConfig {
    /// Local directory standing in for the blob namespace root
    pub root: PathBuf,
}

impl Default for BlobStoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("casefile-blobs"),
        }
    }
}

/// Load a config document, or the defaults if no path is given.
pub fn load<T>(path: Option<&Path>) -> Result<T, ConfigError>
where
    T: DeserializeOwned + Default,
{
    let Some(path) = path else {
        return Ok(T::default());
    };

    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_without_file() {
        let rows: RowStoreConfig = load(None).unwrap();
        assert_eq!(rows, RowStoreConfig::default());
        let blobs: BlobStoreConfig = load(None).unwrap();
        assert_eq!(blobs.root, PathBuf::from("casefile-blobs"));
    }

    #[test]
    fn reads_json_with_missing_fields() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rows.json");
        fs::write(&path, r#"{"path": "/var/lib/casefile/rows.db"}"#).unwrap();
        let rows: RowStoreConfig = load(Some(&path)).unwrap();
        assert_eq!(rows.path, PathBuf::from("/var/lib/casefile/rows.db"));

        fs::write(&path, "{}").unwrap();
        let rows: RowStoreConfig = load(Some(&path)).unwrap();
        assert_eq!(rows, RowStoreConfig::default());
    }

    #[test]
    fn reports_bad_files() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(matches!(
            load::<BlobStoreConfig>(Some(&missing)),
            Err(ConfigError::Read { .. })
        ));

        let broken = dir.path().join("broken.json");
        fs::write(&broken, "{ root: ").unwrap();
        assert!(matches!(
            load::<BlobStoreConfig>(Some(&broken)),
            Err(ConfigError::Parse { .. })
        ));
    }
}
