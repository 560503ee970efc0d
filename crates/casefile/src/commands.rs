//! Subcommands of the `casefile` binary.

use std::path::PathBuf;

use clap::Args;
use tracing::{debug, warn};

use casefile::{BlobStoreConfig, FsBlobStore, RowStoreConfig, SqliteRowStore, StoreError, config};

pub mod cases;
pub mod ingest;
pub mod purge;
pub mod schema;
pub mod verify;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
pub type CommandResult = Result<(), BoxError>;

/// Combine an operation's result with closing the row store after it.
///
/// The operation's own error wins; a close failure behind it is logged.
pub fn finish<T, E>(result: Result<T, E>, closed: Result<(), StoreError>) -> Result<T, BoxError>
where
    E: Into<BoxError>,
{
    match (result, closed) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(close_err)) => Err(close_err.into()),
        (Err(err), Ok(())) => Err(err.into()),
        (Err(err), Err(close_err)) => {
            warn!(%close_err, "Failed to close row store");
            Err(err.into())
        }
    }
}

/// Backend locations shared by every subcommand
#[derive(Args, Debug)]
pub struct StoreArgs {
    /// Row store configuration file (JSON, e.g. {"path": "casefile.db"})
    #[arg(long)]
    row_store_config: Option<PathBuf>,

    /// Blob store configuration file (JSON, e.g. {"root": "casefile-blobs"})
    #[arg(long)]
    blob_store_config: Option<PathBuf>,
}

impl StoreArgs {
    pub fn open_rows(&self) -> Result<SqliteRowStore, BoxError> {
        let config: RowStoreConfig = config::load(self.row_store_config.as_deref())?;
        debug!(path = ?config.path, "Opening row store");
        Ok(SqliteRowStore::open(&config.path)?)
    }

    pub fn open_blobs(&self) -> Result<FsBlobStore, BoxError> {
        let config: BlobStoreConfig = config::load(self.blob_store_config.as_deref())?;
        debug!(root = ?config.root, "Opening blob store");
        let store = FsBlobStore::new(config.root);
        store.init()?;
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn closed_badly() -> Result<(), StoreError> {
        Err(StoreError::InvalidName("closing".into()))
    }

    #[test]
    fn operation_error_wins_over_close_error() {
        let result: Result<(), StoreError> = Err(StoreError::NoSuchTable("forensicData".into()));
        let err = finish(result, closed_badly()).unwrap_err();
        assert_eq!(err.to_string(), "Table not found: forensicData");
    }

    #[test]
    fn close_error_surfaces_after_success() {
        let err = finish(Ok::<_, StoreError>(7), closed_badly()).unwrap_err();
        assert_eq!(err.to_string(), "Invalid table or family name: closing");
    }

    #[test]
    fn success_passes_through() {
        assert_eq!(finish(Ok::<_, StoreError>(7), Ok(())).unwrap(), 7);
    }
}
