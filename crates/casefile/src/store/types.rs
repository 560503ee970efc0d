use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Table not found: {0}")]
    NoSuchTable(String),

    #[error("Column family {family} not found in table {table}")]
    NoSuchFamily { table: String, family: String },

    #[error("Invalid table or family name: {0}")]
    InvalidName(String),

    #[error("Invalid blob path: {0}")]
    InvalidPath(String),

    #[error("Corrupt table catalog: {0}")]
    Catalog(#[from] serde_json::Error),
}
