//! Error types for the ingestion pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Per-file parse failure. Recorded as the file's outcome; never fatal.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("not a tsv file: {}", path.display())]
    NotTabularFormat { path: PathBuf },

    #[error("failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read {} at line {line}: {message}", path.display())]
    Read {
        path: PathBuf,
        line: u64,
        message: String,
    },
}

/// Store failure. Fatal to the worker.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Pipeline-level failure that stops the worker.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("directory scan of {} failed: {source}", path.display())]
    Discovery {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("report for {} failed: {message}", path.display())]
    Report { path: PathBuf, message: String },

    #[error("background task failed: {0}")]
    Join(String),
}

impl From<tokio::task::JoinError> for IngestError {
    fn from(err: tokio::task::JoinError) -> Self {
        IngestError::Join(err.to_string())
    }
}
