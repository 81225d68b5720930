//! Error types for tsvflow

use thiserror::Error;

/// Result type alias for tsvflow operations
pub type Result<T> = std::result::Result<T, TsvflowError>;

/// Main error type shared by the tsvflow crates
#[derive(Error, Debug)]
pub enum TsvflowError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}
