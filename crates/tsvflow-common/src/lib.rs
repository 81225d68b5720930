//! tsvflow Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, logging setup, and error handling for the tsvflow workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`TsvflowError`] and the [`Result`] alias
//! - **Logging**: [`logging::LogConfig`] and [`logging::init_logging`]
//! - **Types**: the ingested [`types::Record`] and the per-file [`types::FileOutcome`]
//!
//! # Example
//!
//! ```no_run
//! use tsvflow_common::logging::{init_logging, LogConfig};
//! use tsvflow_common::types::FileOutcome;
//!
//! fn main() -> anyhow::Result<()> {
//!     init_logging(&LogConfig::from_env()?)?;
//!     let outcome = FileOutcome::success("/data/in/a.tsv");
//!     tracing::info!(file = %outcome.file, "processed");
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{Result, TsvflowError};
pub use types::{FileOutcome, Record};
