//! File ingestion pipeline
//!
//! # Architecture
//!
//! - **watcher**: polls the source directory and emits paths not seen before
//! - **parser**: streams records, unit identifiers and errors out of one TSV file
//! - **worker**: drives one parse at a time, persists records and outcomes,
//!   triggers reports
//! - **store**: `RecordStore` trait and its Postgres implementation
//! - **report**: `ReportWriter` trait with the SVG and PDF writers
//!
//! ```text
//! Watcher ──path──▶ IngestWorker ──▶ TsvParser
//!                        ▲  (records, guids, error)
//!                        └──────────────┘
//!                        │
//!                        ├──▶ RecordStore
//!                        └──▶ ReportWriter
//! ```

pub mod error;
pub mod parser;
pub mod report;
pub mod store;
pub mod watcher;
pub mod worker;

pub use error::{IngestError, ParseError, StoreError};
pub use parser::{ParseStreams, ParsedFile, TsvParser};
pub use report::{PdfReportWriter, ReportLayout, ReportSet, ReportWriter, SvgReportWriter};
pub use store::{PgRecordStore, RecordStore};
pub use watcher::Watcher;
pub use worker::{IngestWorker, WorkerStats};
