//! tsvflow server library
//!
//! Watches a directory for tab-separated record files, stores their records
//! in PostgreSQL, writes SVG and PDF reports per unit identifier and serves the
//! stored records over HTTP.
//!
//! # Overview
//!
//! - **ingest**: watcher, streaming parser and worker, plus the store and
//!   report-writer seams they persist through
//! - **features**: HTTP feature slices (`records`)
//! - **api**: router assembly, response envelopes, serving
//! - **config**: layered configuration (defaults, flags, environment, JSON file)
//! - **middleware**: CORS and request tracing
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use tsvflow_server::ingest::{
//!     IngestWorker, PdfReportWriter, PgRecordStore, ReportSet, SvgReportWriter, TsvParser, Watcher,
//! };
//!
//! # async fn run(pool: sqlx::PgPool) -> anyhow::Result<()> {
//! let store = Arc::new(PgRecordStore::new(pool));
//! let reports = Arc::new(
//!     ReportSet::new()
//!         .with(SvgReportWriter::new("/data/in", "/data/out"))
//!         .with(PdfReportWriter::new("/data/in", "/data/out")),
//! );
//! let watcher = Watcher::new("/data/in", std::time::Duration::from_secs(10));
//!
//! let worker = IngestWorker::new(store, reports, watcher, TsvParser::new());
//! let stats = worker.run(CancellationToken::new()).await?;
//! println!("{} records saved", stats.records_saved);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod features;
pub mod ingest;
pub mod middleware;

pub use error::{ApiResult, AppError};
