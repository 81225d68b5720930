//! Ingestion worker
//!
//! Consumes file paths from the [`Watcher`], runs one parse at a time,
//! persists every record as soon as it arrives and records a
//! [`FileOutcome`] per file. Successful files get their reports written.
//!
//! Parse failures only affect the current file. Discovery, store and report
//! failures stop the worker and are returned from [`IngestWorker::run`].
//! Cancellation stops it cleanly: whatever was saved stays saved, and the
//! interrupted file gets neither an outcome nor a report.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tsvflow_common::types::{FileOutcome, Record};

use super::error::{IngestError, ParseError};
use super::parser::{ParseStreams, TsvParser};
use super::report::ReportWriter;
use super::store::RecordStore;
use super::watcher::Watcher;

/// Capacity of the watcher to worker channel.
const DISCOVERY_CAPACITY: usize = 1;

/// Counters reported when the worker stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub files_succeeded: usize,
    pub files_failed: usize,
    pub records_saved: usize,
}

/// Watcher, parser, store and report writer wired into one loop
pub struct IngestWorker {
    watcher: Watcher,
    processor: FileProcessor,
}

struct FileProcessor {
    store: Arc<dyn RecordStore>,
    reports: Arc<dyn ReportWriter>,
    parser: TsvParser,
}

enum FileResult {
    Finished,
    Cancelled,
}

impl IngestWorker {
    pub fn new(
        store: Arc<dyn RecordStore>,
        reports: Arc<dyn ReportWriter>,
        watcher: Watcher,
        parser: TsvParser,
    ) -> Self {
        Self {
            watcher,
            processor: FileProcessor {
                store,
                reports,
                parser,
            },
        }
    }

    /// Run until `cancel` fires or a fatal error occurs.
    pub async fn run(self, cancel: CancellationToken) -> Result<WorkerStats, IngestError> {
        let mut stats = WorkerStats::default();

        match self.run_inner(&cancel, &mut stats).await {
            Ok(()) => {
                info!(
                    succeeded = stats.files_succeeded,
                    failed = stats.files_failed,
                    records = stats.records_saved,
                    "Ingest worker stopped"
                );
                Ok(stats)
            },
            Err(e) => {
                error!(error = %e, "Ingest worker failed");
                Err(e)
            },
        }
    }

    async fn run_inner(
        self,
        cancel: &CancellationToken,
        stats: &mut WorkerStats,
    ) -> Result<(), IngestError> {
        let Self {
            mut watcher,
            processor,
        } = self;

        let known = processor.store.processed_files().await?;
        info!(known = known.len(), "Seeding watcher with processed files");
        watcher.init_known(known);

        // Stops the watcher whenever this function returns, including on error.
        let scan_cancel = cancel.child_token();
        let _scan_guard = scan_cancel.clone().drop_guard();

        let (tx, mut rx) = mpsc::channel::<String>(DISCOVERY_CAPACITY);
        let scan = watcher.spawn(scan_cancel, tx);

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Ingest worker cancelled");
                    return Ok(());
                }
                next = rx.recv() => next,
            };

            let Some(path) = next else {
                break;
            };

            if let FileResult::Cancelled = processor.process_file(&path, cancel, stats).await? {
                return Ok(());
            }
        }

        // Channel closed: the watcher is done, possibly with an error.
        scan.await??;
        Ok(())
    }
}

impl FileProcessor {
    async fn process_file(
        &self,
        path: &str,
        cancel: &CancellationToken,
        stats: &mut WorkerStats,
    ) -> Result<FileResult, IngestError> {
        info!(file = %path, "Processing file");

        let mut mux = StreamMux::new(self.parser.parse(path));
        let mut records: Vec<Record> = Vec::new();
        let mut guids: Vec<String> = Vec::new();
        let mut parse_error: Option<ParseError> = None;

        loop {
            match mux.next(cancel).await {
                MuxEvent::Record(record) => {
                    self.store.save_record(&record).await?;
                    stats.records_saved += 1;
                    records.push(record);
                },
                MuxEvent::Guid(guid) => guids.push(guid),
                MuxEvent::Error(err) => parse_error = Some(err),
                MuxEvent::Cancelled => {
                    info!(file = %path, saved = records.len(), "File interrupted by shutdown");
                    return Ok(FileResult::Cancelled);
                },
                MuxEvent::Drained => break,
            }
        }

        if let Some(err) = parse_error {
            warn!(file = %path, error = %err, "File rejected");
            self.store
                .save_file_outcome(&FileOutcome::failure(path, &err))
                .await?;
            stats.files_failed += 1;
            return Ok(FileResult::Finished);
        }

        self.store.save_file_outcome(&FileOutcome::success(path)).await?;
        self.reports.write(&records, &guids, path).await?;
        stats.files_succeeded += 1;

        info!(
            file = %path,
            records = records.len(),
            units = guids.len(),
            "File ingested"
        );
        Ok(FileResult::Finished)
    }
}

enum MuxEvent {
    Record(Record),
    Guid(String),
    Error(ParseError),
    Cancelled,
    Drained,
}

/// Fan-in over the three parse streams.
///
/// A stream is polled only while open; once it yields `None` it is marked
/// drained and never polled again.
struct StreamMux {
    streams: ParseStreams,
    records_open: bool,
    guids_open: bool,
    errors_open: bool,
}

impl StreamMux {
    fn new(streams: ParseStreams) -> Self {
        Self {
            streams,
            records_open: true,
            guids_open: true,
            errors_open: true,
        }
    }

    fn is_drained(&self) -> bool {
        !(self.records_open || self.guids_open || self.errors_open)
    }

    async fn next(&mut self, cancel: &CancellationToken) -> MuxEvent {
        loop {
            if self.is_drained() {
                return MuxEvent::Drained;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return MuxEvent::Cancelled,
                err = self.streams.errors.recv(), if self.errors_open => match err {
                    Some(err) => return MuxEvent::Error(err),
                    None => {
                        debug!("Error stream drained");
                        self.errors_open = false;
                    },
                },
                guid = self.streams.guids.recv(), if self.guids_open => match guid {
                    Some(guid) => return MuxEvent::Guid(guid),
                    None => self.guids_open = false,
                },
                record = self.streams.records.recv(), if self.records_open => match record {
                    Some(record) => return MuxEvent::Record(record),
                    None => self.records_open = false,
                },
            }
        }
    }
}
