//! Streaming TSV parser
//!
//! [`TsvParser::parse`] returns three bounded streams for one file: accepted
//! records, the distinct unit identifiers in first-seen order, and at most one
//! terminal error. The file is read on the blocking pool and every send waits
//! for the consumer, so a slow consumer throttles the read.

use std::collections::HashSet;
use std::fs::File;
use std::path::Path;

use tokio::sync::mpsc;
use tracing::{debug, trace};
use tsvflow_common::types::{is_valid_unit_guid, Record, RECORD_COLUMNS, UNIT_GUID_COLUMN};

use super::error::ParseError;

/// File extension accepted by the parser.
pub const TSV_EXTENSION: &str = "tsv";

/// Lines with fewer columns are skipped.
pub const MIN_COLUMNS: usize = RECORD_COLUMNS;

/// Capacity of each output stream.
const STREAM_CAPACITY: usize = 1;

/// Receiving ends of one parse.
///
/// Every stream closes when the parse ends, whether it finished, failed or
/// was abandoned. Dropping the receivers stops the parse at its next send.
#[derive(Debug)]
pub struct ParseStreams {
    pub records: mpsc::Receiver<Record>,
    pub guids: mpsc::Receiver<String>,
    pub errors: mpsc::Receiver<ParseError>,
}

/// Everything one parse produced, collected in memory.
#[derive(Debug, Default)]
pub struct ParsedFile {
    pub records: Vec<Record>,
    pub guids: Vec<String>,
    pub error: Option<ParseError>,
}

impl ParseStreams {
    /// Drain all three streams until they close.
    pub async fn collect(mut self) -> ParsedFile {
        let mut parsed = ParsedFile::default();
        let (mut records_open, mut guids_open, mut errors_open) = (true, true, true);

        while records_open || guids_open || errors_open {
            tokio::select! {
                record = self.records.recv(), if records_open => match record {
                    Some(record) => parsed.records.push(record),
                    None => records_open = false,
                },
                guid = self.guids.recv(), if guids_open => match guid {
                    Some(guid) => parsed.guids.push(guid),
                    None => guids_open = false,
                },
                err = self.errors.recv(), if errors_open => match err {
                    Some(err) => parsed.error = Some(err),
                    None => errors_open = false,
                },
            }
        }

        parsed
    }
}

/// Stateless parser for tab-separated record files
#[derive(Debug, Clone, Copy, Default)]
pub struct TsvParser;

impl TsvParser {
    pub fn new() -> Self {
        Self
    }

    /// Start parsing `path`. Must be called from within a tokio runtime.
    ///
    /// A path without the `.tsv` extension yields a single
    /// [`ParseError::NotTabularFormat`] and is never opened.
    pub fn parse(&self, path: impl AsRef<Path>) -> ParseStreams {
        let path = path.as_ref().to_path_buf();
        let (record_tx, records) = mpsc::channel(STREAM_CAPACITY);
        let (guid_tx, guids) = mpsc::channel(STREAM_CAPACITY);
        let (error_tx, errors) = mpsc::channel(STREAM_CAPACITY);

        if !has_tsv_extension(&path) {
            debug!(file = %path.display(), "Rejecting non-tsv file");
            // Fresh channel, so the single slot is free.
            let _ = error_tx.try_send(ParseError::NotTabularFormat { path });
            return ParseStreams {
                records,
                guids,
                errors,
            };
        }

        tokio::task::spawn_blocking(move || {
            let sinks = Sinks {
                records: record_tx,
                guids: guid_tx,
            };
            if let Err(err) = read_file(&path, &sinks) {
                let _ = error_tx.blocking_send(err);
            }
        });

        ParseStreams {
            records,
            guids,
            errors,
        }
    }
}

fn has_tsv_extension(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()) == Some(TSV_EXTENSION)
}

struct Sinks {
    records: mpsc::Sender<Record>,
    guids: mpsc::Sender<String>,
}

/// Consumer went away.
struct Abandoned;

/// Read `path` line by line, pushing accepted records into `sinks`.
///
/// Returns `Ok(())` both on a clean end of file and when the consumer stops
/// listening.
fn read_file(path: &Path, sinks: &Sinks) -> Result<(), ParseError> {
    let file = File::open(path).map_err(|source| ParseError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_reader(file);

    let mut seen: HashSet<String> = HashSet::new();
    let mut row = csv::StringRecord::new();
    let mut accepted = 0usize;

    loop {
        let more = reader.read_record(&mut row).map_err(|e| read_error(path, &e))?;
        if !more {
            break;
        }

        let Some(record) = accept(&row) else {
            trace!(
                file = %path.display(),
                line = row.position().map(|p| p.line()).unwrap_or_default(),
                "Skipping line"
            );
            continue;
        };

        if emit(record, &mut seen, sinks).is_err() {
            debug!(file = %path.display(), "Parse abandoned by consumer");
            return Ok(());
        }
        accepted += 1;
    }

    debug!(file = %path.display(), records = accepted, units = seen.len(), "Parse finished");
    Ok(())
}

/// A line becomes a record when it has every column and a long enough unit
/// identifier.
fn accept(row: &csv::StringRecord) -> Option<Record> {
    if row.len() < MIN_COLUMNS {
        return None;
    }
    if !is_valid_unit_guid(row.get(UNIT_GUID_COLUMN).unwrap_or_default()) {
        return None;
    }
    let fields: Vec<&str> = row.iter().collect();
    Record::from_fields(&fields).ok()
}

/// Send a new unit identifier before the record that introduced it.
fn emit(record: Record, seen: &mut HashSet<String>, sinks: &Sinks) -> Result<(), Abandoned> {
    if !seen.contains(&record.unit_guid) {
        seen.insert(record.unit_guid.clone());
        sinks
            .guids
            .blocking_send(record.unit_guid.clone())
            .map_err(|_| Abandoned)?;
    }
    sinks.records.blocking_send(record).map_err(|_| Abandoned)
}

fn read_error(path: &Path, err: &csv::Error) -> ParseError {
    ParseError::Read {
        path: path.to_path_buf(),
        line: err.position().map(|p| p.line()).unwrap_or_default(),
        message: err.to_string(),
    }
}
