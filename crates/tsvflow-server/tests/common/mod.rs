//! Shared helpers for tsvflow server integration tests
//!
//! - in-memory [`RecordStore`] and recording [`ReportWriter`] doubles
//! - TSV fixture writers
//! - a PostgreSQL testcontainer with migrations applied

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use testcontainers::{core::IntoContainerPort, runners::AsyncRunner, ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tokio_util::sync::CancellationToken;
use tsvflow_common::types::{FileOutcome, Record, RECORD_COLUMNS};
use tsvflow_server::ingest::{IngestError, RecordStore, ReportWriter, StoreError};

pub const SHARED_GUID: &str = "01749246-9617-585e-9e19-157ccad61ee2";

pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tsvflow_server=debug")),
        )
        .with_test_writer()
        .try_init();
}

// ============================================================================
// Fixtures
// ============================================================================

/// One tab-separated line with the given sequence number, unit and text.
pub fn tsv_line(number: usize, unit_guid: &str, text: &str) -> String {
    let mut fields = vec![String::new(); RECORD_COLUMNS];
    fields[0] = number.to_string();
    fields[1] = "mqtt".to_string();
    fields[2] = format!("G-{number:06}");
    fields[3] = unit_guid.to_string();
    fields[4] = format!("msg_{number}");
    fields[5] = text.to_string();
    fields[7] = "waiting".to_string();
    fields[8] = "100".to_string();
    fields[9] = "LOCAL".to_string();
    fields.join("\t")
}

/// Write `lines` to `dir/name`, creating parent directories.
pub fn write_file(dir: &Path, name: &str, lines: &[String]) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let mut body = lines.join("\n");
    body.push('\n');
    std::fs::write(&path, body).unwrap();
    path
}

/// Poll `check` every 10ms until it holds or `timeout` elapses.
pub async fn wait_until<F: Fn() -> bool>(timeout: Duration, check: F) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

// ============================================================================
// In-memory store
// ============================================================================

#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<Record>>,
    outcomes: Mutex<Vec<FileOutcome>>,
    processed: Vec<String>,
    fail_saves: bool,
    /// Fires the token once this many records have been saved.
    cancel_after: Option<(usize, CancellationToken)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_processed(files: Vec<String>) -> Self {
        Self {
            processed: files,
            ..Self::default()
        }
    }

    pub fn with_records(records: Vec<Record>) -> Self {
        Self {
            records: Mutex::new(records),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_saves: true,
            ..Self::default()
        }
    }

    pub fn cancelling_after(count: usize, token: CancellationToken) -> Self {
        Self {
            cancel_after: Some((count, token)),
            ..Self::default()
        }
    }

    pub fn records(&self) -> Vec<Record> {
        self.records.lock().unwrap().clone()
    }

    pub fn outcomes(&self) -> Vec<FileOutcome> {
        self.outcomes.lock().unwrap().clone()
    }

    pub fn outcome_for(&self, file: &Path) -> Option<FileOutcome> {
        let file = file.to_string_lossy();
        self.outcomes().into_iter().find(|o| o.file == file)
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn processed_files(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.processed.clone())
    }

    async fn save_record(&self, record: &Record) -> Result<(), StoreError> {
        if self.fail_saves {
            return Err(StoreError::Database(sqlx::Error::PoolClosed));
        }
        let saved = {
            let mut records = self.records.lock().unwrap();
            records.push(record.clone());
            records.len()
        };
        if let Some((count, token)) = &self.cancel_after {
            if saved >= *count {
                token.cancel();
            }
        }
        Ok(())
    }

    async fn save_file_outcome(&self, outcome: &FileOutcome) -> Result<(), StoreError> {
        let mut outcomes = self.outcomes.lock().unwrap();
        if !outcomes.iter().any(|o| o.file == outcome.file) {
            outcomes.push(outcome.clone());
        }
        Ok(())
    }

    async fn records_by_unit(&self, unit_guid: &str) -> Result<Vec<Record>, StoreError> {
        if self.fail_saves {
            return Err(StoreError::Database(sqlx::Error::PoolClosed));
        }
        Ok(self
            .records()
            .into_iter()
            .filter(|r| r.unit_guid == unit_guid)
            .collect())
    }
}

// ============================================================================
// Recording report writer
// ============================================================================

#[derive(Debug, Clone)]
pub struct ReportCall {
    pub records: Vec<Record>,
    pub guids: Vec<String>,
    pub source_path: String,
}

#[derive(Default)]
pub struct RecordingReportWriter {
    calls: Mutex<Vec<ReportCall>>,
    fail: bool,
}

impl RecordingReportWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<ReportCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReportWriter for RecordingReportWriter {
    async fn write(
        &self,
        records: &[Record],
        guids: &[String],
        source_path: &str,
    ) -> Result<(), IngestError> {
        self.calls.lock().unwrap().push(ReportCall {
            records: records.to_vec(),
            guids: guids.to_vec(),
            source_path: source_path.to_string(),
        });
        if self.fail {
            return Err(IngestError::Report {
                path: PathBuf::from(source_path),
                message: "disk full".to_string(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// PostgreSQL Test Container
// ============================================================================

/// PostgreSQL container with migrations applied
pub struct TestPostgres {
    _container: ContainerAsync<Postgres>,
    pool: PgPool,
}

impl TestPostgres {
    pub async fn start() -> Result<Self> {
        let container = Postgres::default()
            .with_tag("16-alpine")
            .start()
            .await
            .context("Failed to start PostgreSQL container")?;

        let host = container
            .get_host()
            .await
            .context("Failed to get container host")?;
        let port = container
            .get_host_port_ipv4(5432.tcp())
            .await
            .context("Failed to get container port")?;

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&format!("postgresql://postgres:postgres@{host}:{port}/postgres"))
            .await
            .context("Failed to connect to PostgreSQL")?;

        sqlx::migrate!("../../migrations")
            .run(&pool)
            .await
            .context("Failed to run migrations")?;

        Ok(Self {
            _container: container,
            pool,
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
