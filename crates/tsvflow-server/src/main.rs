//! tsvflow server - main entry point

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tsvflow_common::logging::{init_logging, LogConfig};

use tsvflow_server::{
    api::{self, AppState},
    config::{Config, ConfigOverrides},
    ingest::{
        IngestWorker, PdfReportWriter, PgRecordStore, ReportSet, SvgReportWriter, TsvParser,
        Watcher,
    },
};

/// Ingest TSV record files into PostgreSQL and serve them over HTTP
#[derive(Debug, Parser)]
#[command(name = "tsvflow-server", version, about)]
struct Cli {
    /// HTTP bind address (host:port)
    #[arg(short = 'a', long = "host")]
    host: Option<String>,

    /// Directory watched for incoming files
    #[arg(short = 'f', long = "dir-from")]
    dir_from: Option<PathBuf>,

    /// Directory reports are written to
    #[arg(short = 't', long = "dir-to")]
    dir_to: Option<PathBuf>,

    /// PostgreSQL connection string
    #[arg(short = 'd', long = "database-url")]
    database_url: Option<String>,

    /// Seconds between directory scans
    #[arg(short = 'r', long = "refresh-interval")]
    refresh_interval: Option<u64>,

    /// JSON config file; its values win over flags and environment
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,
}

impl From<Cli> for ConfigOverrides {
    fn from(cli: Cli) -> Self {
        Self {
            addr: cli.host,
            source_dir: cli.dir_from,
            report_dir: cli.dir_to,
            database_url: cli.database_url,
            poll_interval_secs: cli.refresh_interval,
            config_file: cli.config,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = LogConfig::builder()
        .log_file_prefix("tsvflow-server")
        .filter_directives("tsvflow_server=debug,tower_http=debug,sqlx=warn")
        .build();

    // Environment variables take precedence
    let log_config = log_config.merge_env()?;
    init_logging(&log_config)?;

    info!("Starting tsvflow server");

    let config = Config::load(&cli.into())?;
    info!(
        addr = %config.server.addr,
        source_dir = %config.ingest.source_dir.display(),
        report_dir = %config.ingest.report_dir.display(),
        poll_secs = config.ingest.poll_interval_secs,
        "Configuration loaded"
    );

    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(config.database.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.database.idle_timeout_secs))
        .connect(&config.database.url)
        .await
        .context("Failed to connect to the database")?;

    info!("Database connection pool established");

    let store = Arc::new(PgRecordStore::new(db_pool.clone()));
    store.migrate().await.context("Failed to run migrations")?;

    info!("Database migrations completed");

    // Cancelled on shutdown signal or when the worker stops on its own.
    let cancel = CancellationToken::new();

    let worker = IngestWorker::new(
        store.clone(),
        Arc::new(
            ReportSet::new()
                .with(SvgReportWriter::new(
                    &config.ingest.source_dir,
                    &config.ingest.report_dir,
                ))
                .with(PdfReportWriter::new(
                    &config.ingest.source_dir,
                    &config.ingest.report_dir,
                )),
        ),
        Watcher::new(&config.ingest.source_dir, config.ingest.poll_interval()),
        TsvParser::new(),
    );

    let worker_cancel = cancel.clone();
    let worker_handle = tokio::spawn(async move {
        let result = worker.run(worker_cancel.clone()).await;
        worker_cancel.cancel();
        result
    });

    let app = api::create_router(AppState { store }, &config.cors);

    let server_cancel = cancel.clone();
    api::serve(&config.server.addr, app, async move {
        tokio::select! {
            _ = shutdown_signal() => {},
            _ = server_cancel.cancelled() => {
                warn!("Ingest worker stopped, shutting down HTTP server");
            },
        }
        server_cancel.cancel();
    })
    .await?;

    cancel.cancel();

    let timeout = Duration::from_secs(config.server.shutdown_timeout_secs);
    let outcome = tokio::time::timeout(timeout, worker_handle).await;

    db_pool.close().await;

    match outcome {
        Ok(joined) => {
            let stats = joined.context("Ingest worker panicked")??;
            info!(
                succeeded = stats.files_succeeded,
                failed = stats.files_failed,
                records = stats.records_saved,
                "Server shut down gracefully"
            );
            Ok(())
        },
        Err(_) => {
            error!("Ingest worker did not stop within {} seconds", timeout.as_secs());
            anyhow::bail!("shutdown timed out")
        },
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }
}
