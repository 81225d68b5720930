//! Configuration management
//!
//! Values are layered, later layers winning:
//! defaults, command-line flags, environment (`.env` included), JSON file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ============================================================================
// Server Configuration Constants
// ============================================================================

/// Default HTTP bind address.
pub const DEFAULT_SERVER_ADDR: &str = "localhost:8080";

/// Default shutdown timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Default database URL for local development.
pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/tsvflow";

/// Default maximum database connections in the pool.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 10;

/// Default minimum database connections in the pool.
pub const DEFAULT_DATABASE_MIN_CONNECTIONS: u32 = 2;

/// Default database connection timeout in seconds.
pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default database idle timeout in seconds (10 minutes).
pub const DEFAULT_DATABASE_IDLE_TIMEOUT_SECS: u64 = 600;

/// Default directory reports are written to.
pub const DEFAULT_REPORT_DIR: &str = "reports";

/// Default polling interval of the source directory, in seconds.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

/// Default CORS allowed origin for local development.
pub const DEFAULT_CORS_ALLOWED_ORIGIN: &str = "http://localhost:3000";

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub ingest: IngestConfig,
    pub cors: CorsConfig,
}

/// Server-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// `host:port` to bind
    pub addr: String,
    pub shutdown_timeout_secs: u64,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

/// Ingestion pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Directory watched for new files
    pub source_dir: PathBuf,
    /// Root of the report tree
    pub report_dir: PathBuf,
    pub poll_interval_secs: u64,
}

impl IngestConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
}

/// Values given on the command line. `None` means "not given".
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub addr: Option<String>,
    pub source_dir: Option<PathBuf>,
    pub report_dir: Option<PathBuf>,
    pub database_url: Option<String>,
    pub poll_interval_secs: Option<u64>,
    pub config_file: Option<PathBuf>,
}

/// Keys accepted in the JSON config file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    pub host: Option<String>,
    pub dir_from: Option<PathBuf>,
    pub dir_to: Option<PathBuf>,
    pub dsn: Option<String>,
    pub refresh_interval: Option<u64>,
}

impl FileConfig {
    pub fn read(path: &Path) -> tsvflow_common::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

impl Config {
    /// Load configuration from all layers and validate it
    pub fn load(overrides: &ConfigOverrides) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = Config::default();
        config.apply_overrides(overrides);
        config.apply_env(|key| std::env::var(key).ok());

        if let Some(path) = &overrides.config_file {
            match FileConfig::read(path) {
                Ok(file) => config.apply_file(file),
                Err(e) => tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Ignoring unreadable config file"
                ),
            }
        }

        config.validate()?;

        Ok(config)
    }

    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(addr) = &overrides.addr {
            self.server.addr = addr.clone();
        }
        if let Some(dir) = &overrides.source_dir {
            self.ingest.source_dir = dir.clone();
        }
        if let Some(dir) = &overrides.report_dir {
            self.ingest.report_dir = dir.clone();
        }
        if let Some(url) = &overrides.database_url {
            self.database.url = url.clone();
        }
        if let Some(secs) = overrides.poll_interval_secs {
            self.ingest.poll_interval_secs = secs;
        }
    }

    /// Apply environment variables looked up through `var`. Empty values
    /// are ignored, as are zero or unparsable numbers.
    pub fn apply_env<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str| var(key).filter(|v| !v.trim().is_empty());
        let number = |key: &str| text(key).and_then(|v| v.trim().parse::<u64>().ok()).filter(|n| *n > 0);

        if let Some(addr) = text("HOST") {
            self.server.addr = addr;
        }
        if let Some(secs) = number("SHUTDOWN_TIMEOUT") {
            self.server.shutdown_timeout_secs = secs;
        }
        if let Some(dir) = text("DIRECTORY_FROM") {
            self.ingest.source_dir = PathBuf::from(dir);
        }
        if let Some(dir) = text("DIRECTORY_TO") {
            self.ingest.report_dir = PathBuf::from(dir);
        }
        if let Some(secs) = number("REFRESH_INTERVAL") {
            self.ingest.poll_interval_secs = secs;
        }
        if let Some(url) = text("DATABASE_URL").or_else(|| text("DATABASE_DSN")) {
            self.database.url = url;
        }
        if let Some(n) = text("DATABASE_MAX_CONNECTIONS").and_then(|v| v.parse().ok()) {
            self.database.max_connections = n;
        }
        if let Some(n) = text("DATABASE_MIN_CONNECTIONS").and_then(|v| v.parse().ok()) {
            self.database.min_connections = n;
        }
        if let Some(secs) = number("DATABASE_CONNECT_TIMEOUT") {
            self.database.connect_timeout_secs = secs;
        }
        if let Some(secs) = number("DATABASE_IDLE_TIMEOUT") {
            self.database.idle_timeout_secs = secs;
        }
        if let Some(origins) = text("CORS_ALLOWED_ORIGINS") {
            self.cors.allowed_origins = origins.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Some(allow) = text("CORS_ALLOW_CREDENTIALS").and_then(|v| v.parse().ok()) {
            self.cors.allow_credentials = allow;
        }
    }

    pub fn apply_file(&mut self, file: FileConfig) {
        if let Some(host) = file.host {
            self.server.addr = host;
        }
        if let Some(dir) = file.dir_from {
            self.ingest.source_dir = dir;
        }
        if let Some(dir) = file.dir_to {
            self.ingest.report_dir = dir;
        }
        if let Some(dsn) = file.dsn {
            self.database.url = dsn;
        }
        if let Some(secs) = file.refresh_interval.filter(|s| *s > 0) {
            self.ingest.poll_interval_secs = secs;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.addr.trim().is_empty() {
            anyhow::bail!("Server address cannot be empty");
        }

        if self.ingest.source_dir.as_os_str().is_empty() {
            anyhow::bail!("Source directory must be set (-f, DIRECTORY_FROM or dir_from)");
        }

        if self.ingest.report_dir.as_os_str().is_empty() {
            anyhow::bail!("Report directory cannot be empty");
        }

        if self.ingest.poll_interval_secs == 0 {
            anyhow::bail!("Polling interval must be at least 1 second");
        }

        // Validate database URL
        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }

        // Validate connection pool settings
        if self.database.max_connections == 0 {
            anyhow::bail!("Database max_connections must be greater than 0");
        }

        if self.database.min_connections > self.database.max_connections {
            anyhow::bail!(
                "Database min_connections ({}) cannot be greater than max_connections ({})",
                self.database.min_connections,
                self.database.max_connections
            );
        }

        if self.cors.allowed_origins.is_empty() {
            tracing::warn!("No CORS origins configured - all origins will be allowed");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                addr: DEFAULT_SERVER_ADDR.to_string(),
                shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            },
            database: DatabaseConfig {
                url: DEFAULT_DATABASE_URL.to_string(),
                max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
                min_connections: DEFAULT_DATABASE_MIN_CONNECTIONS,
                connect_timeout_secs: DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
                idle_timeout_secs: DEFAULT_DATABASE_IDLE_TIMEOUT_SECS,
            },
            ingest: IngestConfig {
                source_dir: PathBuf::new(),
                report_dir: PathBuf::from(DEFAULT_REPORT_DIR),
                poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            },
            cors: CorsConfig {
                allowed_origins: vec![DEFAULT_CORS_ALLOWED_ORIGIN.to_string()],
                allow_credentials: true,
            },
        }
    }
}
