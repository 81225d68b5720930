//! Polling directory watcher
//!
//! Lists the source directory (recursively) on a fixed interval and hands
//! every file it has not seen before to the worker, one path at a time.
//! Files recorded by earlier runs are seeded through [`Watcher::init_known`].

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use walkdir::WalkDir;

use super::error::IngestError;

/// Paths already handed off. Only grows.
#[derive(Debug, Default)]
struct DedupSet {
    seen: Mutex<HashSet<String>>,
}

impl DedupSet {
    /// Inserts `path` and reports whether it was new. Lookup and insert
    /// happen under one lock acquisition.
    fn insert_if_new(&self, path: &str) -> bool {
        let mut seen = self.seen.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if seen.contains(path) {
            return false;
        }
        seen.insert(path.to_string());
        true
    }

    fn contains(&self, path: &str) -> bool {
        self.seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(path)
    }

    fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }

    fn extend<I: IntoIterator<Item = String>>(&mut self, paths: I) {
        self.seen
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .extend(paths);
    }
}

/// Directory poller that owns the set of known files
#[derive(Debug)]
pub struct Watcher {
    source_dir: PathBuf,
    poll_interval: Duration,
    known: DedupSet,
}

impl Watcher {
    pub fn new(source_dir: impl Into<PathBuf>, poll_interval: Duration) -> Self {
        Self {
            source_dir: source_dir.into(),
            poll_interval: poll_interval.max(Duration::from_millis(1)),
            known: DedupSet::default(),
        }
    }

    /// Seed the known set with previously processed files.
    ///
    /// Takes `&mut self`, so it cannot overlap with a running scan.
    pub fn init_known<I, S>(&mut self, files: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known.extend(files.into_iter().map(Into::into));
        debug!(known = self.known.len(), "Watcher seeded with processed files");
    }

    /// Whether `path` has already been handed off (or seeded).
    pub fn is_known(&self, path: &str) -> bool {
        self.known.contains(path)
    }

    /// Poll until `cancel` fires, sending each new file path on `output`.
    ///
    /// A failed directory listing stops the loop for good and is returned as
    /// [`IngestError::Discovery`], after the files listed before the failure
    /// have been sent. Dropping the receiver also ends the loop.
    pub async fn scan(
        &self,
        cancel: CancellationToken,
        output: mpsc::Sender<String>,
    ) -> Result<(), IngestError> {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick resolves immediately; the first listing waits one interval.
        ticker.tick().await;

        info!(
            dir = %self.source_dir.display(),
            interval_ms = self.poll_interval.as_millis() as u64,
            "Watcher started"
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Watcher cancelled");
                    return Ok(());
                }
                _ = ticker.tick() => {}
            }

            let Listing { files, failure } = match self.list_files().await {
                Ok(listing) => listing,
                Err(e) => {
                    error!(error = %e, "Directory scan task failed, watcher stopping");
                    return Err(e);
                },
            };

            for path in files {
                if cancel.is_cancelled() {
                    return Ok(());
                }
                if !self.known.insert_if_new(&path) {
                    continue;
                }

                info!(file = %path, "Discovered new file");

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Ok(()),
                    sent = output.send(path) => {
                        if sent.is_err() {
                            debug!("Watcher output closed");
                            return Ok(());
                        }
                    }
                }
            }

            // Files reached before the failure have been handed off above.
            if let Some(e) = failure {
                error!(
                    dir = %self.source_dir.display(),
                    error = %e,
                    "Directory scan failed, watcher stopping"
                );
                return Err(e);
            }
        }
    }

    /// Run [`Watcher::scan`] on its own task.
    pub fn spawn(
        self,
        cancel: CancellationToken,
        output: mpsc::Sender<String>,
    ) -> JoinHandle<Result<(), IngestError>> {
        tokio::spawn(async move { self.scan(cancel, output).await })
    }

    async fn list_files(&self) -> Result<Listing, IngestError> {
        let root = self.source_dir.clone();
        Ok(tokio::task::spawn_blocking(move || collect_files(&root)).await?)
    }
}

/// One pass over the source tree.
struct Listing {
    files: Vec<String>,
    /// Set when the walk stopped early; `files` holds what came before.
    failure: Option<IngestError>,
}

/// Every non-directory entry under `root`, in file-name order per directory,
/// up to the first entry that cannot be read.
fn collect_files(root: &Path) -> Listing {
    let mut files = Vec::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(source) => {
                return Listing {
                    files,
                    failure: Some(IngestError::Discovery {
                        path: root.to_path_buf(),
                        source,
                    }),
                };
            },
        };

        if entry.file_type().is_dir() {
            continue;
        }
        files.push(entry.path().to_string_lossy().into_owned());
    }

    Listing {
        files,
        failure: None,
    }
}
