//! Per-unit reports
//!
//! After a file is ingested, one document per format is written for every
//! unit identifier it contained. The output tree mirrors the source tree:
//! `<source_dir>/a/b/file.tsv` produces `<output_dir>/a/b/<guid>.svg` and
//! `<output_dir>/a/b/<guid>.pdf`.

mod pdf;
mod svg;

pub use pdf::{render_pdf, PdfReportWriter};
pub use svg::{render_svg, SvgReportWriter};

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};
use tsvflow_common::types::Record;

use super::error::IngestError;

/// Renders reports for a successfully ingested file
#[async_trait]
pub trait ReportWriter: Send + Sync {
    /// Write one report per entry of `guids`, covering the records of that
    /// unit. `source_path` is the path of the ingested file.
    async fn write(
        &self,
        records: &[Record],
        guids: &[String],
        source_path: &str,
    ) -> Result<(), IngestError>;
}

/// Maps ingested files to report locations
#[derive(Debug, Clone)]
pub struct ReportLayout {
    source_dir: PathBuf,
    output_dir: PathBuf,
}

impl ReportLayout {
    pub fn new(source_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            output_dir: output_dir.into(),
        }
    }

    /// Directory a report for `source_path` lands in.
    pub fn target_dir(&self, source_path: &Path) -> PathBuf {
        let relative = match source_path.strip_prefix(&self.source_dir) {
            Ok(relative) => relative.parent().map(Path::to_path_buf).unwrap_or_default(),
            Err(_) => {
                warn!(
                    file = %source_path.display(),
                    source_dir = %self.source_dir.display(),
                    "File is outside the source directory, writing report at top level"
                );
                PathBuf::new()
            },
        };
        self.output_dir.join(relative)
    }

    /// Render and write `<guid>.<extension>` for every unit in `guids`.
    pub(crate) async fn write_units<F>(
        &self,
        records: &[Record],
        guids: &[String],
        source_path: &str,
        extension: &str,
        render: F,
    ) -> Result<(), IngestError>
    where
        F: Fn(&[&Record]) -> anyhow::Result<Vec<u8>> + Sync,
    {
        let dir = self.target_dir(Path::new(source_path));
        let fail = |message: String| IngestError::Report {
            path: PathBuf::from(source_path),
            message,
        };

        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| fail(format!("failed to create {}: {e}", dir.display())))?;

        for guid in guids {
            if !is_safe_file_stem(guid) {
                return Err(fail(format!("unit identifier {guid:?} is not a valid file name")));
            }

            let unit_records: Vec<&Record> =
                records.iter().filter(|r| &r.unit_guid == guid).collect();
            let target = dir.join(format!("{guid}.{extension}"));

            let document = render(&unit_records)
                .map_err(|e| fail(format!("failed to render {}: {e:#}", target.display())))?;
            tokio::fs::write(&target, document)
                .await
                .map_err(|e| fail(format!("failed to write {}: {e}", target.display())))?;

            debug!(
                unit_guid = %guid,
                records = unit_records.len(),
                report = %target.display(),
                "Report written"
            );
        }

        Ok(())
    }
}

/// Runs several writers in order, stopping at the first failure
#[derive(Clone, Default)]
pub struct ReportSet {
    writers: Vec<Arc<dyn ReportWriter>>,
}

impl ReportSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, writer: impl ReportWriter + 'static) -> Self {
        self.writers.push(Arc::new(writer));
        self
    }

    pub fn len(&self) -> usize {
        self.writers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writers.is_empty()
    }
}

#[async_trait]
impl ReportWriter for ReportSet {
    async fn write(
        &self,
        records: &[Record],
        guids: &[String],
        source_path: &str,
    ) -> Result<(), IngestError> {
        for writer in &self.writers {
            writer.write(records, guids, source_path).await?;
        }
        Ok(())
    }
}

/// A guid must be usable as a single path component.
fn is_safe_file_stem(guid: &str) -> bool {
    let mut components = Path::new(guid).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !guid.contains(['/', '\\'])
}

/// `label: value` lines for every record, with a blank line between records.
pub fn report_lines(records: &[&Record]) -> Vec<String> {
    let mut lines = Vec::with_capacity(records.len() * 16);
    for (i, record) in records.iter().enumerate() {
        if i != 0 {
            lines.push(String::new());
        }
        lines.extend(
            record
                .labeled_fields()
                .iter()
                .map(|(label, value)| format!("{label}: {value}")),
        );
    }
    lines
}
