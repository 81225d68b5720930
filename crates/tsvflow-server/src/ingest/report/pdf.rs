//! PDF report rendering, one A4 page per record

use std::path::PathBuf;

use async_trait::async_trait;
use printpdf::{BuiltinFont, Mm, PdfDocument};
use tsvflow_common::types::Record;

use super::{report_lines, ReportLayout, ReportWriter};
use crate::ingest::error::IngestError;

const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_MM: f32 = 15.0;
const LINE_SPACING_MM: f32 = 8.0;
const FONT_SIZE_PT: f32 = 11.0;
const LAYER_NAME: &str = "report";

/// Writes `<guid>.pdf` files under the output directory
#[derive(Debug, Clone)]
pub struct PdfReportWriter {
    layout: ReportLayout,
}

impl PdfReportWriter {
    pub fn new(source_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            layout: ReportLayout::new(source_dir, output_dir),
        }
    }
}

#[async_trait]
impl ReportWriter for PdfReportWriter {
    async fn write(
        &self,
        records: &[Record],
        guids: &[String],
        source_path: &str,
    ) -> Result<(), IngestError> {
        self.layout
            .write_units(records, guids, source_path, "pdf", render_pdf)
            .await
    }
}

/// Render the PDF document for one unit.
pub fn render_pdf(records: &[&Record]) -> anyhow::Result<Vec<u8>> {
    let title = records
        .first()
        .map(|r| r.unit_guid.as_str())
        .unwrap_or("report");
    let (doc, first_page, first_layer) = PdfDocument::new(
        title,
        Mm(PAGE_WIDTH_MM),
        Mm(PAGE_HEIGHT_MM),
        LAYER_NAME,
    );
    let font = doc
        .add_builtin_font(BuiltinFont::Courier)
        .map_err(|e| anyhow::anyhow!("failed to load font: {e}"))?;

    let mut page = (first_page, first_layer);
    for (i, record) in records.iter().enumerate() {
        if i != 0 {
            page = doc.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), LAYER_NAME);
        }
        let layer = doc.get_page(page.0).get_layer(page.1);

        let mut y = PAGE_HEIGHT_MM - MARGIN_MM;
        for line in report_lines(std::slice::from_ref(record)) {
            layer.use_text(line, FONT_SIZE_PT, Mm(MARGIN_MM), Mm(y), &font);
            y -= LINE_SPACING_MM;
        }
    }

    doc.save_to_bytes()
        .map_err(|e| anyhow::anyhow!("failed to encode pdf: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::report::tests::record;

    fn page_count(bytes: &[u8]) -> usize {
        lopdf::Document::load_mem(bytes).unwrap().get_pages().len()
    }

    #[test]
    fn test_one_page_per_record() {
        let a = record("0123456789", "first");
        let b = record("0123456789", "second");
        let c = record("0123456789", "third");

        let bytes = render_pdf(&[&a, &b, &c]).unwrap();

        assert!(bytes.starts_with(b"%PDF"));
        assert_eq!(page_count(&bytes), 3);
    }

    #[tokio::test]
    async fn test_write_creates_one_file_per_guid() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("in");
        let output = tmp.path().join("out");
        let writer = PdfReportWriter::new(&source, &output);

        let records = vec![
            record("aaaaaaaaaa-1", "one"),
            record("bbbbbbbbbb-2", "two"),
            record("aaaaaaaaaa-1", "three"),
        ];
        let guids = vec!["aaaaaaaaaa-1".to_string(), "bbbbbbbbbb-2".to_string()];
        let path = source.join("sub").join("batch.tsv");

        writer
            .write(&records, &guids, &path.to_string_lossy())
            .await
            .unwrap();

        let first = std::fs::read(output.join("sub").join("aaaaaaaaaa-1.pdf")).unwrap();
        let second = std::fs::read(output.join("sub").join("bbbbbbbbbb-2.pdf")).unwrap();
        assert_eq!(page_count(&first), 2);
        assert_eq!(page_count(&second), 1);
    }
}
