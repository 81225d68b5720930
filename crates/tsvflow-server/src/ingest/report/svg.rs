//! SVG report rendering

use std::path::PathBuf;

use async_trait::async_trait;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use tsvflow_common::types::Record;

use super::{report_lines, ReportLayout, ReportWriter};
use crate::ingest::error::IngestError;

/// Vertical space per text line.
pub const LINE_HEIGHT: usize = 30;

/// Extra vertical space per record block.
pub const BLOCK_SPACING: usize = 60;

const SVG_NAMESPACE: &str = "http://www.w3.org/2000/svg";
const DOCUMENT_WIDTH: &str = "800";
const MARGIN_X: &str = "10";
const FONT_SIZE: &str = "14";

/// Writes `<guid>.svg` files under the output directory
#[derive(Debug, Clone)]
pub struct SvgReportWriter {
    layout: ReportLayout,
}

impl SvgReportWriter {
    pub fn new(source_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            layout: ReportLayout::new(source_dir, output_dir),
        }
    }
}

#[async_trait]
impl ReportWriter for SvgReportWriter {
    async fn write(
        &self,
        records: &[Record],
        guids: &[String],
        source_path: &str,
    ) -> Result<(), IngestError> {
        self.layout
            .write_units(records, guids, source_path, "svg", render_svg)
            .await
    }
}

/// Render the SVG document for one unit.
///
/// Height is `lines * LINE_HEIGHT + records * BLOCK_SPACING`.
pub fn render_svg(records: &[&Record]) -> anyhow::Result<Vec<u8>> {
    let lines = report_lines(records);
    let height = (lines.len() * LINE_HEIGHT + records.len() * BLOCK_SPACING).to_string();

    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::Start(BytesStart::new("svg").with_attributes([
        ("xmlns", SVG_NAMESPACE),
        ("width", DOCUMENT_WIDTH),
        ("height", height.as_str()),
    ])))?;
    writer.write_event(Event::Empty(BytesStart::new("rect").with_attributes([
        ("width", "100%"),
        ("height", "100%"),
        ("fill", "white"),
    ])))?;

    for (i, line) in lines.iter().enumerate() {
        if line.is_empty() {
            continue;
        }
        let y = ((i + 1) * LINE_HEIGHT).to_string();
        writer
            .create_element("text")
            .with_attributes([
                ("x", MARGIN_X),
                ("y", y.as_str()),
                ("font-family", "monospace"),
                ("font-size", FONT_SIZE),
            ])
            .write_text_content(BytesText::new(line))?;
    }

    writer.write_event(Event::End(BytesEnd::new("svg")))?;

    let mut document = writer.into_inner();
    document.push(b'\n');
    Ok(document)
}
