//! Streaming parser tests

mod common;

use common::{init_tracing, tsv_line, write_file, SHARED_GUID};
use tsvflow_server::ingest::{ParseError, TsvParser};

#[tokio::test]
async fn test_shared_unit_yields_one_guid() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(
        dir.path(),
        "a.tsv",
        &[
            tsv_line(1, SHARED_GUID, "Defrost"),
            tsv_line(2, SHARED_GUID, "Cooling"),
        ],
    );

    let parsed = TsvParser::new().parse(&path).collect().await;

    assert!(parsed.error.is_none(), "unexpected error: {:?}", parsed.error);
    assert_eq!(parsed.records.len(), 2);
    assert_eq!(parsed.guids, vec![SHARED_GUID.to_string()]);
    assert_eq!(parsed.records[0].message_text, "Defrost");
    assert_eq!(parsed.records[1].message_text, "Cooling");
}

#[tokio::test]
async fn test_unique_units_in_file_order() {
    let dir = tempfile::tempdir().unwrap();
    let guids: Vec<String> = (0..25).map(|i| format!("unit-guid-{i:04}")).collect();
    let lines: Vec<String> = guids
        .iter()
        .enumerate()
        .map(|(i, g)| tsv_line(i + 1, g, "text"))
        .collect();
    let path = write_file(dir.path(), "many.tsv", &lines);

    let parsed = TsvParser::new().parse(&path).collect().await;

    assert!(parsed.error.is_none());
    assert_eq!(parsed.guids, guids);
    let numbers: Vec<String> = parsed.records.iter().map(|r| r.number.clone()).collect();
    let expected: Vec<String> = (1..=25).map(|i| i.to_string()).collect();
    assert_eq!(numbers, expected);
}

#[tokio::test]
async fn test_first_appearance_order_with_repeats() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(
        dir.path(),
        "mixed.tsv",
        &[
            tsv_line(1, "bbbbbbbbbb", "x"),
            tsv_line(2, "aaaaaaaaaa", "x"),
            tsv_line(3, "bbbbbbbbbb", "x"),
            tsv_line(4, "cccccccccc", "x"),
        ],
    );

    let parsed = TsvParser::new().parse(&path).collect().await;

    assert_eq!(parsed.records.len(), 4);
    assert_eq!(parsed.guids, vec!["bbbbbbbbbb", "aaaaaaaaaa", "cccccccccc"]);
}

#[tokio::test]
async fn test_short_unit_guid_lines_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(
        dir.path(),
        "short.tsv",
        &[
            tsv_line(1, "  123456789  ", "too short"),
            tsv_line(2, SHARED_GUID, "kept"),
            tsv_line(3, "", "empty"),
        ],
    );

    let parsed = TsvParser::new().parse(&path).collect().await;

    assert!(parsed.error.is_none());
    assert_eq!(parsed.records.len(), 1);
    assert_eq!(parsed.records[0].message_text, "kept");
    assert_eq!(parsed.guids, vec![SHARED_GUID.to_string()]);
}

#[tokio::test]
async fn test_lines_with_missing_columns_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(
        dir.path(),
        "ragged.tsv",
        &[
            "1\tmqtt\tG-1\t0123456789\tmsg".to_string(),
            tsv_line(2, SHARED_GUID, "complete"),
        ],
    );

    let parsed = TsvParser::new().parse(&path).collect().await;

    assert!(parsed.error.is_none());
    assert_eq!(parsed.records.len(), 1);
    assert_eq!(parsed.records[0].number, "2");
}

#[tokio::test]
async fn test_fields_are_trimmed() {
    let dir = tempfile::tempdir().unwrap();
    let mut line = tsv_line(7, &format!("  {SHARED_GUID}  "), "  padded text ");
    line = line.replacen("7", " 7 ", 1);
    let path = write_file(dir.path(), "padded.tsv", &[line]);

    let parsed = TsvParser::new().parse(&path).collect().await;

    let record = &parsed.records[0];
    assert_eq!(record.number, "7");
    assert_eq!(record.unit_guid, SHARED_GUID);
    assert_eq!(record.message_text, "padded text");
    assert_eq!(parsed.guids, vec![SHARED_GUID.to_string()]);
}

#[tokio::test]
async fn test_quotes_are_plain_text() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(
        dir.path(),
        "quoted.tsv",
        &[
            tsv_line(1, SHARED_GUID, "\"Door open"),
            tsv_line(2, SHARED_GUID, "Door \"closed\""),
            tsv_line(3, SHARED_GUID, "Cooling"),
        ],
    );

    let parsed = TsvParser::new().parse(&path).collect().await;

    assert!(parsed.error.is_none(), "unexpected error: {:?}", parsed.error);
    assert_eq!(parsed.records.len(), 3);
    assert_eq!(parsed.records[0].message_text, "\"Door open");
    assert_eq!(parsed.records[1].message_text, "Door \"closed\"");
    assert_eq!(parsed.records[2].number, "3");
}

#[tokio::test]
async fn test_non_tsv_file_is_rejected_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "report.txt", &[tsv_line(1, SHARED_GUID, "ignored")]);

    let parsed = TsvParser::new().parse(&path).collect().await;

    assert!(parsed.records.is_empty());
    assert!(parsed.guids.is_empty());
    assert!(matches!(parsed.error, Some(ParseError::NotTabularFormat { .. })));
}

#[tokio::test]
async fn test_missing_file_reports_open_error() {
    let dir = tempfile::tempdir().unwrap();

    let parsed = TsvParser::new()
        .parse(dir.path().join("vanished.tsv"))
        .collect()
        .await;

    assert!(parsed.records.is_empty());
    assert!(matches!(parsed.error, Some(ParseError::Open { .. })));
}

#[tokio::test]
async fn test_invalid_utf8_reports_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("binary.tsv");
    let mut body = tsv_line(1, SHARED_GUID, "fine").into_bytes();
    body.extend_from_slice(b"\n2\t\xff\xfe\t");
    std::fs::write(&path, body).unwrap();

    let parsed = TsvParser::new().parse(&path).collect().await;

    assert_eq!(parsed.records.len(), 1);
    assert!(matches!(parsed.error, Some(ParseError::Read { .. })));
}

#[tokio::test]
async fn test_dropping_streams_stops_the_parse() {
    let dir = tempfile::tempdir().unwrap();
    let lines: Vec<String> = (0..500)
        .map(|i| tsv_line(i, &format!("unit-guid-{i:05}"), "text"))
        .collect();
    let path = write_file(dir.path(), "large.tsv", &lines);

    let mut streams = TsvParser::new().parse(&path);
    let first = streams.guids.recv().await;
    assert_eq!(first.as_deref(), Some("unit-guid-00000"));

    // Abandoning the parse must not hang or panic the blocking task.
    drop(streams);
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
}
