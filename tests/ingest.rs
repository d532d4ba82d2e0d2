mod common;

use std::path::Path;

use report_intake::ingest::{self, FileKind};
use tempfile::tempdir;

use common::{fixture_path, write_file};

#[test]
fn csv_ingestion_sanitizes_headers_and_drops_blank_rows() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("upload.csv");
    write_file(
        &path,
        "Policy Id,Premium!\n1001,250.50\n,\n1002,300.00\n",
    );

    let (properties, table) =
        ingest::ingest(&path, FileKind::Delimited).expect("ingest csv");

    assert_eq!(table.column_names(), vec!["policy id", "premium"]);
    assert_eq!(table.row_count(), 2);
    assert_eq!(properties.delimiter, Some(b','));
    assert_eq!(properties.column_count, 2);
    assert_eq!(properties.rows_read, 2);
    assert_eq!(properties.blank_rows_dropped, 1);
    assert_eq!(
        table.column("policy id").unwrap().values,
        vec![Some("1001".to_string()), Some("1002".to_string())]
    );
}

#[test]
fn semicolon_delimiter_is_sniffed() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("upload.csv");
    write_file(&path, "id;amount;status\n1;10.5;open\n2;11.0;closed\n");

    let (properties, table) =
        ingest::ingest(&path, FileKind::Delimited).expect("ingest csv");
    assert_eq!(properties.delimiter, Some(b';'));
    assert_eq!(table.column_names(), vec!["id", "amount", "status"]);
    assert_eq!(table.row_count(), 2);
}

#[test]
fn tab_delimiter_is_sniffed() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("upload.csv");
    write_file(&path, "id\tamount\n1\t10.5\n");

    let (properties, _) = ingest::ingest(&path, FileKind::Delimited).expect("ingest csv");
    assert_eq!(properties.delimiter, Some(b'\t'));
}

#[test]
fn quoted_fields_keep_embedded_delimiters() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("upload.csv");
    write_file(&path, "id,note\n1,\"a, quoted, note\"\n2,plain\n");

    let (_, table) = ingest::ingest(&path, FileKind::Delimited).expect("ingest csv");
    assert_eq!(
        table.column("note").unwrap().values[0],
        Some("a, quoted, note".to_string())
    );
}

#[test]
fn empty_cells_become_none() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("upload.csv");
    write_file(&path, "id,note\n1,\n2,present\n");

    let (_, table) = ingest::ingest(&path, FileKind::Delimited).expect("ingest csv");
    assert_eq!(
        table.column("note").unwrap().values,
        vec![None, Some("present".to_string())]
    );
}

#[test]
fn utf8_bom_is_honored() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("upload.csv");
    let mut bytes = vec![0xEF, 0xBB, 0xBF];
    bytes.extend_from_slice(b"id,name\n1,Alice\n");
    std::fs::write(&path, bytes).expect("write bom csv");

    let (_, table) = ingest::ingest(&path, FileKind::Delimited).expect("ingest csv");
    // The BOM must not leak into the first header.
    assert_eq!(table.column_names(), vec!["id", "name"]);
}

#[test]
fn xlsx_first_worksheet_is_read_with_forced_headers() {
    let path = fixture_path("policy_upload.xlsx");

    let (properties, table) =
        ingest::ingest(&path, FileKind::Spreadsheet).expect("ingest xlsx");

    // First row becomes (sanitized) headers, blank row 3 is dropped, and
    // whole numeric cells come back as integer strings.
    assert_eq!(table.column_names(), vec!["policy id", "premium"]);
    assert_eq!(table.row_count(), 2);
    assert_eq!(properties.delimiter, None);
    assert_eq!(properties.rows_read, 2);
    assert_eq!(properties.blank_rows_dropped, 1);
    assert_eq!(
        table.column("policy id").unwrap().values,
        vec![Some("1001".to_string()), Some("1002".to_string())]
    );
    assert_eq!(
        table.column("premium").unwrap().values,
        vec![Some("250.5".to_string()), Some("300".to_string())]
    );
}

#[test]
fn missing_file_is_an_ingestion_error() {
    let err = ingest::ingest(Path::new("/nonexistent/upload.csv"), FileKind::Delimited)
        .expect_err("missing file must fail");
    assert!(format!("{err:#}").contains("Opening input file"));
}

#[test]
fn file_kind_rejects_unknown_extensions() {
    assert!(FileKind::from_path(Path::new("upload.txt")).is_err());
    assert!(FileKind::from_path(Path::new("upload")).is_err());
}
