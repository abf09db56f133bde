/// CSV import against real files
///
/// Covers multi-byte text and CRLF line endings as they come out of
/// spreadsheet exports.

use querybridge_core::{import_csv, import_csv_json};
use std::fs::File;
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_import_from_file_with_utf8_cells() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "city,country\nZürich,Schweiz\nKraków,Polska 🇵🇱\n").unwrap();

    let records = import_csv(File::open(file.path()).unwrap()).unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["city"], "Zürich");
    assert_eq!(records[1]["country"], "Polska 🇵🇱");
}

#[test]
fn test_import_crlf_line_endings() {
    let input = "id,amount\r\n1,9.99\r\n2,15.00\r\n";
    let records = import_csv(input.as_bytes()).unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[1]["amount"], "15.00");
}

#[test]
fn test_json_output_is_keyed_by_header() {
    let json = import_csv_json("a,b,c\n1,2,3\n4,5,6\n".as_bytes()).unwrap();
    let value: serde_json::Value = serde_json::from_slice(&json).unwrap();

    assert_eq!(
        value,
        serde_json::json!([
            {"a": "1", "b": "2", "c": "3"},
            {"a": "4", "b": "5", "c": "6"}
        ])
    );
}
