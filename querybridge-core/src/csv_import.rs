//! Delimited text import
//!
//! The first row is the header; every later row becomes a map from header
//! name to cell text. Rows that fail to parse are logged and skipped, a
//! header failure aborts the import.

use std::collections::BTreeMap;
use std::io::Read;

use tracing::warn;

use crate::error::{CoreError, Result};

/// One imported row, keyed by header name.
pub type CsvRecord = BTreeMap<String, String>;

/// Read every row of `input` into header-keyed records.
pub fn import_csv<R: Read>(input: R) -> Result<Vec<CsvRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(input);

    let headers = reader
        .headers()
        .map_err(|source| CoreError::CsvHeader { source })?
        .clone();

    if headers.is_empty() {
        return Err(CoreError::Io {
            source: std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "missing header row"),
        });
    }

    let mut records = Vec::new();
    for (index, row) in reader.records().enumerate() {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                // Line 1 is the header
                warn!(line = index + 2, error = %e, "skipping unreadable CSV row");
                continue;
            }
        };

        let record: CsvRecord = headers
            .iter()
            .zip(row.iter())
            .map(|(header, value)| (header.to_owned(), value.to_owned()))
            .collect();
        records.push(record);
    }

    Ok(records)
}

/// Import `input` and serialize the records as a JSON array.
pub fn import_csv_json<R: Read>(input: R) -> Result<Vec<u8>> {
    let records = import_csv(input)?;
    serde_json::to_vec(&records).map_err(|e| CoreError::json("csv records", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_rows_three_columns() {
        let input = "a,b,c\n1,2,3\n4,5,6\n";
        let records = import_csv(input.as_bytes()).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["a"], "1");
        assert_eq!(records[0]["b"], "2");
        assert_eq!(records[0]["c"], "3");
        assert_eq!(records[1]["a"], "4");
        assert_eq!(records[1]["c"], "6");
    }

    #[test]
    fn serializes_to_json_array() {
        let json = import_csv_json("a,b\nx,y\n".as_bytes()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&json).unwrap();
        assert_eq!(value, serde_json::json!([{"a": "x", "b": "y"}]));
    }

    #[test]
    fn quoted_cells_keep_delimiters() {
        let input = "name,note\n\"Smith, Al\",\"said \"\"hi\"\"\"\n";
        let records = import_csv(input.as_bytes()).unwrap();
        assert_eq!(records[0]["name"], "Smith, Al");
        assert_eq!(records[0]["note"], "said \"hi\"");
    }

    #[test]
    fn skips_rows_with_wrong_field_count() {
        let input = "a,b\n1,2\n3\n5,6\n";
        let records = import_csv(input.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1]["a"], "5");
    }

    #[test]
    fn header_only_yields_empty_array() {
        let json = import_csv_json("a,b,c\n".as_bytes()).unwrap();
        assert_eq!(json, b"[]");
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(import_csv("".as_bytes()).is_err());
    }
}
