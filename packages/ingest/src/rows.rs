//! CSV decoding into raw row objects.
//!
//! Every row becomes a [`serde_json::Value`] object keyed by the trimmed
//! column headers from the first row, with every cell a trimmed string.
//! Cells missing from a short (ragged) row are omitted from the object
//! rather than inserted as empty strings, so the normalization layer can
//! distinguish "absent" from "present but empty".

use serde_json::Value;

use crate::IngestError;

/// Parses CSV bytes into one JSON object per data row.
///
/// # Errors
///
/// Returns [`IngestError::Parse`] if the file has no header row, or
/// [`IngestError::Csv`] if a record fails to decode.
pub fn parse_csv_rows(bytes: &[u8]) -> Result<Vec<Value>, IngestError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_owned())
        .collect();

    if headers.is_empty() || headers.iter().all(String::is_empty) {
        return Err(IngestError::Parse(
            "CSV file contains no header row".to_owned(),
        ));
    }

    let mut rows: Vec<Value> = Vec::new();

    for result in reader.records() {
        let record = result?;

        let mut map = serde_json::Map::new();
        for (i, header) in headers.iter().enumerate() {
            if let Some(cell) = record.get(i) {
                map.insert(header.clone(), Value::String(cell.trim().to_owned()));
            }
        }
        rows.push(Value::Object(map));
    }

    log::debug!("Parsed {} rows from {} bytes of CSV", rows.len(), bytes.len());
    Ok(rows)
}
