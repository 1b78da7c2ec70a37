//! Row ingestion from CSV and JSON payloads.

use std::io::Read;
use std::path::Path;

use serde_json::Value;

use crate::types::InputRow;
use crate::{ChemSnapError, Result};

/// Read header-mapped rows from CSV data.
///
/// The first record is the header; each following record becomes an
/// [`InputRow`] keyed by column name. Empty input (headers only, or nothing)
/// is an input error — there is nothing to classify.
pub fn rows_from_csv<R: Read>(reader: R) -> Result<Vec<InputRow>> {
    let mut reader = csv::Reader::from_reader(reader);
    let headers = reader.headers()?.clone();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut row = InputRow::new();
        for (field, value) in headers.iter().zip(record.iter()) {
            row.insert(field, Value::String(value.to_string()));
        }
        rows.push(row);
    }
    if rows.is_empty() {
        return Err(ChemSnapError::InvalidInput("the CSV input is empty".into()));
    }
    Ok(rows)
}

/// Read header-mapped rows from a CSV file.
pub fn rows_from_csv_path(path: impl AsRef<Path>) -> Result<Vec<InputRow>> {
    let file = std::fs::File::open(path)?;
    rows_from_csv(file)
}

/// Convert a JSON array of objects into rows.
pub fn rows_from_json(value: Value) -> Result<Vec<InputRow>> {
    let Value::Array(items) = value else {
        return Err(ChemSnapError::InvalidInput(
            "a JSON array of row objects is required".into(),
        ));
    };
    if items.is_empty() {
        return Err(ChemSnapError::InvalidInput(
            "a non-empty list of rows is required".into(),
        ));
    }
    items
        .into_iter()
        .map(|item| match item {
            Value::Object(map) => Ok(InputRow::from(map)),
            other => Err(ChemSnapError::InvalidInput(format!(
                "each row must be a JSON object, got: {other}"
            ))),
        })
        .collect()
}
