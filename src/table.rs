use crate::error::Result;
use crate::types::Row;
use csv::ReaderBuilder;
use std::io::Read;
use std::path::Path;

/// Read every row of a delimited table, header included as row 0.
///
/// Rows must all have the same field count as the first one; a ragged table
/// is rejected as a CSV error.
pub fn load_rows(path: &Path) -> Result<Vec<Row>> {
    let file = std::fs::File::open(path)?;
    read_rows(file)
}

pub fn read_rows<R: Read>(reader: R) -> Result<Vec<Row>> {
    let mut reader = ReaderBuilder::new().has_headers(false).from_reader(reader);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}
