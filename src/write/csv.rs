//! The intermediate CSV: one `HdiRecord` per line under a fixed header.
//!
//! The CSV is UTF-8 and uses standard quoting, so road names and photo
//! paths containing commas survive the trip.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use crate::read::hdi::HdiRecord;

pub const HEADER: [&str; 7] = ["FILE_NAME", "FILE_PATH", "ROAD_NAME", "B", "L", "H", "HEADING"];

#[derive(Debug, thiserror::Error)]
pub enum CsvError {
    #[error("I/O error at {path:?}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("CSV error in {path:?}: {source}")]
    Csv { path: PathBuf, source: ::csv::Error },

    #[error("{path:?} has header {found:?}, expected {expected:?}", expected = HEADER)]
    UnexpectedHeader { path: PathBuf, found: Vec<String> },
}

/// A record read back from the CSV, with the line it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvRow {
    pub line: u64,
    pub record: HdiRecord,
}

/// Writes the header, then one line per record.
pub fn write_records<W: io::Write>(w: W, records: &[HdiRecord]) -> Result<(), ::csv::Error> {
    let mut writer = ::csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(w);

    writer.write_record(&HEADER)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes the CSV to `path`, replacing any existing file.
pub fn write_path(path: &Path, records: &[HdiRecord]) -> Result<(), CsvError> {
    let f = fs::File::create(path).map_err(|source| CsvError::Io { path: path.to_path_buf(), source })?;
    write_records(io::BufWriter::new(f), records).map_err(|source| CsvError::Csv { path: path.to_path_buf(), source })
}

/// Reads a CSV written by `write_path`.
///
/// Fails if the header is not exactly `HEADER`, or a line does not have
/// seven fields.
pub fn read_path(path: &Path) -> Result<Vec<CsvRow>, CsvError> {
    let csv_err = |source| CsvError::Csv { path: path.to_path_buf(), source };

    let mut reader = ::csv::Reader::from_path(path).map_err(csv_err)?;
    let headers = reader.headers().map_err(csv_err)?.clone();
    if headers.iter().collect::<Vec<_>>() != HEADER {
        return Err(CsvError::UnexpectedHeader {
            path: path.to_path_buf(),
            found: headers.iter().map(String::from).collect(),
        });
    }

    let mut rows = Vec::new();
    let mut raw = ::csv::StringRecord::new();
    while reader.read_record(&mut raw).map_err(csv_err)? {
        let record: HdiRecord = raw.deserialize(Some(&headers)).map_err(csv_err)?;
        rows.push(CsvRow {
            line: raw.position().map(|p| p.line()).unwrap_or(0),
            record: record,
        });
    }
    Ok(rows)
}
