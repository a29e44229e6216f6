//! HDI → CSV → Shapefile, end to end.
//!
//! 1. Every ".hdi" under the input directory is extracted (`read::hdi`).
//! 2. The records go to `<input_dir>/<output_name>.csv`.
//! 3. That CSV is read back and written as a WGS84 point layer,
//!    `<input_dir>/<output_name>.shp`, replacing any previous one.
//!
//! # Example
//!
//! ```no_run
//! use std::path::PathBuf;
//! use hdishp::{run_hdi_processing, HdiOptions};
//!
//! let options = HdiOptions {
//!     input_dir: PathBuf::from("surveys"),
//!     base_path: PathBuf::from(r"E:\Code"),
//!     output_name: "merged_hdi_data".to_string(),
//!     hdi_encoding: encoding::all::UTF_8,
//!     dbf_encoding: encoding::all::UTF_8,
//! };
//! let summary = run_hdi_processing(&options).unwrap();
//! println!("{} points in {}", summary.n_points, summary.shp_path.display());
//! ```

use std::path::{Path, PathBuf};
use encoding::EncodingRef;
use shapefile_rs::dbase::FieldValue;
use shapefile_rs::dbase::Record;
use shapefile_rs::{Point, Shape};
use tracing::info;
use crate::read::hdi::{self, HdiError, HdiWarning};
use crate::read::shapefile::{Crs, ShapefileError};
use crate::write::csv::{self, CsvError, CsvRow};
use crate::write::shapefile::{hdi_schema, ShapefileWriter};

#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error(transparent)]
    Hdi(#[from] HdiError),

    #[error(transparent)]
    Csv(#[from] CsvError),

    #[error(transparent)]
    Shapefile(#[from] ShapefileError),

    #[error("{path:?} line {line}: {column} is {value:?}, which is not a number")]
    InvalidNumber { path: PathBuf, line: u64, column: &'static str, value: String },
}

/// Everything one run needs.
#[derive(Clone)]
pub struct HdiOptions {
    pub input_dir: PathBuf,
    pub base_path: PathBuf,
    pub output_name: String,
    pub hdi_encoding: EncodingRef,
    pub dbf_encoding: EncodingRef,
}

#[derive(Debug)]
pub struct ConvertSummary {
    pub csv_path: PathBuf,
    pub shp_path: PathBuf,
    pub n_files: usize,
    pub n_points: usize,
    pub warnings: Vec<HdiWarning>,
}

fn parse_number(csv_path: &Path, row: &CsvRow, column: &'static str, value: &str) -> Result<f64, ConvertError> {
    value.trim().parse::<f64>().map_err(|_| ConvertError::InvalidNumber {
        path: csv_path.to_path_buf(),
        line: row.line,
        column: column,
        value: value.to_string(),
    })
}

/// Turns one CSV row into a point at (L, B) and its attributes.
pub fn hdi_feature(csv_path: &Path, row: &CsvRow) -> Result<(Shape, Record), ConvertError> {
    let r = &row.record;
    let b = parse_number(csv_path, row, "B", &r.b)?;
    let l = parse_number(csv_path, row, "L", &r.l)?;
    let h = parse_number(csv_path, row, "H", &r.h)?;
    let heading = parse_number(csv_path, row, "HEADING", &r.heading)?;

    let mut record = Record::default();
    record.insert("FILE_NAME".to_string(), FieldValue::Character(Some(r.photo_name.clone())));
    record.insert("FILE_PATH".to_string(), FieldValue::Character(Some(r.photo_path.clone())));
    record.insert("ROAD_NAME".to_string(), FieldValue::Character(Some(r.road_name.clone())));
    record.insert("B".to_string(), FieldValue::Numeric(Some(b)));
    record.insert("L".to_string(), FieldValue::Numeric(Some(l)));
    record.insert("H".to_string(), FieldValue::Numeric(Some(h)));
    record.insert("HEADING".to_string(), FieldValue::Numeric(Some(heading)));

    Ok((Shape::Point(Point::new(l, b)), record))
}

/// Converts a CSV written by `write::csv` into a WGS84 point layer.
///
/// The Shapefile at `shp_path`, if any, is replaced. Returns the number of
/// points written.
pub fn convert_csv_to_shp(csv_path: &Path, shp_path: &Path, dbf_encoding: EncodingRef) -> Result<usize, ConvertError> {
    let rows = csv::read_path(csv_path)?;

    // Parse everything first: a bad number should not leave half a layer.
    let features = rows.iter()
        .map(|row| hdi_feature(csv_path, row))
        .collect::<Result<Vec<_>, _>>()?;

    let mut writer = ShapefileWriter::create(shp_path, &hdi_schema(), Some(&Crs::wgs84()), dbf_encoding)?;
    for (shape, record) in features.iter() {
        writer.write_feature(shape, record)?;
    }
    let n_points = writer.finish();

    info!(shp_path = %shp_path.display(), n_points = n_points, "shapefile created");
    Ok(n_points)
}

/// Runs the whole pipeline. Warnings from the extraction are logged as they
/// happen and also returned in the summary.
pub fn run_hdi_processing(options: &HdiOptions) -> Result<ConvertSummary, ConvertError> {
    let extraction = hdi::extract_dir(&options.input_dir, &options.base_path, options.hdi_encoding)?;

    let csv_path = options.input_dir.join(format!("{}.csv", options.output_name));
    csv::write_path(&csv_path, &extraction.records)?;
    info!(csv_path = %csv_path.display(), n_records = extraction.records.len(), "merged hdi records into csv");

    let shp_path = options.input_dir.join(format!("{}.shp", options.output_name));
    let n_points = convert_csv_to_shp(&csv_path, &shp_path, options.dbf_encoding)?;

    Ok(ConvertSummary {
        csv_path: csv_path,
        shp_path: shp_path,
        n_files: extraction.n_files,
        n_points: n_points,
        warnings: extraction.warnings,
    })
}
