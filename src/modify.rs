//! Sets one attribute, "data", on every feature of a Shapefile.
//!
//! The column is found ignoring case. When there is none, it is added as a
//! date column if the value is an ISO date (`2024-01-01`) and as a
//! character column otherwise.
//!
//! Features without geometry (null shapes) cannot be written back: a layer
//! holding one fails with `ShapefileError::NullShape` before anything is
//! written.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use hdishp::modify_shapefile;
//!
//! let report = modify_shapefile(
//!     Path::new("points.shp"),
//!     Path::new("dated.shp"),
//!     "2024-01-01",
//!     encoding::all::UTF_8,
//! ).unwrap();
//! println!("{} set on {} features", report.column, report.n_features);
//! ```

use std::path::{Path, PathBuf};
use chrono::{Datelike, NaiveDate};
use encoding::EncodingRef;
use regex::Regex;
use shapefile_rs::dbase::{self, FieldValue};
use shapefile_rs::Shape;
use tracing::{info, warn};
use crate::read::shapefile::{self, DbfField, DbfType, ShapefileError};
use crate::write::shapefile::{ShapefileWriter, STRING_FIELD_LEN};

/// Name of the column this module writes.
pub const DATA_COLUMN: &str = "data";

const ISO_DATE_FORMAT: &str = "%Y-%m-%d";

lazy_static! {
    static ref ISO_DATE_RE: Regex = Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap();
}

#[derive(Debug, thiserror::Error)]
pub enum ModifyError {
    #[error("input Shapefile not found: {path:?}")]
    NotFound { path: PathBuf },

    #[error("{value:?} cannot go in {data_type:?} column {column:?}: {reason}")]
    InvalidValue { column: String, data_type: DbfType, value: String, reason: String },

    #[error(transparent)]
    Shapefile(#[from] ShapefileError),
}

/// What `modify_shapefile` did.
#[derive(Debug)]
pub struct ModifyReport {
    /// Column name as written, in its original casing when it existed.
    pub column: String,
    pub data_type: DbfType,
    pub added: bool,
    pub n_features: usize,
    pub warning: Option<String>,
}

/// Parses exactly `YYYY-MM-DD`: two-digit month and day, no surrounding
/// whitespace.
pub fn parse_iso_date(value: &str) -> Option<NaiveDate> {
    if !ISO_DATE_RE.is_match(value) {
        return None;
    }
    NaiveDate::parse_from_str(value, ISO_DATE_FORMAT).ok()
}

fn to_dbase_date(date: NaiveDate) -> dbase::Date {
    dbase::Date::new(date.day(), date.month(), date.year() as u32)
}

fn parse_logical(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Some(true),
        "false" | "f" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

fn character_value(value: &str) -> FieldValue {
    FieldValue::Character(Some(value.to_string()))
}

/// Column layout and value to write, given the column as it stands (if it
/// exists). The `String` is a warning.
fn plan(existing: Option<&DbfField>, value: &str) -> Result<(DbfField, FieldValue, Option<String>), ModifyError> {
    let field = match existing {
        Some(field) => field,
        None => {
            return Ok(match parse_iso_date(value) {
                Some(date) => (DbfField::date(DATA_COLUMN), FieldValue::Date(Some(to_dbase_date(date))), None),
                None => (DbfField::character(DATA_COLUMN, STRING_FIELD_LEN), character_value(value), None),
            });
        }
    };

    let invalid = |reason: &str| ModifyError::InvalidValue {
        column: field.name.clone(),
        data_type: field.data_type,
        value: value.to_string(),
        reason: reason.to_string(),
    };

    match field.data_type {
        DbfType::Date => match parse_iso_date(value) {
            Some(date) => Ok((field.clone(), FieldValue::Date(Some(to_dbase_date(date))), None)),
            None => {
                let warning = format!(
                    "{:?} is not a YYYY-MM-DD date; column {:?} is rewritten as text",
                    value, field.name
                );
                Ok((DbfField::character(&field.name, STRING_FIELD_LEN), character_value(value), Some(warning)))
            }
        },
        DbfType::Character => Ok((field.clone(), character_value(value), None)),
        DbfType::Numeric => match value.trim().parse::<f64>() {
            Ok(n) => Ok((field.clone(), FieldValue::Numeric(Some(n)), None)),
            Err(_) => Err(invalid("not a number")),
        },
        DbfType::Float => match value.trim().parse::<f32>() {
            Ok(n) => Ok((field.clone(), FieldValue::Float(Some(n)), None)),
            Err(_) => Err(invalid("not a number")),
        },
        DbfType::Logical => match parse_logical(value) {
            Some(b) => Ok((field.clone(), FieldValue::Logical(Some(b)), None)),
            None => Err(invalid("not true or false")),
        },
        DbfType::Unsupported(_) => Err(invalid("unsupported column type")),
    }
}

/// Copies `input` to `output`, setting the "data" column of every feature
/// to `value`.
///
/// The input is read completely before the output is created, so `output`
/// may be `input`. CRS and encoding carry over.
pub fn modify_shapefile(input: &Path, output: &Path, value: &str, encoding: EncodingRef) -> Result<ModifyReport, ModifyError> {
    if !input.is_file() {
        return Err(ModifyError::NotFound { path: input.to_path_buf() });
    }

    let reader = shapefile::open(input, encoding)?;
    let mut schema = reader.schema().clone();
    let crs = reader.crs().cloned();

    let index = schema.find_field(DATA_COLUMN);
    let (field, field_value, warning) = plan(index.map(|i| &schema.fields[i]), value)?;
    if let Some(ref message) = warning {
        warn!(path = %input.display(), "{}", message);
    }

    match index {
        Some(i) => schema.fields[i] = field.clone(),
        None => schema.fields.push(field.clone()),
    }

    let features = reader.read_all()?;
    if features.iter().any(|&(ref shape, _)| matches!(*shape, Shape::NullShape)) {
        return Err(ShapefileError::NullShape { path: input.to_path_buf() }.into());
    }

    let mut writer = ShapefileWriter::create(output, &schema, crs.as_ref(), encoding)?;
    for (shape, mut record) in features.into_iter() {
        record.insert(field.name.clone(), field_value.clone());
        writer.write_feature(&shape, &record)?;
    }
    let n_features = writer.finish();

    info!(
        input = %input.display(),
        output = %output.display(),
        column = %field.name,
        n_features = n_features,
        "modified shapefile"
    );

    Ok(ModifyReport {
        column: field.name,
        data_type: field.data_type,
        added: index.is_none(),
        n_features: n_features,
        warning: warning,
    })
}

#[cfg(test)]
mod test {
    use std::path::{Path, PathBuf};
    use encoding;
    use shapefile_rs::dbase::{self, FieldValue};
    use shapefile_rs::dbase::Record;
    use shapefile_rs::{Point, Shape};
    use crate::read::shapefile::{self, shp, Crs, DbfField, DbfType, Schema, ShapefileError, ShpShapeType};
    use crate::write::shapefile::ShapefileWriter;
    use super::*;

    fn layer(path: &Path, extra: Option<(DbfField, FieldValue)>) -> PathBuf {
        let mut fields = vec![ DbfField::character("NAME", 10) ];
        if let Some((ref field, _)) = extra {
            fields.push(field.clone());
        }
        let schema = Schema { shape_type: ShpShapeType::Point, fields: fields };

        let mut writer = ShapefileWriter::create(path, &schema, Some(&Crs::wgs84()), encoding::all::UTF_8).unwrap();
        for (i, name) in ["one", "two"].iter().enumerate() {
            let mut record = Record::default();
            record.insert("NAME".to_string(), FieldValue::Character(Some(name.to_string())));
            if let Some((ref field, ref value)) = extra {
                record.insert(field.name.clone(), value.clone());
            }
            writer.write_feature(&Shape::Point(Point::new(i as f64, 2.0)), &record).unwrap();
        }
        writer.finish();
        path.to_path_buf()
    }

    fn values(path: &Path, column: &str) -> Vec<FieldValue> {
        shapefile::open_utf8(path).unwrap().read_all().unwrap()
            .into_iter()
            .map(|(_, record)| record.get(column).cloned().expect("missing column"))
            .collect()
    }

    #[test]
    fn iso_dates() {
        assert!(parse_iso_date("2024-01-01").is_some());
        assert!(parse_iso_date("2024-02-30").is_none());
        assert!(parse_iso_date("01/01/2024").is_none());
        assert!(parse_iso_date("hello").is_none());
        assert!(parse_iso_date("2024-1-1").is_none());
        assert!(parse_iso_date(" 2024-01-01 ").is_none());
        assert!(parse_iso_date("2024-01-01T00:00").is_none());
    }

    #[test]
    fn loose_date_becomes_text() {
        let tmp = tempfile::tempdir().unwrap();
        let input = layer(&tmp.path().join("in.shp"), None);
        let output = tmp.path().join("out.shp");

        let report = modify_shapefile(&input, &output, "2024-1-1", encoding::all::UTF_8).unwrap();

        assert_eq!(DbfType::Character, report.data_type);
        assert_eq!(
            vec![ FieldValue::Character(Some("2024-1-1".to_string())), FieldValue::Character(Some("2024-1-1".to_string())) ],
            values(&output, "data")
        );
    }

    #[test]
    fn adds_date_column() {
        let tmp = tempfile::tempdir().unwrap();
        let input = layer(&tmp.path().join("in.shp"), None);
        let output = tmp.path().join("out.shp");

        let report = modify_shapefile(&input, &output, "2024-01-01", encoding::all::UTF_8).unwrap();

        assert_eq!("data", report.column);
        assert_eq!(DbfType::Date, report.data_type);
        assert!(report.added);
        assert_eq!(2, report.n_features);
        assert_eq!(None, report.warning);

        let reader = shapefile::open_utf8(&output).unwrap();
        assert_eq!(Some(&DbfField::date("data")), reader.schema().fields.last());
        assert_eq!(Some(&Crs::wgs84()), reader.crs());
        for value in values(&output, "data") {
            match value {
                FieldValue::Date(Some(_)) => {}
                other => panic!("expected a date, got {:?}", other),
            }
        }
    }

    #[test]
    fn adds_string_column() {
        let tmp = tempfile::tempdir().unwrap();
        let input = layer(&tmp.path().join("in.shp"), None);
        let output = tmp.path().join("out.shp");

        let report = modify_shapefile(&input, &output, "hello", encoding::all::UTF_8).unwrap();

        assert_eq!(DbfType::Character, report.data_type);
        let reader = shapefile::open_utf8(&output).unwrap();
        assert_eq!(Some(&DbfField::character("data", 254)), reader.schema().fields.last());
        assert_eq!(
            vec![ FieldValue::Character(Some("hello".to_string())), FieldValue::Character(Some("hello".to_string())) ],
            values(&output, "data")
        );
        assert_eq!(
            vec![ FieldValue::Character(Some("one".to_string())), FieldValue::Character(Some("two".to_string())) ],
            values(&output, "NAME")
        );
    }

    #[test]
    fn existing_column_keeps_its_name() {
        let tmp = tempfile::tempdir().unwrap();
        let existing = (DbfField::character("DATA", 20), FieldValue::Character(Some("old".to_string())));
        let input = layer(&tmp.path().join("in.shp"), Some(existing));
        let output = tmp.path().join("out.shp");

        let report = modify_shapefile(&input, &output, "new", encoding::all::UTF_8).unwrap();

        assert_eq!("DATA", report.column);
        assert!(!report.added);
        let reader = shapefile::open_utf8(&output).unwrap();
        assert_eq!(2, reader.schema().fields.len());
        assert_eq!(Some(&DbfField::character("DATA", 20)), reader.schema().fields.last());
        assert_eq!(
            vec![ FieldValue::Character(Some("new".to_string())), FieldValue::Character(Some("new".to_string())) ],
            values(&output, "DATA")
        );
    }

    #[test]
    fn bad_date_for_date_column_falls_back_to_text() {
        let tmp = tempfile::tempdir().unwrap();
        let existing = (DbfField::date("Data"), FieldValue::Date(Some(dbase::Date::new(1, 1, 2020))));
        let input = layer(&tmp.path().join("in.shp"), Some(existing));
        let output = tmp.path().join("out.shp");

        let report = modify_shapefile(&input, &output, "next week", encoding::all::UTF_8).unwrap();

        assert_eq!("Data", report.column);
        assert_eq!(DbfType::Character, report.data_type);
        assert!(report.warning.is_some());
        assert_eq!(
            vec![ FieldValue::Character(Some("next week".to_string())), FieldValue::Character(Some("next week".to_string())) ],
            values(&output, "Data")
        );
    }

    #[test]
    fn numeric_column_needs_a_number() {
        let tmp = tempfile::tempdir().unwrap();
        let existing = (DbfField::numeric("data", 10, 2), FieldValue::Numeric(Some(1.5)));
        let input = layer(&tmp.path().join("in.shp"), Some(existing));
        let output = tmp.path().join("out.shp");

        match modify_shapefile(&input, &output, "lots", encoding::all::UTF_8) {
            Err(ModifyError::InvalidValue { ref column, .. }) => assert_eq!("data", column),
            other => panic!("expected InvalidValue, got {:?}", other),
        }
        assert!(!output.exists());

        let report = modify_shapefile(&input, &output, " 2.25 ", encoding::all::UTF_8).unwrap();
        assert_eq!(DbfType::Numeric, report.data_type);
        assert_eq!(vec![ FieldValue::Numeric(Some(2.25)), FieldValue::Numeric(Some(2.25)) ], values(&output, "data"));
    }

    #[test]
    fn output_may_replace_input() {
        let tmp = tempfile::tempdir().unwrap();
        let input = layer(&tmp.path().join("in.shp"), None);

        modify_shapefile(&input, &input, "hello", encoding::all::UTF_8).unwrap();

        assert_eq!(
            vec![ FieldValue::Character(Some("hello".to_string())), FieldValue::Character(Some("hello".to_string())) ],
            values(&input, "data")
        );
    }

    #[test]
    fn null_geometry_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let input = layer(&tmp.path().join("in.shp"), None);
        std::fs::write(&input, shp::null_record_bytes(1)).unwrap();
        let output = tmp.path().join("out.shp");

        match modify_shapefile(&input, &output, "x", encoding::all::UTF_8) {
            Err(ModifyError::Shapefile(ShapefileError::NullShape { ref path })) => assert_eq!(&input, path),
            other => panic!("expected NullShape, got {:?}", other),
        }
        assert!(!output.exists());
        assert!(input.with_extension("dbf").is_file());
    }

    #[test]
    fn missing_input() {
        let tmp = tempfile::tempdir().unwrap();
        match modify_shapefile(&tmp.path().join("nope.shp"), &tmp.path().join("out.shp"), "x", encoding::all::UTF_8) {
            Err(ModifyError::NotFound { .. }) => {}
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn logical_values() {
        assert_eq!(Some(true), parse_logical("Yes"));
        assert_eq!(Some(false), parse_logical("0"));
        assert_eq!(None, parse_logical("maybe"));
    }
}
