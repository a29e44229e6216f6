//! Concatenates Shapefiles that share a schema and a CRS.
//!
//! Every input is opened and checked against the first one before the
//! output is created, so a merge that fails leaves nothing behind.
//!
//! Features without geometry (null shapes) cannot be written back, so an
//! input holding one fails the merge with `ShapefileError::NullShape`. That
//! is only found while copying; the partial output is then removed.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use hdishp::{collect_inputs, merge_shapefiles};
//!
//! let inputs = collect_inputs(Some(Path::new("surveys")), &[]).unwrap();
//! let n = merge_shapefiles(&inputs, Path::new("all.shp"), encoding::all::UTF_8).unwrap();
//! println!("{} features", n);
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use encoding::EncodingRef;
use tracing::{debug, info};
use walkdir::WalkDir;
use crate::read::shapefile::{self, Schema, ShapefileError, ShapefileReader, ShpShapeType};
use crate::write::shapefile::{remove_shapefile, ShapefileWriter};

#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("no input Shapefiles given")]
    NoInputs,

    #[error("no .shp files found under {dir:?}")]
    NoShapefilesFound { dir: PathBuf },

    #[error("input not found: {path:?}")]
    NotFound { path: PathBuf },

    #[error("{path:?} has schema {found}, expected {expected}")]
    SchemaMismatch { path: PathBuf, expected: String, found: String },

    #[error("{path:?} has a different CRS from {first:?}")]
    CrsMismatch { path: PathBuf, first: PathBuf },

    #[error("output {path:?} is also an input")]
    OutputIsInput { path: PathBuf },

    #[error("could not search {dir:?}: {source}")]
    Walk { dir: PathBuf, source: walkdir::Error },

    #[error(transparent)]
    Shapefile(#[from] ShapefileError),
}

fn is_shp(path: &Path) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().eq_ignore_ascii_case("shp"))
        .unwrap_or(false)
}

/// Every ".shp" file under `dir`, recursively, in name order.
pub fn find_shapefiles(dir: &Path) -> Result<Vec<PathBuf>, MergeError> {
    if !dir.is_dir() {
        return Err(MergeError::NotFound { path: dir.to_path_buf() });
    }

    let mut paths = Vec::new();
    for entry in WalkDir::new(dir).sort_by(|a, b| a.file_name().cmp(b.file_name())) {
        let entry = entry.map_err(|source| MergeError::Walk { dir: dir.to_path_buf(), source })?;
        if entry.file_type().is_file() && is_shp(entry.path()) {
            paths.push(entry.into_path());
        }
    }

    if paths.is_empty() {
        return Err(MergeError::NoShapefilesFound { dir: dir.to_path_buf() });
    }
    debug!(dir = %dir.display(), n_inputs = paths.len(), "found shapefiles");
    Ok(paths)
}

/// Decides what to merge: everything under `dir` if it is given, otherwise
/// `files`.
pub fn collect_inputs(dir: Option<&Path>, files: &[PathBuf]) -> Result<Vec<PathBuf>, MergeError> {
    match dir {
        Some(dir) => find_shapefiles(dir),
        None if files.is_empty() => Err(MergeError::NoInputs),
        None => Ok(files.to_vec()),
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Opens every input and checks it against the first.
fn open_inputs(inputs: &[PathBuf], output: &Path, encoding: EncodingRef) -> Result<Vec<ShapefileReader>, MergeError> {
    let mut readers: Vec<ShapefileReader> = Vec::with_capacity(inputs.len());

    for path in inputs {
        if !path.is_file() {
            return Err(MergeError::NotFound { path: path.clone() });
        }
        if same_file(path, output) {
            return Err(MergeError::OutputIsInput { path: path.clone() });
        }

        let reader = shapefile::open(path, encoding)?;

        if let Some(first) = readers.first() {
            if !first.schema().is_compatible_with(reader.schema()) {
                return Err(MergeError::SchemaMismatch {
                    path: path.clone(),
                    expected: first.schema().describe(),
                    found: reader.schema().describe(),
                });
            }
            if first.crs() != reader.crs() {
                return Err(MergeError::CrsMismatch { path: path.clone(), first: first.path().to_path_buf() });
            }
        }

        readers.push(reader);
    }

    Ok(readers)
}

fn copy_features(readers: &mut [ShapefileReader], writer: &mut ShapefileWriter) -> Result<(), MergeError> {
    for reader in readers.iter_mut() {
        let mut n_read = 0;
        for feature in reader.features() {
            let (shape, record) = feature?;
            writer.write_feature(&shape, &record)?;
            n_read += 1;
        }
        debug!(path = %reader.path().display(), n_features = n_read, "merged");
    }
    Ok(())
}

/// Merges `inputs`, in order, into a new layer at `output`.
///
/// The output takes the first input's fields and CRS. Its shape type is the
/// first one that is not Null, so empty inputs can lead the list.
///
/// Returns the number of features written.
pub fn merge_shapefiles(inputs: &[PathBuf], output: &Path, encoding: EncodingRef) -> Result<usize, MergeError> {
    if inputs.is_empty() {
        return Err(MergeError::NoInputs);
    }

    let mut readers = open_inputs(inputs, output, encoding)?;

    let schema = Schema {
        shape_type: readers.iter()
            .map(|r| r.schema().shape_type)
            .find(|t| *t != ShpShapeType::Null)
            .unwrap_or(ShpShapeType::Null),
        fields: readers[0].schema().fields.clone(),
    };
    let crs = readers[0].crs().cloned();

    let mut writer = ShapefileWriter::create(output, &schema, crs.as_ref(), encoding)?;
    if let Err(err) = copy_features(&mut readers, &mut writer) {
        drop(writer);
        remove_shapefile(output)?;
        return Err(err);
    }
    let n_features = writer.finish();

    info!(output = %output.display(), n_inputs = inputs.len(), n_features = n_features, "merge complete");
    Ok(n_features)
}

#[cfg(test)]
mod test {
    use std::fs;
    use std::path::{Path, PathBuf};
    use encoding;
    use shapefile_rs::dbase::FieldValue;
    use shapefile_rs::dbase::Record;
    use shapefile_rs::{Point, Shape};
    use crate::read::shapefile::{self, shp, Crs, DbfField, Schema, ShapefileError, ShpShapeType};
    use crate::write::shapefile::ShapefileWriter;
    use super::*;

    fn name_schema(len: u8) -> Schema {
        Schema {
            shape_type: ShpShapeType::Point,
            fields: vec![ DbfField::character("NAME", len) ],
        }
    }

    fn layer(path: &Path, schema: &Schema, crs: Option<&Crs>, names: &[&str]) -> PathBuf {
        let mut writer = ShapefileWriter::create(path, schema, crs, encoding::all::UTF_8).unwrap();
        for (i, name) in names.iter().enumerate() {
            let mut record = Record::default();
            record.insert("NAME".to_string(), FieldValue::Character(Some(name.to_string())));
            writer.write_feature(&Shape::Point(Point::new(i as f64, 1.0)), &record).unwrap();
        }
        writer.finish();
        path.to_path_buf()
    }

    fn names(path: &Path) -> Vec<String> {
        shapefile::open_utf8(path).unwrap().read_all().unwrap()
            .into_iter()
            .map(|(_, record)| match record.get("NAME") {
                Some(&FieldValue::Character(Some(ref s))) => s.clone(),
                other => panic!("unexpected NAME {:?}", other),
            })
            .collect()
    }

    #[test]
    fn merges_in_input_order() {
        let tmp = tempfile::tempdir().unwrap();
        let wgs84 = Crs::wgs84();
        let a = layer(&tmp.path().join("a.shp"), &name_schema(10), Some(&wgs84), &["a1", "a2"]);
        let b = layer(&tmp.path().join("b.shp"), &name_schema(10), Some(&wgs84), &["b1"]);
        let out = tmp.path().join("out.shp");

        assert_eq!(3, merge_shapefiles(&[ b.clone(), a.clone() ], &out, encoding::all::UTF_8).unwrap());

        assert_eq!(vec!["b1", "a1", "a2"], names(&out));
        let reader = shapefile::open_utf8(&out).unwrap();
        assert_eq!(&name_schema(10), reader.schema());
        assert_eq!(Some(&wgs84), reader.crs());
    }

    #[test]
    fn schema_mismatch_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let a = layer(&tmp.path().join("a.shp"), &name_schema(10), None, &["a1"]);
        let b = layer(&tmp.path().join("b.shp"), &name_schema(20), None, &["b1"]);
        let out = tmp.path().join("out.shp");

        match merge_shapefiles(&[ a, b.clone() ], &out, encoding::all::UTF_8) {
            Err(MergeError::SchemaMismatch { path, .. }) => assert_eq!(b, path),
            other => panic!("expected SchemaMismatch, got {:?}", other),
        }
        assert!(!out.exists());
        assert!(!out.with_extension("dbf").exists());
    }

    #[test]
    fn crs_mismatch_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let a = layer(&tmp.path().join("a.shp"), &name_schema(10), Some(&Crs::wgs84()), &["a1"]);
        let b = layer(&tmp.path().join("b.shp"), &name_schema(10), None, &["b1"]);

        match merge_shapefiles(&[ a, b.clone() ], &tmp.path().join("out.shp"), encoding::all::UTF_8) {
            Err(MergeError::CrsMismatch { path, .. }) => assert_eq!(b, path),
            other => panic!("expected CrsMismatch, got {:?}", other),
        }
    }

    #[test]
    fn missing_input_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let a = layer(&tmp.path().join("a.shp"), &name_schema(10), None, &["a1"]);
        let missing = tmp.path().join("missing.shp");
        let out = tmp.path().join("out.shp");

        match merge_shapefiles(&[ a, missing.clone() ], &out, encoding::all::UTF_8) {
            Err(MergeError::NotFound { path }) => assert_eq!(missing, path),
            other => panic!("expected NotFound, got {:?}", other),
        }
        assert!(!out.exists());
    }

    #[test]
    fn output_cannot_be_an_input() {
        let tmp = tempfile::tempdir().unwrap();
        let a = layer(&tmp.path().join("a.shp"), &name_schema(10), None, &["a1"]);

        match merge_shapefiles(&[ a.clone() ], &a, encoding::all::UTF_8) {
            Err(MergeError::OutputIsInput { .. }) => {}
            other => panic!("expected OutputIsInput, got {:?}", other),
        }
        assert_eq!(vec!["a1"], names(&a));
    }

    #[test]
    fn null_geometry_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let a = layer(&tmp.path().join("a.shp"), &name_schema(10), None, &["a1"]);
        fs::write(&a, shp::null_record_bytes(1)).unwrap();
        let out = tmp.path().join("out.shp");

        match merge_shapefiles(&[ a ], &out, encoding::all::UTF_8) {
            Err(MergeError::Shapefile(ShapefileError::NullShape { .. })) => {}
            other => panic!("expected NullShape, got {:?}", other),
        }
        assert!(!out.exists());
        assert!(!out.with_extension("dbf").exists());
    }

    #[test]
    fn no_inputs() {
        let tmp = tempfile::tempdir().unwrap();
        match merge_shapefiles(&[], &tmp.path().join("out.shp"), encoding::all::UTF_8) {
            Err(MergeError::NoInputs) => {}
            other => panic!("expected NoInputs, got {:?}", other),
        }
        match collect_inputs(None, &[]) {
            Err(MergeError::NoInputs) => {}
            other => panic!("expected NoInputs, got {:?}", other),
        }
    }

    #[test]
    fn collect_from_directory_recursively() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("day2")).unwrap();
        fs::write(tmp.path().join("b.shp"), b"").unwrap();
        fs::write(tmp.path().join("a.SHP"), b"").unwrap();
        fs::write(tmp.path().join("a.dbf"), b"").unwrap();
        fs::write(tmp.path().join("day2").join("c.shp"), b"").unwrap();

        let explicit = vec![ PathBuf::from("ignored.shp") ];
        let found = collect_inputs(Some(tmp.path()), &explicit).unwrap();

        assert_eq!(
            vec![ tmp.path().join("a.SHP"), tmp.path().join("b.shp"), tmp.path().join("day2").join("c.shp") ],
            found
        );
    }

    #[test]
    fn empty_directory() {
        let tmp = tempfile::tempdir().unwrap();
        match collect_inputs(Some(tmp.path()), &[]) {
            Err(MergeError::NoShapefilesFound { .. }) => {}
            other => panic!("expected NoShapefilesFound, got {:?}", other),
        }
    }

    #[test]
    fn explicit_files_without_directory() {
        let files = vec![ PathBuf::from("x.shp"), PathBuf::from("y.shp") ];
        assert_eq!(files, collect_inputs(None, &files).unwrap());
    }
}
