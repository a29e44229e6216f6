//! Writes Shapefiles through the `shapefile` crate.
//!
//! `ShapefileWriter` lays out the ".dbf" from a `Schema` and adds the ".prj"
//! and ".cpg" sidecars the `shapefile` crate does not write itself.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use encoding::EncodingRef;
use shapefile_rs::dbase::Record;
use shapefile_rs::Shape;
use tracing::debug;
use crate::read::shapefile::{dbf, prj};
use crate::read::shapefile::{Crs, DbfField, Schema, ShapefileError, ShpShapeType};

/// Every file that makes up one layer.
pub const SIDECAR_EXTENSIONS: [&str; 5] = ["shp", "shx", "dbf", "prj", "cpg"];

/// Width of string attributes in HDI layers.
pub const STRING_FIELD_LEN: u8 = dbf::MAX_CHARACTER_LENGTH;

/// Width and precision of numeric attributes in HDI layers; what GDAL uses
/// for real-valued fields.
pub const NUMERIC_FIELD_LEN: u8 = 24;
pub const NUMERIC_FIELD_DECIMALS: u8 = 15;

/// Layout of the point layers built from ".hdi" files.
pub fn hdi_schema() -> Schema {
    Schema {
        shape_type: ShpShapeType::Point,
        fields: vec![
            DbfField::character("FILE_NAME", STRING_FIELD_LEN),
            DbfField::character("FILE_PATH", STRING_FIELD_LEN),
            DbfField::character("ROAD_NAME", STRING_FIELD_LEN),
            DbfField::numeric("B", NUMERIC_FIELD_LEN, NUMERIC_FIELD_DECIMALS),
            DbfField::numeric("L", NUMERIC_FIELD_LEN, NUMERIC_FIELD_DECIMALS),
            DbfField::numeric("H", NUMERIC_FIELD_LEN, NUMERIC_FIELD_DECIMALS),
            DbfField::numeric("HEADING", NUMERIC_FIELD_LEN, NUMERIC_FIELD_DECIMALS),
        ],
    }
}

/// Deletes the layer at `shp_path` and all its sidecars, if they exist.
pub fn remove_shapefile(shp_path: &Path) -> Result<(), ShapefileError> {
    for extension in SIDECAR_EXTENSIONS.iter() {
        let path = prj::sidecar_path(shp_path, extension);
        match fs::remove_file(&path) {
            Ok(()) => debug!(path = %path.display(), "removed existing file"),
            Err(ref err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(source) => return Err(ShapefileError::IOError { path: path, source: source }),
        }
    }
    Ok(())
}

pub struct ShapefileWriter {
    path: PathBuf,
    n_features: usize,
    writer: shapefile_rs::Writer<io::BufWriter<fs::File>>,
}

impl ShapefileWriter {
    /// Creates a layer at `shp_path`, replacing whatever was there.
    ///
    /// Side-effect: writes the ".prj" (when `crs` is given) and ".cpg"
    /// immediately; ".shp", ".shx" and ".dbf" are complete once the writer
    /// is finished or dropped.
    pub fn create(shp_path: &Path, schema: &Schema, crs: Option<&Crs>, encoding: EncodingRef) -> Result<ShapefileWriter, ShapefileError> {
        let shp_path = shp_path.with_extension("shp");
        remove_shapefile(&shp_path)?;

        let table_builder = dbf::table_builder(&schema.fields, encoding)
            .map_err(|source| ShapefileError::DbfError { path: prj::sidecar_path(&shp_path, "dbf"), source })?;
        let writer = shapefile_rs::Writer::from_path(&shp_path, table_builder)
            .map_err(|source| ShapefileError::Library { path: shp_path.clone(), source })?;

        if let Some(crs) = crs {
            prj::write_prj(&shp_path, crs)
                .map_err(|source| ShapefileError::IOError { path: prj::sidecar_path(&shp_path, "prj"), source })?;
        }
        prj::write_cpg(&shp_path, &dbf::cpg_name(encoding))
            .map_err(|source| ShapefileError::IOError { path: prj::sidecar_path(&shp_path, "cpg"), source })?;

        Ok(ShapefileWriter {
            path: shp_path,
            n_features: 0,
            writer: writer,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one feature. `record` must hold a value for every field of
    /// the schema the writer was created with.
    pub fn write_feature(&mut self, shape: &Shape, record: &Record) -> Result<(), ShapefileError> {
        let result = match *shape {
            Shape::Point(ref s) => self.writer.write_shape_and_record(s, record),
            Shape::PointM(ref s) => self.writer.write_shape_and_record(s, record),
            Shape::PointZ(ref s) => self.writer.write_shape_and_record(s, record),
            Shape::Polyline(ref s) => self.writer.write_shape_and_record(s, record),
            Shape::PolylineM(ref s) => self.writer.write_shape_and_record(s, record),
            Shape::PolylineZ(ref s) => self.writer.write_shape_and_record(s, record),
            Shape::Polygon(ref s) => self.writer.write_shape_and_record(s, record),
            Shape::PolygonM(ref s) => self.writer.write_shape_and_record(s, record),
            Shape::PolygonZ(ref s) => self.writer.write_shape_and_record(s, record),
            Shape::Multipoint(ref s) => self.writer.write_shape_and_record(s, record),
            Shape::MultipointM(ref s) => self.writer.write_shape_and_record(s, record),
            Shape::MultipointZ(ref s) => self.writer.write_shape_and_record(s, record),
            Shape::Multipatch(ref s) => self.writer.write_shape_and_record(s, record),
            Shape::NullShape => return Err(ShapefileError::NullShape { path: self.path.clone() }),
        };

        result.map_err(|source| ShapefileError::Library { path: self.path.clone(), source })?;
        self.n_features += 1;
        Ok(())
    }

    /// Flushes the layer to disk and returns how many features it holds.
    pub fn finish(self) -> usize {
        let n_features = self.n_features;
        debug!(path = %self.path.display(), n_features = n_features, "wrote shapefile");
        drop(self.writer);
        n_features
    }
}
