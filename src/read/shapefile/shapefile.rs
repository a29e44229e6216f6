use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use encoding::EncodingRef;
use shapefile_rs::dbase;
use shapefile_rs::dbase::Record;
use shapefile_rs::Shape;
use super::dbf;
use super::prj;
use super::shp;

#[derive(Debug, thiserror::Error)]
pub enum ShapefileError {
    #[error("Shapefile not found: {path:?}")]
    NotFound { path: PathBuf },

    #[error("{path:?}: {source}")]
    ShpError { path: PathBuf, source: shp::ShpError },

    #[error("{path:?}: {source}")]
    DbfError { path: PathBuf, source: dbf::DbfError },

    #[error("I/O error at {path:?}: {source}")]
    IOError { path: PathBuf, source: io::Error },

    #[error("{path:?}: {source}")]
    Library { path: PathBuf, source: shapefile_rs::Error },

    #[error("{path:?}: {source}")]
    Dbase { path: PathBuf, source: dbase::Error },

    #[error("{path:?}: cannot write a null shape")]
    NullShape { path: PathBuf },
}

/// What a layer holds: its geometry type and its attribute table layout.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    pub shape_type: shp::ShpShapeType,
    pub fields: Vec<dbf::DbfField>,
}

impl Schema {
    /// True when features of `other` can be written into a layer with this
    /// schema unchanged.
    pub fn is_compatible_with(&self, other: &Schema) -> bool {
        self.shape_type.is_compatible_with(other.shape_type) && self.fields == other.fields
    }

    /// Index of the field called `name`, ignoring case.
    pub fn find_field(&self, name: &str) -> Option<usize> {
        let wanted = name.to_lowercase();
        self.fields.iter().position(|f| f.name.to_lowercase() == wanted)
    }

    /// Human-readable summary, e.g. `Point[FILE_NAME C(254), B N(24,15)]`.
    pub fn describe(&self) -> String {
        let fields: Vec<String> = self.fields.iter()
            .map(|f| match f.data_type {
                dbf::DbfType::Numeric | dbf::DbfType::Float => format!("{} {:?}({},{})", f.name, f.data_type, f.len, f.decimal_count),
                _ => format!("{} {:?}({})", f.name, f.data_type, f.len),
            })
            .collect();
        format!("{}[{}]", self.shape_type, fields.join(", "))
    }
}

/// An open Shapefile: its schema, its CRS, and a stream of features.
///
/// Geometry and attribute records are decoded by the `shapefile` crate; this
/// type adds the layout and CRS checks the merge and modify tools need.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use hdishp::read::shapefile::ShapefileReader;
///
/// let mut reader = ShapefileReader::open(Path::new("points.shp"), encoding::all::UTF_8).unwrap();
/// println!("{}", reader.schema().describe());
///
/// for feature in reader.features() {
///     let (shape, record) = feature.unwrap();
///     println!("{} {:?}", shape, record);
/// }
/// ```
pub struct ShapefileReader {
    path: PathBuf,
    schema: Schema,
    crs: Option<prj::Crs>,
    encoding: EncodingRef,
    n_records: usize,
    reader: shapefile_rs::Reader<io::BufReader<fs::File>, io::BufReader<fs::File>>,
}

impl ShapefileReader {
    /// Opens by ".shp" filename.
    ///
    /// The ".dbf" must sit next to it. A ".prj", if present, becomes the
    /// layer's CRS.
    pub fn open(shp_path: &Path, encoding: EncodingRef) -> Result<ShapefileReader, ShapefileError> {
        if !shp_path.is_file() {
            return Err(ShapefileError::NotFound { path: shp_path.to_path_buf() });
        }
        let dbf_path = prj::sidecar_path(shp_path, "dbf");

        let (shp_header, shp_file) = shp::open(shp_path)
            .map_err(|source| ShapefileError::ShpError { path: shp_path.to_path_buf(), source })?;
        let dbf_meta = dbf::open(&dbf_path, encoding)
            .map_err(|source| ShapefileError::DbfError { path: dbf_path.clone(), source })?;
        let crs = prj::read_prj(shp_path)
            .map_err(|source| ShapefileError::IOError { path: prj::sidecar_path(shp_path, "prj"), source })?;

        let dbase_encoding = dbf::dbase_encoding(encoding)
            .map_err(|source| ShapefileError::DbfError { path: dbf_path.clone(), source })?;
        let shape_reader = shapefile_rs::ShapeReader::new(shp_file)
            .map_err(|source| ShapefileError::Library { path: shp_path.to_path_buf(), source })?;
        let dbase_reader = dbase::Reader::from_path_with_encoding(&dbf_path, dbase_encoding)
            .map_err(|source| ShapefileError::Dbase { path: dbf_path.clone(), source })?;

        Ok(ShapefileReader {
            path: shp_path.to_path_buf(),
            schema: Schema {
                shape_type: shp_header.shape_type,
                fields: dbf_meta.fields,
            },
            crs: crs,
            encoding: encoding,
            n_records: dbf_meta.n_records,
            reader: shapefile_rs::Reader::new(shape_reader, dbase_reader),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn crs(&self) -> Option<&prj::Crs> {
        self.crs.as_ref()
    }

    pub fn encoding(&self) -> EncodingRef {
        self.encoding
    }

    /// Record count according to the ".dbf" header.
    pub fn n_records(&self) -> usize {
        self.n_records
    }

    /// Iterates over (geometry, attributes) pairs in file order.
    pub fn features(&mut self) -> impl Iterator<Item = Result<(Shape, Record), ShapefileError>> + '_ {
        let path = self.path.clone();
        self.reader.iter_shapes_and_records()
            .map(move |result| result.map_err(|source| ShapefileError::Library { path: path.clone(), source }))
    }

    /// Reads every feature into memory.
    pub fn read_all(mut self) -> Result<Vec<(Shape, Record)>, ShapefileError> {
        let features: Result<Vec<_>, _> = self.features().collect();
        features
    }
}

/// Opens by ".shp" filename. See `ShapefileReader::open`.
pub fn open(shp_path: &Path, encoding: EncodingRef) -> Result<ShapefileReader, ShapefileError> {
    ShapefileReader::open(shp_path, encoding)
}

#[cfg(test)]
mod test {
    use std::path::Path;
    use encoding;
    use super::*;
    use super::super::dbf::DbfField;
    use super::super::shp::ShpShapeType;

    fn schema(fields: Vec<DbfField>) -> Schema {
        Schema { shape_type: ShpShapeType::Point, fields: fields }
    }

    #[test]
    fn find_field_ignores_case() {
        let s = schema(vec![ DbfField::character("NAME", 10), DbfField::date("Data") ]);
        assert_eq!(Some(1), s.find_field("data"));
        assert_eq!(Some(0), s.find_field("name"));
        assert_eq!(None, s.find_field("other"));
    }

    #[test]
    fn compatibility_checks_every_field() {
        let a = schema(vec![ DbfField::character("NAME", 10) ]);
        let b = schema(vec![ DbfField::character("NAME", 20) ]);
        let c = Schema { shape_type: ShpShapeType::Null, fields: a.fields.clone() };
        assert!(!a.is_compatible_with(&b));
        assert!(a.is_compatible_with(&c));
    }

    #[test]
    fn describe() {
        let s = schema(vec![ DbfField::character("NAME", 10), DbfField::numeric("B", 24, 15) ]);
        assert_eq!("Point[NAME Character(10), B Numeric(24,15)]", s.describe());
    }

    #[test]
    fn open_missing_file() {
        match open(Path::new("does/not/exist.shp"), encoding::all::UTF_8) {
            Err(ShapefileError::NotFound { .. }) => {}
            Err(other) => panic!("unexpected error {:?}", other),
            Ok(_) => panic!("expected an error"),
        }
    }
}
