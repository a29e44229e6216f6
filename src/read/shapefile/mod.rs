//! Reads ".shp" and accompanying ".dbf", ".prj" files.
//!
//! Decoding geometry and attribute records is the `shapefile` crate's job.
//! What this module adds is the information needed to decide whether two
//! layers can be combined:
//!
//! * The _schema_: shape type from the ".shp" header, plus the exact field
//!   layout (name, type, width, decimal count) from the ".dbf" header.
//! * The _CRS_: the text of the ".prj" file, if any. No file format can
//!   represent all the projections out there in the world, so the text is
//!   compared, never interpreted.
//!
//! # Examples
//!
//! Open by ".shp" filename:
//!
//! ```no_run
//! use std::path::Path;
//! use hdishp::read::shapefile;
//!
//! let mut reader = shapefile::open_utf8(Path::new("points.shp")).unwrap();
//!
//! for feature in reader.features() {
//!     // feature is a Result<(Shape, Record), ShapefileError>
//!     let (shape, record) = feature.unwrap();
//!     println!("{} {:?}", shape, record);
//! }
//! ```
//!
//! Compare two layers:
//!
//! ```no_run
//! use std::path::Path;
//! use hdishp::read::shapefile;
//!
//! let a = shapefile::open_utf8(Path::new("a.shp")).unwrap();
//! let b = shapefile::open_utf8(Path::new("b.shp")).unwrap();
//!
//! if !a.schema().is_compatible_with(b.schema()) {
//!     println!("{} vs {}", a.schema().describe(), b.schema().describe());
//! }
//! if a.crs() != b.crs() {
//!     println!("different projections");
//! }
//! ```

use std::path::Path;
use encoding;

pub mod dbf;
pub mod prj;
pub mod shp;
pub mod shapefile;

pub use self::dbf::{DbfField, DbfType};
pub use self::prj::Crs;
pub use self::shp::ShpShapeType;
pub use self::shapefile::{Schema, ShapefileError, ShapefileReader};
pub use self::shapefile::open;

pub fn open_utf8(shp_path: &Path) -> Result<ShapefileReader, ShapefileError> {
    open(shp_path, encoding::all::UTF_8)
}
