//! Writers for the formats this crate produces: the fixed-header CSV and
//! ESRI Shapefiles.

pub mod csv;
pub mod shapefile;
