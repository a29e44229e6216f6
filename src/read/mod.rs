//! Readers for the formats this crate consumes: ".hdi" survey logs and
//! ESRI Shapefiles.

pub mod hdi;
pub mod shapefile;
