//! ".prj" and ".cpg" sidecars.
//!
//! A ".prj" holds the layer's coordinate reference system as ESRI WKT. We
//! never interpret it: layers share a CRS when their ".prj" texts match, and
//! a layer without a ".prj" has no CRS.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// WGS84 geographic coordinates (EPSG:4326), as GDAL writes it for
/// Shapefiles.
pub const WGS84_WKT: &str = "GEOGCS[\"GCS_WGS_1984\",DATUM[\"D_WGS_1984\",SPHEROID[\"WGS_1984\",6378137.0,298.257223563]],PRIMEM[\"Greenwich\",0.0],UNIT[\"Degree\",0.0174532925199433]]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Crs(String);

impl Crs {
    pub fn from_wkt(wkt: &str) -> Crs {
        Crs(wkt.trim().to_string())
    }

    pub fn wgs84() -> Crs {
        Crs::from_wkt(WGS84_WKT)
    }

    pub fn wkt(&self) -> &str {
        &self.0
    }
}

/// Path of a sidecar file: `roads.shp` -> `roads.<extension>`.
pub fn sidecar_path(shp_path: &Path, extension: &str) -> PathBuf {
    shp_path.with_extension(extension)
}

/// Reads the CRS next to `shp_path`, or None if there is no ".prj".
pub fn read_prj(shp_path: &Path) -> io::Result<Option<Crs>> {
    match fs::read_to_string(sidecar_path(shp_path, "prj")) {
        Ok(wkt) => Ok(Some(Crs::from_wkt(&wkt))),
        Err(ref err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

pub fn write_prj(shp_path: &Path, crs: &Crs) -> io::Result<()> {
    fs::write(sidecar_path(shp_path, "prj"), crs.wkt())
}

pub fn write_cpg(shp_path: &Path, encoding_name: &str) -> io::Result<()> {
    fs::write(sidecar_path(shp_path, "cpg"), encoding_name)
}

#[cfg(test)]
mod test {
    use std::fs;
    use super::*;

    #[test]
    fn missing_prj_is_no_crs() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(None, read_prj(&tmp.path().join("a.shp")).unwrap());
    }

    #[test]
    fn prj_round_trip_ignores_surrounding_whitespace() {
        let tmp = tempfile::tempdir().unwrap();
        let shp = tmp.path().join("a.shp");
        fs::write(tmp.path().join("a.prj"), format!("{}\r\n", WGS84_WKT)).unwrap();
        assert_eq!(Some(Crs::wgs84()), read_prj(&shp).unwrap());
    }
}
