/// Reads the header of an ESRI ".shp" Shapefile, as per
/// https://www.esri.com/library/whitepapers/pdfs/shapefile.pdf
///
/// Only the 100-byte header is parsed here. Geometry records are decoded by
/// the `shapefile` crate.
use std::fmt;
use std::fs;
use std::io;
use std::io::Seek;
use std::path::Path;
use byteorder::{BigEndian, ByteOrder, LittleEndian};

pub const SHP_HEADER_LENGTH: usize = 100;
const SHP_MAGIC_NUMBER: u32 = 9994;
const SHP_VERSION: u32 = 1000;

#[derive(Debug, thiserror::Error)]
pub enum ShpError {
    #[error("{0}")]
    IOError(#[from] io::Error),

    #[error("Parse error: {0}")]
    ParseError(String),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ShpShapeType {
    Null,
    Point,
    PolyLine,
    Polygon,
    MultiPoint,
    PointZ,
    PolyLineZ,
    PolygonZ,
    MultiPointZ,
    PointM,
    PolyLineM,
    PolygonM,
    MultiPointM,
    MultiPatch,
}

impl ShpShapeType {
    pub fn with_u32(u: u32) -> Option<ShpShapeType> {
        match u {
            0  => Some(ShpShapeType::Null),
            1  => Some(ShpShapeType::Point),
            3  => Some(ShpShapeType::PolyLine),
            5  => Some(ShpShapeType::Polygon),
            8  => Some(ShpShapeType::MultiPoint),
            11 => Some(ShpShapeType::PointZ),
            13 => Some(ShpShapeType::PolyLineZ),
            15 => Some(ShpShapeType::PolygonZ),
            18 => Some(ShpShapeType::MultiPointZ),
            21 => Some(ShpShapeType::PointM),
            23 => Some(ShpShapeType::PolyLineM),
            25 => Some(ShpShapeType::PolygonM),
            28 => Some(ShpShapeType::MultiPointM),
            31 => Some(ShpShapeType::MultiPatch),
            _ => None,
        }
    }

    /// Two layers can share features if their shape types match. An empty
    /// layer is written with the Null type, so it is compatible with anything.
    pub fn is_compatible_with(self, other: ShpShapeType) -> bool {
        self == other || self == ShpShapeType::Null || other == ShpShapeType::Null
    }
}

impl fmt::Display for ShpShapeType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Copy, Clone)]
pub struct ShpHeader {
    pub shape_type: ShpShapeType,
}

/// Reads the first 100 bytes of the file.
///
/// Side-effect: advances the file cursor 100 bytes.
pub fn read_shp_header(file: &mut dyn io::Read) -> Result<ShpHeader, ShpError> {
    let mut buf = [ 0u8; SHP_HEADER_LENGTH ];
    file.read_exact(&mut buf)?;
    parse_shp_header(&buf)
}

fn parse_shp_header(buf: &[u8; SHP_HEADER_LENGTH]) -> Result<ShpHeader, ShpError> {
    let magic_number = BigEndian::read_u32(&buf[0..4]);
    let version = LittleEndian::read_u32(&buf[28..32]);
    let shape_type_u32 = LittleEndian::read_u32(&buf[32..36]);

    if magic_number != SHP_MAGIC_NUMBER {
        return Err(ShpError::ParseError(format!("File has wrong magic number: found {}, expected {}", magic_number, SHP_MAGIC_NUMBER)));
    }

    if version != SHP_VERSION {
        return Err(ShpError::ParseError(format!("File has wrong version: found {}, expected {}", version, SHP_VERSION)));
    }

    match ShpShapeType::with_u32(shape_type_u32) {
        Some(shape_type) => {
            Ok(ShpHeader {
                shape_type: shape_type,
            })
        }
        None => {
            Err(ShpError::ParseError(format!("File has nonexistent shape type {}", shape_type_u32)))
        }
    }
}

/// Opens the ".shp" file at `path` and reads its header.
///
/// Side-effect: rewinds the returned reader to the start of the file, so the
/// `shapefile` crate can take it from there.
pub fn open(path: &Path) -> Result<(ShpHeader, io::BufReader<fs::File>), ShpError> {
    let mut r = io::BufReader::new(fs::File::open(path)?);
    let header = read_shp_header(&mut r)?;
    r.seek(io::SeekFrom::Start(0))?;
    Ok((header, r))
}

/// A ".shp" file of layer type `shape_type` holding a single null record.
#[cfg(test)]
pub fn null_record_bytes(shape_type: u32) -> Vec<u8> {
    let mut buf = vec![ 0u8; SHP_HEADER_LENGTH + 12 ];
    BigEndian::write_u32(&mut buf[0..4], SHP_MAGIC_NUMBER);
    let len = buf.len();
    BigEndian::write_u32(&mut buf[24..28], (len / 2) as u32);
    LittleEndian::write_u32(&mut buf[28..32], SHP_VERSION);
    LittleEndian::write_u32(&mut buf[32..36], shape_type);
    BigEndian::write_u32(&mut buf[100..104], 1); // record number
    BigEndian::write_u32(&mut buf[104..108], 2); // content length, 16-bit words
    LittleEndian::write_u32(&mut buf[108..112], 0);
    buf
}
