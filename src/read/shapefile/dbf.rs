/// Reads the field descriptors of an xbase ".dbf" file, as per
/// https://www.clicketyclick.dk/databases/xbase/format/dbf.html
///
/// Records themselves are decoded by the `dbase` crate; this module only
/// recovers the table layout (names, types, widths, decimal counts) so two
/// tables can be compared and a writer can reproduce the layout exactly.

use std::fs;
use std::io;
use std::path::Path;
use byteorder::{ByteOrder, LittleEndian};
use encoding::{DecoderTrap, Encoding, EncodingRef};
use shapefile_rs::dbase::encoding::EncodingRs;
use shapefile_rs::dbase::{FieldName, TableWriterBuilder};

const DBF_HEADER_LENGTH: usize = 32;
const DBF_FIELD_DESCRIPTOR_LENGTH: usize = 32;
const DBF_FIELD_TERMINATOR: u8 = 0x0D;
const DBF_FIELD_NAME_LENGTH: usize = 11;

/// Widest character field xbase allows.
pub const MAX_CHARACTER_LENGTH: u8 = 254;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DbfType {
    Character,
    Numeric,
    Float,
    Date,
    Logical,
    Unsupported(char),
}

impl DbfType {
    fn with_u8(u: u8) -> DbfType {
        match u {
            b'C' => DbfType::Character,
            b'N' => DbfType::Numeric,
            b'F' => DbfType::Float,
            b'D' => DbfType::Date,
            b'L' => DbfType::Logical,
            other => DbfType::Unsupported(other as char),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbfField {
    pub name: String,
    pub data_type: DbfType,
    pub len: u8,
    pub decimal_count: u8,
}

impl DbfField {
    pub fn character(name: &str, len: u8) -> DbfField {
        DbfField { name: name.to_string(), data_type: DbfType::Character, len: len, decimal_count: 0 }
    }

    pub fn numeric(name: &str, len: u8, decimal_count: u8) -> DbfField {
        DbfField { name: name.to_string(), data_type: DbfType::Numeric, len: len, decimal_count: decimal_count }
    }

    pub fn date(name: &str) -> DbfField {
        DbfField { name: name.to_string(), data_type: DbfType::Date, len: 8, decimal_count: 0 }
    }
}

#[derive(Debug)]
struct DbfHeader {
    n_records: usize,
    n_header_bytes: usize,
}

#[derive(Debug)]
pub struct DbfMeta {
    pub n_records: usize,
    pub fields: Vec<DbfField>,
}

#[derive(Debug, thiserror::Error)]
pub enum DbfError {
    #[error("{0}")]
    IOError(#[from] io::Error),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("field {name:?} has type {type_char:?}, which cannot be written")]
    UnsupportedType { name: String, type_char: char },

    #[error("{0:?} is not a valid field name")]
    FieldName(String),

    #[error("encoding {0:?} cannot be used for .dbf files")]
    UnsupportedEncoding(String),
}

/// Reads the first 32 bytes of the file.
///
/// Side-effect: advances the file cursor 32 bytes.
fn read_dbf_header(file: &mut dyn io::Read) -> Result<DbfHeader, DbfError> {
    let mut buf: [ u8; DBF_HEADER_LENGTH ] = [ 0; DBF_HEADER_LENGTH ];
    file.read_exact(&mut buf)?;

    // Virtually any 32 bytes make a valid header. The exception: bytes 1-3
    // are a "YMD" creation date, so month and day have upper bounds.
    if buf[2] > 12 || buf[3] > 31 {
        return Err(DbfError::ParseError(String::from("The first four bytes of the file mention an invalid creation date. This is not a valid .dbf file.")));
    }

    let n_header_bytes = LittleEndian::read_u16(&buf[8..]) as usize;
    if n_header_bytes < DBF_HEADER_LENGTH + 1 {
        return Err(DbfError::ParseError(format!("Header claims to be {} bytes long, which leaves no room for field descriptors", n_header_bytes)));
    }

    Ok(DbfHeader {
        n_records: LittleEndian::read_u32(&buf[4..]) as usize,
        n_header_bytes: n_header_bytes,
    })
}

fn parse_dbf_field(buf: &[u8], encoding: EncodingRef) -> DbfField {
    let name_bytes = &buf[0..DBF_FIELD_NAME_LENGTH];
    let name_len = name_bytes.iter().position(|&b| b == 0).unwrap_or(DBF_FIELD_NAME_LENGTH);
    let name = match encoding.decode(&name_bytes[..name_len], DecoderTrap::Replace) {
        Ok(s) => s,
        Err(_) => String::from_utf8_lossy(&name_bytes[..name_len]).into_owned(),
    };

    DbfField {
        name: name.trim().to_string(),
        data_type: DbfType::with_u8(buf[11]),
        len: buf[16],
        decimal_count: buf[17],
    }
}

/// Reads all field definitions from the file.
///
/// Assumes exactly DBF_HEADER_LENGTH bytes of the file have been read already.
/// In other words, call this after read_dbf_header().
///
/// Side-effect: advances the file cursor to the first data record.
fn read_dbf_fields(file: &mut dyn io::Read, dbf_header: &DbfHeader, encoding: EncodingRef) -> Result<Vec<DbfField>, DbfError> {
    let mut buf = vec![ 0u8; dbf_header.n_header_bytes - DBF_HEADER_LENGTH ];
    file.read_exact(&mut buf)?;

    let mut fields = Vec::new();
    for chunk in buf.chunks(DBF_FIELD_DESCRIPTOR_LENGTH) {
        if chunk[0] == DBF_FIELD_TERMINATOR {
            return Ok(fields);
        }
        if chunk.len() < DBF_FIELD_DESCRIPTOR_LENGTH {
            break;
        }
        fields.push(parse_dbf_field(chunk, encoding));
    }

    Err(DbfError::ParseError(String::from("Field descriptors are not terminated by 0x0D")))
}

/// Reads the header, including field definitions, from a .dbf file.
///
/// Assumes the cursor is at the start of the file.
///
/// Side-effect: advances the file cursor to the first data record.
pub fn read_dbf_meta(file: &mut dyn io::Read, encoding: EncodingRef) -> Result<DbfMeta, DbfError> {
    let dbf_header = read_dbf_header(file)?;
    let fields = read_dbf_fields(file, &dbf_header, encoding)?;
    Ok(DbfMeta {
        n_records: dbf_header.n_records,
        fields: fields,
    })
}

/// Reads the layout of the ".dbf" file at `path`.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use hdishp::read::shapefile::dbf;
///
/// let meta = dbf::open(Path::new("points.dbf"), encoding::all::UTF_8).unwrap();
/// for field in meta.fields.iter() {
///     println!("{} {:?}({}, {})", field.name, field.data_type, field.len, field.decimal_count);
/// }
/// ```
pub fn open(path: &Path, encoding: EncodingRef) -> Result<DbfMeta, DbfError> {
    let mut r = io::BufReader::new(fs::File::open(path)?);
    read_dbf_meta(&mut r, encoding)
}

/// Maps an `encoding` codec onto the codec `dbase` reads and writes with.
pub fn dbase_encoding(encoding: EncodingRef) -> Result<EncodingRs, DbfError> {
    let label = encoding.whatwg_name().unwrap_or_else(|| encoding.name());
    match encoding_rs::Encoding::for_label(label.as_bytes()) {
        Some(codec) => Ok(EncodingRs::from(codec)),
        None => Err(DbfError::UnsupportedEncoding(label.to_string())),
    }
}

/// What goes in a ".cpg" sidecar for this encoding, e.g. "UTF-8".
pub fn cpg_name(encoding: EncodingRef) -> String {
    encoding.whatwg_name().unwrap_or_else(|| encoding.name()).to_uppercase()
}

/// Builds a `dbase` table layout with exactly these fields, in order.
pub fn table_builder(fields: &[DbfField], encoding: EncodingRef) -> Result<TableWriterBuilder, DbfError> {
    let mut builder = TableWriterBuilder::with_encoding(dbase_encoding(encoding)?);

    for field in fields {
        let name = FieldName::try_from(field.name.as_str())
            .map_err(|_| DbfError::FieldName(field.name.clone()))?;

        builder = match field.data_type {
            DbfType::Character => builder.add_character_field(name, field.len),
            DbfType::Numeric => builder.add_numeric_field(name, field.len, field.decimal_count),
            DbfType::Float => builder.add_float_field(name, field.len, field.decimal_count),
            DbfType::Date => builder.add_date_field(name),
            DbfType::Logical => builder.add_logical_field(name),
            DbfType::Unsupported(c) => {
                return Err(DbfError::UnsupportedType { name: field.name.clone(), type_char: c });
            }
        };
    }

    Ok(builder)
}
