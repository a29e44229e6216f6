//! Reads ".hdi" survey logs.
//!
//! An ".hdi" file is tab-delimited text with one row per photo the survey
//! vehicle captured. Columns 11-14 (base 0) hold height, longitude, latitude
//! and heading. The photos themselves live in a "CCD" directory next to the
//! ".hdi" file, and the directory holding both is usually named after the
//! road, e.g. `20240312_01(G105)`.
//!
//! Rows and photos are paired by position: the Nth usable row gets the Nth
//! ".jpg" in name order. Nothing in the row identifies its photo, so if the
//! counts diverge the tail of the file gets empty photo columns.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use hdishp::read::hdi;
//!
//! let extraction = hdi::extract_dir(
//!     Path::new("surveys"),
//!     Path::new("/srv/photos"),
//!     encoding::all::UTF_8,
//! ).unwrap();
//!
//! for record in extraction.records.iter() {
//!     println!("{} {} {}", record.photo_name, record.b, record.l);
//! }
//! for warning in extraction.warnings.iter() {
//!     eprintln!("{}", warning);
//! }
//! ```

use std::cmp::Ordering;
use std::env;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use encoding::{DecoderTrap, Encoding, EncodingRef};
use itertools::Itertools;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Rows with fewer fields than this are skipped.
pub const MIN_FIELDS: usize = 15;

/// Name of the photo directory that sits next to each ".hdi" file.
pub const PHOTO_DIR_NAME: &str = "CCD";

const H_INDEX: usize = 11;
const L_INDEX: usize = 12;
const B_INDEX: usize = 13;
const HEADING_INDEX: usize = 14;

lazy_static! {
    static ref ROAD_NAME_RE: Regex = Regex::new(r"[\(（](.*?)[\)）]").unwrap();
}

/// One output row: a photo and where it was taken.
///
/// Coordinates stay text until the Shapefile step, so the CSV carries them
/// exactly as the survey log wrote them. Field names double as the CSV
/// header.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HdiRecord {
    #[serde(rename = "FILE_NAME")]
    pub photo_name: String,
    #[serde(rename = "FILE_PATH")]
    pub photo_path: String,
    #[serde(rename = "ROAD_NAME")]
    pub road_name: String,
    /// Latitude
    #[serde(rename = "B")]
    pub b: String,
    /// Longitude
    #[serde(rename = "L")]
    pub l: String,
    /// Height
    #[serde(rename = "H")]
    pub h: String,
    #[serde(rename = "HEADING")]
    pub heading: String,
}

/// Something odd about the input that did not stop the extraction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HdiWarning {
    MissingPhotoDir { hdi_path: PathBuf },
    ShortRow { hdi_path: PathBuf, line: u64, n_fields: usize, row: String },
    PhotosExhausted { hdi_path: PathBuf },
    NoRelativePath { photo_path: PathBuf, base_path: PathBuf },
}

impl fmt::Display for HdiWarning {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            HdiWarning::MissingPhotoDir { ref hdi_path } => {
                write!(f, "no {} directory next to {}", PHOTO_DIR_NAME, hdi_path.display())
            }
            HdiWarning::ShortRow { ref hdi_path, line, n_fields, ref row } => {
                write!(f, "{}:{}: skipped row with {} fields (need {}): {}", hdi_path.display(), line, n_fields, MIN_FIELDS, row)
            }
            HdiWarning::PhotosExhausted { ref hdi_path } => {
                write!(f, "{} has more rows than {} has photos", hdi_path.display(), PHOTO_DIR_NAME)
            }
            HdiWarning::NoRelativePath { ref photo_path, ref base_path } => {
                write!(f, "cannot express {} relative to {}; using the full path", photo_path.display(), base_path.display())
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HdiError {
    #[error("{path:?} is not a directory")]
    NotADirectory { path: PathBuf },

    #[error("I/O error at {path:?}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("could not decode {path:?}: {message}")]
    Decode { path: PathBuf, message: String },

    #[error("could not parse {path:?}: {source}")]
    Csv { path: PathBuf, source: csv::Error },

    #[error("could not walk {path:?}: {source}")]
    Walk { path: PathBuf, source: walkdir::Error },
}

/// Records and warnings gathered from one or more ".hdi" files.
#[derive(Debug, Default)]
pub struct Extraction {
    pub records: Vec<HdiRecord>,
    pub warnings: Vec<HdiWarning>,
    pub n_files: usize,
}

impl Extraction {
    /// Appends another file's results, keeping encounter order.
    pub fn append(&mut self, mut other: Extraction) {
        self.records.append(&mut other.records);
        self.warnings.append(&mut other.warnings);
        self.n_files += other.n_files;
    }

    fn warn(&mut self, warning: HdiWarning) {
        warn!("{}", warning);
        self.warnings.push(warning);
    }
}

/// Returns the first parenthesized part of a directory name.
///
/// ASCII and full-width parentheses both count, and may be mixed. Returns an
/// empty string when there is no such part.
///
/// ```
/// use hdishp::read::hdi::road_name;
///
/// assert_eq!("G105", road_name("20240312_01(G105)"));
/// assert_eq!("", road_name("20240312_01"));
/// ```
pub fn road_name(dir_name: &str) -> String {
    match ROAD_NAME_RE.captures(dir_name) {
        Some(captures) => captures.get(1).map(|m| m.as_str().to_string()).unwrap_or_default(),
        None => String::new(),
    }
}

/// Lists ".jpg" file names (case-insensitive) in `dir`, sorted.
pub fn list_photos(dir: &Path) -> io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.to_lowercase().ends_with(".jpg") {
            names.push(name);
        }
    }
    Ok(names.into_iter().sorted().collect())
}

/// Makes `path` absolute against the working directory and drops "." and
/// ".." components without touching the filesystem.
fn lexical_absolute(path: &Path) -> Option<PathBuf> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir().ok()?.join(path)
    };

    let mut ret = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if let Some(Component::Normal(_)) = ret.components().next_back() {
                    ret.pop();
                }
            }
            other => ret.push(other.as_os_str()),
        }
    }
    Some(ret)
}

/// Computes `path` relative to `base`, purely lexically.
///
/// Returns None when the two paths have different prefixes (e.g. Windows
/// drive letters), since no relative path joins them.
pub fn relative_path(path: &Path, base: &Path) -> Option<PathBuf> {
    let path = lexical_absolute(path)?;
    let base = lexical_absolute(base)?;

    let path_parts: Vec<Component> = path.components().collect();
    let base_parts: Vec<Component> = base.components().collect();

    if let (Some(&Component::Prefix(a)), Some(&Component::Prefix(b))) = (path_parts.first(), base_parts.first()) {
        if a != b {
            return None;
        }
    }

    let n_common = path_parts.iter()
        .zip(base_parts.iter())
        .take_while(|&(a, b)| a == b)
        .count();
    if n_common == 0 {
        return None;
    }

    let mut ret = PathBuf::new();
    for _ in n_common..base_parts.len() {
        ret.push("..");
    }
    for part in &path_parts[n_common..] {
        ret.push(part.as_os_str());
    }
    if ret.as_os_str().is_empty() {
        ret.push(".");
    }
    Some(ret)
}

/// Reads one ".hdi" file and pairs its rows with the photos in the sibling
/// "CCD" directory.
///
/// `base_path` is what photo paths are made relative to. `encoding` decodes
/// the file; undecodable bytes become U+FFFD.
///
/// Short rows, a missing "CCD" directory and running out of photos are
/// warnings, not errors: they end up in `Extraction::warnings`.
pub fn extract_file(hdi_path: &Path, base_path: &Path, encoding: EncodingRef) -> Result<Extraction, HdiError> {
    let hdi_dir = hdi_path.parent().unwrap_or_else(|| Path::new(""));
    let ccd_dir = hdi_dir.join(PHOTO_DIR_NAME);

    let mut extraction = Extraction { n_files: 1, ..Extraction::default() };

    let photos = if ccd_dir.is_dir() {
        list_photos(&ccd_dir).map_err(|source| HdiError::Io { path: ccd_dir.clone(), source })?
    } else {
        extraction.warn(HdiWarning::MissingPhotoDir { hdi_path: hdi_path.to_path_buf() });
        Vec::new()
    };

    let road = hdi_dir.file_name()
        .map(|name| road_name(&name.to_string_lossy()))
        .unwrap_or_default();

    let bytes = fs::read(hdi_path).map_err(|source| HdiError::Io { path: hdi_path.to_path_buf(), source })?;
    let text = encoding.decode(&bytes, DecoderTrap::Replace)
        .map_err(|message| HdiError::Decode { path: hdi_path.to_path_buf(), message: message.into_owned() })?;

    // Blank lines never reach the loop: the reader drops them.
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut next_photo = 0;
    let mut exhausted_warning_issued = false;

    for result in reader.records() {
        let row = result.map_err(|source| HdiError::Csv { path: hdi_path.to_path_buf(), source })?;

        if row.len() < MIN_FIELDS {
            extraction.warn(HdiWarning::ShortRow {
                hdi_path: hdi_path.to_path_buf(),
                line: row.position().map(|p| p.line()).unwrap_or(0),
                n_fields: row.len(),
                row: row.iter().join("\t"),
            });
            continue;
        }

        let (photo_name, photo_path) = match photos.get(next_photo) {
            Some(name) => {
                next_photo += 1;
                let full_path = ccd_dir.join(name);
                let shown_path = match relative_path(&full_path, base_path) {
                    Some(relative) => relative,
                    None => {
                        extraction.warn(HdiWarning::NoRelativePath {
                            photo_path: full_path.clone(),
                            base_path: base_path.to_path_buf(),
                        });
                        full_path
                    }
                };
                (name.clone(), shown_path.to_string_lossy().into_owned())
            }
            None => {
                if !exhausted_warning_issued {
                    extraction.warn(HdiWarning::PhotosExhausted { hdi_path: hdi_path.to_path_buf() });
                    exhausted_warning_issued = true;
                }
                (String::new(), String::new())
            }
        };

        extraction.records.push(HdiRecord {
            photo_name: photo_name,
            photo_path: photo_path,
            road_name: road.clone(),
            b: row[B_INDEX].to_string(),
            l: row[L_INDEX].to_string(),
            h: row[H_INDEX].to_string(),
            heading: row[HEADING_INDEX].to_string(),
        });
    }

    debug!(path = %hdi_path.display(), n_records = extraction.records.len(), n_photos = photos.len(), "read hdi file");
    Ok(extraction)
}

/// Like `os.walk` order: a directory's files come before its subdirectories,
/// each group sorted by name.
fn files_first(a: &walkdir::DirEntry, b: &walkdir::DirEntry) -> Ordering {
    a.file_type().is_dir().cmp(&b.file_type().is_dir())
        .then_with(|| a.file_name().cmp(b.file_name()))
}

/// Extracts every ".hdi" file under `input_dir`, recursively.
///
/// Records accumulate in walk order: within a directory, files come before
/// subdirectories and both are sorted by name.
pub fn extract_dir(input_dir: &Path, base_path: &Path, encoding: EncodingRef) -> Result<Extraction, HdiError> {
    if !input_dir.is_dir() {
        return Err(HdiError::NotADirectory { path: input_dir.to_path_buf() });
    }

    let mut extraction = Extraction::default();

    for entry in WalkDir::new(input_dir).sort_by(files_first) {
        let entry = entry.map_err(|source| HdiError::Walk { path: input_dir.to_path_buf(), source })?;
        if entry.file_type().is_file() && entry.file_name().to_string_lossy().ends_with(".hdi") {
            extraction.append(extract_file(entry.path(), base_path, encoding)?);
        }
    }

    info!(
        input_dir = %input_dir.display(),
        n_files = extraction.n_files,
        n_records = extraction.records.len(),
        n_warnings = extraction.warnings.len(),
        "extracted hdi records"
    );
    Ok(extraction)
}
