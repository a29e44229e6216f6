//! Configuration for the command-line tools.
//!
//! Settings come from an optional TOML file, `hdishp.toml` in the working
//! directory unless `--config` names another. CLI flags override config
//! file values, which override defaults.
//!
//! ```toml
//! [hdi]
//! base_path = "D:\\survey"
//! output_name = "merged_hdi_data"
//! encoding = "gbk"
//!
//! [shapefile]
//! encoding = "utf-8"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use encoding::label::encoding_from_whatwg_label;
use encoding::EncodingRef;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Config file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "hdishp.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read config {path:?}: {source}")]
    Io { path: PathBuf, source: std::io::Error },

    #[error("failed to parse {path:?}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("unknown encoding {0:?}")]
    UnknownEncoding(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub hdi: HdiConfig,

    #[serde(default)]
    pub shapefile: ShapefileConfig,
}

/// `[hdi]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HdiConfig {
    /// Photo paths in the CSV are relative to this.
    #[serde(default = "default_base_path")]
    pub base_path: String,

    /// Output file stem; ".csv" and ".shp" are appended.
    #[serde(default = "default_output_name")]
    pub output_name: String,

    /// Text encoding of the ".hdi" files (WHATWG label).
    #[serde(default = "default_encoding")]
    pub encoding: String,
}

impl Default for HdiConfig {
    fn default() -> Self {
        Self {
            base_path: default_base_path(),
            output_name: default_output_name(),
            encoding: default_encoding(),
        }
    }
}

/// `[shapefile]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShapefileConfig {
    /// Encoding of ".dbf" attribute text (WHATWG label).
    #[serde(default = "default_encoding")]
    pub encoding: String,
}

impl Default for ShapefileConfig {
    fn default() -> Self {
        Self {
            encoding: default_encoding(),
        }
    }
}

fn default_base_path() -> String {
    r"E:\Code".into()
}
fn default_output_name() -> String {
    "merged_hdi_data".into()
}
fn default_encoding() -> String {
    "utf-8".into()
}

/// Loads `path` if given, else `hdishp.toml` from the working directory if
/// it exists, else defaults.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    match path {
        Some(path) => load_from(path),
        None => {
            let path = Path::new(CONFIG_FILE_NAME);
            if path.is_file() {
                load_from(path)
            } else {
                debug!(?path, "config file not found, using defaults");
                Ok(Config::default())
            }
        }
    }
}

/// Loads the config from a specific file path.
pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;

    toml::from_str(&content).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Looks up a text encoding by WHATWG label ("utf-8", "gbk", "latin1"...).
pub fn resolve_encoding(label: &str) -> Result<EncodingRef, ConfigError> {
    encoding_from_whatwg_label(label.trim()).ok_or_else(|| ConfigError::UnknownEncoding(label.to_string()))
}
