//! Merges every ".hdi" survey log under a directory into one CSV, then
//! converts that CSV into a WGS84 point Shapefile.

use std::env;
use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use tracing::{info, warn};

use hdishp::config;
use hdishp::logging;
use hdishp::{run_hdi_processing, HdiOptions};

/// Convert ".hdi" survey logs to a CSV and a point Shapefile.
#[derive(Parser)]
#[command(name = "hdi2shp", version, long_about = None)]
struct Cli {
    /// Directory searched recursively for ".hdi" files (default: current directory).
    #[arg(long = "input_dir")]
    input_dir: Option<PathBuf>,

    /// Photo paths are written relative to this directory.
    #[arg(long = "base_path")]
    base_path: Option<PathBuf>,

    /// Output file stem; ".csv" and ".shp" land in the input directory.
    #[arg(long = "output_name")]
    output_name: Option<String>,

    /// Config file (default: hdishp.toml in the working directory, if any).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Text encoding of the ".hdi" files.
    #[arg(long)]
    encoding: Option<String>,

    /// Text encoding of the ".dbf" attributes.
    #[arg(long = "shp_encoding")]
    shp_encoding: Option<String>,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = config::load(cli.config.as_deref())?;

    let input_dir = match cli.input_dir {
        Some(dir) => dir,
        None => env::current_dir().wrap_err("could not determine the current directory")?,
    };
    let hdi_label = cli.encoding.unwrap_or(config.hdi.encoding);
    let dbf_label = cli.shp_encoding.unwrap_or(config.shapefile.encoding);

    let options = HdiOptions {
        input_dir: input_dir,
        base_path: cli.base_path.unwrap_or_else(|| PathBuf::from(config.hdi.base_path)),
        output_name: cli.output_name.unwrap_or(config.hdi.output_name),
        hdi_encoding: config::resolve_encoding(&hdi_label)?,
        dbf_encoding: config::resolve_encoding(&dbf_label)?,
    };

    let summary = run_hdi_processing(&options)
        .wrap_err_with(|| format!("processing {:?} failed", options.input_dir))?;

    if !summary.warnings.is_empty() {
        warn!(n_warnings = summary.warnings.len(), "finished with warnings");
    }
    info!(
        n_files = summary.n_files,
        n_points = summary.n_points,
        csv = %summary.csv_path.display(),
        shp = %summary.shp_path.display(),
        "done"
    );
    Ok(())
}
