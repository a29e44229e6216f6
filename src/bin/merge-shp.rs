//! Concatenates Shapefiles with identical fields and CRS into one.

use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use tracing::info;

use hdishp::config;
use hdishp::logging;
use hdishp::{collect_inputs, merge_shapefiles};

/// Merge Shapefiles that share a schema and a CRS.
#[derive(Parser)]
#[command(name = "merge-shp", version, long_about = None)]
struct Cli {
    /// Merge every ".shp" under this directory, recursively. Takes
    /// precedence over INPUTS.
    #[arg(long = "input_dir")]
    input_dir: Option<PathBuf>,

    /// Shapefiles to merge, in order.
    inputs: Vec<PathBuf>,

    /// Output ".shp" path.
    #[arg(short, long)]
    output: PathBuf,

    /// Config file (default: hdishp.toml in the working directory, if any).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Text encoding of the ".dbf" attributes.
    #[arg(long)]
    encoding: Option<String>,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = config::load(cli.config.as_deref())?;
    let label = cli.encoding.unwrap_or(config.shapefile.encoding);
    let encoding = config::resolve_encoding(&label)?;

    let inputs = collect_inputs(cli.input_dir.as_deref(), &cli.inputs)?;
    let n_features = merge_shapefiles(&inputs, &cli.output, encoding)
        .wrap_err_with(|| format!("merging into {:?} failed", cli.output))?;

    info!(n_inputs = inputs.len(), n_features = n_features, output = %cli.output.display(), "done");
    Ok(())
}
