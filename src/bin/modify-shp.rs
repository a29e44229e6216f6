//! Sets the "data" attribute of every feature in a Shapefile.

use std::env;
use std::io;
use std::io::Write;
use std::path::PathBuf;
use std::process;

use hdishp::config;
use hdishp::logging;
use hdishp::modify_shapefile;

fn usage(program: &str) -> ! {
    let _ = writeln!(&mut io::stderr(), "Usage: {} <INPUT_SHP> <OUTPUT_SHP> <VALUE> [ENCODING]", program);
    process::exit(1);
}

fn fail(message: &dyn std::fmt::Display) -> ! {
    let _ = writeln!(&mut io::stderr(), "{}", message);
    process::exit(1);
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("modify-shp");

    if args.len() != 4 && args.len() != 5 {
        usage(program);
    }

    logging::init(0);

    let input = PathBuf::from(&args[1]);
    let output = PathBuf::from(&args[2]);
    let value = &args[3];
    let label = args.get(4).map(String::as_str).unwrap_or("utf-8");

    let encoding = match config::resolve_encoding(label) {
        Ok(encoding) => encoding,
        Err(err) => fail(&err),
    };

    match modify_shapefile(&input, &output, value, encoding) {
        Err(err) => fail(&err),
        Ok(report) => {
            if let Some(ref warning) = report.warning {
                let _ = writeln!(&mut io::stderr(), "Warning: {}", warning);
            }
            println!("Set {} on {} features, wrote {}", report.column, report.n_features, output.display());
        }
    }
}
