extern crate byteorder;
extern crate encoding;
extern crate itertools;
#[macro_use] extern crate lazy_static;
extern crate regex;
extern crate shapefile as shapefile_rs;

pub mod config;
pub mod convert;
pub mod logging;
pub mod merge;
pub mod modify;
pub mod read;
pub mod write;

pub use convert::{run_hdi_processing, ConvertError, ConvertSummary, HdiOptions};
pub use merge::{collect_inputs, merge_shapefiles, MergeError};
pub use modify::{modify_shapefile, ModifyError, ModifyReport};
