//! CLI argument parsing for the reduction cascade.
//!
//! Arguments are kept as raw strings here; `config::RunConfig` owns the
//! validation so the error messages stay in one place.
use clap::Parser;
use std::path::PathBuf;

/// Binning used when the positional argument is omitted.
pub const DEFAULT_BINNING: &str = "2x1";

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "espresso-cascade",
    version,
    about = "Classify ESPRESSO frames, write SOF files and run the esorex calibration cascade",
    after_help = "Examples:\n  espresso-cascade /data/raw /data/reduced\n  espresso-cascade /data/raw /data/reduced 1x1 FP\n  espresso-cascade /data/raw /data/reduced 2x1 sky --manifests-only"
)]
pub struct RootArgs {
    /// Directory holding raw ESPRE*.fits frames and M.ESPRESSO*.fits static calibrations
    #[arg(value_name = "INPUT_DIR")]
    pub input_dir: PathBuf,

    /// Directory receiving SOF files, calibration products and science products
    #[arg(value_name = "OUTPUT_DIR")]
    pub output_dir: PathBuf,

    /// Detector binning (1x1, 2x1 or 4x2)
    #[arg(value_name = "BINNING", default_value = DEFAULT_BINNING)]
    pub binning: String,

    /// Fiber B mode: empty or "sky" for sky, anything else for Fabry-Perot
    #[arg(value_name = "FIBER_B", default_value = "")]
    pub fiber_b: String,

    /// Engine command line (overrides ESOREX_COMMAND; defaults to "esorex")
    #[arg(long, value_name = "CMD")]
    pub engine: Option<String>,

    /// Working directory the engine writes its products into
    #[arg(long, value_name = "DIR")]
    pub work_dir: Option<PathBuf>,

    /// Only classify frames and write SOF files; do not run any recipe
    #[arg(long)]
    pub manifests_only: bool,

    /// Log level (error, warn, info, debug, trace); RUST_LOG takes precedence
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    pub log_level: String,
}
