//! Validated run configuration.
//!
//! Everything downstream receives a `RunConfig` explicitly; nothing reads
//! process-wide state after this point.
use crate::cli::RootArgs;
use anyhow::{anyhow, ensure, Context, Result};
use serde::Serialize;
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable consulted when `--engine` is not given.
pub const ENGINE_ENV_VAR: &str = "ESOREX_COMMAND";
/// Engine command used when neither the flag nor the env var is set.
pub const DEFAULT_ENGINE: &str = "esorex";

/// Detector binning factors used to filter raw frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Binning {
    pub x: u32,
    pub y: u32,
}

impl Binning {
    /// Binning modes the cascade has static calibrations for.
    pub const SUPPORTED: [Binning; 3] = [
        Binning { x: 1, y: 1 },
        Binning { x: 2, y: 1 },
        Binning { x: 4, y: 2 },
    ];

    pub fn matches(&self, binx: i64, biny: i64) -> bool {
        i64::from(self.x) == binx && i64::from(self.y) == biny
    }
}

impl FromStr for Binning {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        let invalid = || anyhow!("binning should be one of 1x1, 2x1 or 4x2 (got {value:?})");
        let (x, y) = value.split_once('x').ok_or_else(invalid)?;
        let parsed = Binning {
            x: x.parse().map_err(|_| invalid())?,
            y: y.parse().map_err(|_| invalid())?,
        };
        if !Self::SUPPORTED.contains(&parsed) || value != parsed.to_string() {
            return Err(invalid());
        }
        Ok(parsed)
    }
}

impl fmt::Display for Binning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.x, self.y)
    }
}

/// What the secondary fiber observed during the science exposures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FiberBMode {
    Sky,
    FabryPerot,
}

impl FiberBMode {
    /// Empty or `sky` (any case) selects sky; every other value, padded
    /// ones included, selects FP.
    pub fn from_arg(value: &str) -> Self {
        if value.is_empty() || value.eq_ignore_ascii_case("sky") {
            FiberBMode::Sky
        } else {
            FiberBMode::FabryPerot
        }
    }
}

/// Engine program plus any leading arguments from the command line string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl EngineCommand {
    pub fn parse(command: &str) -> Result<Self> {
        let mut words = shell_words::split(command)
            .with_context(|| format!("engine command {command:?} could not be parsed"))?
            .into_iter();
        let program = words
            .next()
            .ok_or_else(|| anyhow!("engine command {command:?} is empty"))?;
        Ok(Self {
            program,
            args: words.collect(),
        })
    }
}

/// Resolve the engine command: explicit arg > env var > default.
pub fn resolve_engine_command(explicit: Option<&str>, from_env: Option<String>) -> String {
    explicit
        .map(str::to_string)
        .or(from_env)
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_ENGINE.to_string())
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub work_dir: PathBuf,
    pub binning: Binning,
    pub fiber_b: FiberBMode,
    pub engine: EngineCommand,
    pub manifests_only: bool,
}

impl RunConfig {
    /// Validate CLI arguments, creating the output directory when absent.
    pub fn from_args(args: &RootArgs, engine_env: Option<String>) -> Result<Self> {
        ensure!(
            args.input_dir.is_dir(),
            "input directory {} does not exist or is not a directory",
            args.input_dir.display()
        );
        let input_dir = normalized(&args.input_dir);
        ensure!(
            input_dir != normalized(&args.output_dir),
            "input and output directories must differ ({})",
            args.input_dir.display()
        );
        let binning: Binning = args.binning.parse()?;
        let fiber_b = FiberBMode::from_arg(&args.fiber_b);

        let command = resolve_engine_command(args.engine.as_deref(), engine_env);
        let engine = EngineCommand::parse(&command)?;
        if !args.manifests_only {
            which::which(&engine.program)
                .with_context(|| format!("engine program {:?} not found on PATH", engine.program))?;
        }

        if !args.output_dir.is_dir() {
            tracing::info!(
                path = %args.output_dir.display(),
                "output directory does not exist; creating it"
            );
            fs::create_dir_all(&args.output_dir).with_context(|| {
                format!("create output directory {}", args.output_dir.display())
            })?;
        }
        let output_dir = normalized(&args.output_dir);

        let work_dir = match &args.work_dir {
            Some(dir) => {
                fs::create_dir_all(dir)
                    .with_context(|| format!("work directory {} is unusable", dir.display()))?;
                normalized(dir)
            }
            None => env::current_dir().context("work directory . is unusable")?,
        };
        ensure!(
            work_dir != input_dir && work_dir != output_dir,
            "work directory {} must differ from the input and output directories \
             (scratch cleanup deletes *fits there)",
            work_dir.display()
        );

        Ok(Self {
            input_dir,
            output_dir,
            work_dir,
            binning,
            fiber_b,
            engine,
            manifests_only: args.manifests_only,
        })
    }
}

fn normalized(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    match env::current_dir() {
        Ok(cwd) if path.is_relative() => cwd.join(path),
        _ => path.to_path_buf(),
    }
}
