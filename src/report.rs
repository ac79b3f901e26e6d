//! Machine-readable record of a cascade run.
use crate::catalog::{Stage, CATALOG_VERSION};
use crate::config::{Binning, FiberBMode};
use crate::relocate::write_atomic;
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub catalog_version: &'static str,
    pub binning: String,
    pub fiber_b: FiberBMode,
    pub stages: Vec<StageRecord>,
}

/// One engine invocation and what it left in the output directory.
#[derive(Debug, Clone, Serialize)]
pub struct StageRecord {
    pub stage: Stage,
    pub recipe: &'static str,
    pub manifest: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exposure: Option<String>,
    pub started_at_epoch_ms: u128,
    pub elapsed_ms: u128,
    pub products: Vec<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log: Option<PathBuf>,
}

impl RunReport {
    pub fn new(binning: Binning, fiber_b: FiberBMode) -> Self {
        Self {
            catalog_version: CATALOG_VERSION,
            binning: binning.to_string(),
            fiber_b,
            stages: Vec::new(),
        }
    }

    pub fn write(&self, path: &Path) -> io::Result<()> {
        let mut bytes = serde_json::to_vec_pretty(self)?;
        bytes.push(b'\n');
        write_atomic(path, &bytes)
    }
}
