//! Typed paths into the output directory layout.
//!
//! Centralizing path construction keeps the manifest builder and the stage
//! runner in agreement about where SOF files and products live.
use crate::catalog::Stage;
use std::path::{Path, PathBuf};

/// Per-exposure fragments of the science SOF, one line per exposure.
pub const SCIENCE_FRAGMENTS_FILE: &str = "SCI_OBJ_part1.txt";
/// Per-exposure SOF assembled at run time from the shared suffix plus one fragment.
pub const SCIENCE_COMBINED_FILE: &str = "SCI_OBJ_combined.txt";
/// Subdirectory receiving the renamed science products.
pub const SCIENCE_PRODUCTS_DIR: &str = "SCIENCE_PRODUCTS";
/// Machine-readable run summary.
pub const REPORT_FILE: &str = "reduction_report.json";

/// Convenience wrapper for locating artifacts under the output directory.
#[derive(Debug, Clone)]
pub struct OutputPaths {
    root: PathBuf,
}

impl OutputPaths {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Return the SOF path the given stage is invoked with.
    ///
    /// For the science stage this is the shared suffix; the engine itself is
    /// run on [`OutputPaths::science_combined_path`].
    pub fn manifest_path(&self, stage: Stage) -> PathBuf {
        self.root.join(stage.spec().manifest_file)
    }

    pub fn science_fragments_path(&self) -> PathBuf {
        self.root.join(SCIENCE_FRAGMENTS_FILE)
    }

    pub fn science_combined_path(&self) -> PathBuf {
        self.root.join(SCIENCE_COMBINED_FILE)
    }

    pub fn science_products_dir(&self) -> PathBuf {
        self.root.join(SCIENCE_PRODUCTS_DIR)
    }

    /// Return where a calibration product lands once relocated.
    pub fn product_path(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }

    pub fn report_path(&self) -> PathBuf {
        self.root.join(REPORT_FILE)
    }
}
