//! Input directory inventory: raw frames and static calibrations.
use crate::catalog::{
    BINX_KEY, BINY_KEY, DPR_TYPE_KEY, EXPTIME_KEY, MASK_TABLE_TAG, PRO_CATG_KEY,
    RAW_FRAME_PATTERN, STATIC_FILE_PATTERN,
};
use crate::fits::{FitsError, FitsHeader};
use anyhow::{Context, Result};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

/// One raw exposure and the header fields classification needs.
#[derive(Debug, Clone, PartialEq)]
pub struct InputFrame {
    pub path: PathBuf,
    pub dpr_type: String,
    pub exptime: f64,
    pub binx: i64,
    pub biny: i64,
}

impl InputFrame {
    pub fn from_header(header: &FitsHeader) -> Result<Self, FitsError> {
        Ok(Self {
            path: header.path().to_path_buf(),
            dpr_type: header.string(DPR_TYPE_KEY)?.to_string(),
            exptime: header.float(EXPTIME_KEY)?,
            binx: header.integer(BINX_KEY)?,
            biny: header.integer(BINY_KEY)?,
        })
    }
}

/// Static calibrations keyed by `ESO PRO CATG`.
///
/// Single-valued categories keep the last file seen; `MASK_TABLE` collects
/// every file.
#[derive(Debug, Clone, Default)]
pub struct StaticCalibrations {
    by_tag: BTreeMap<String, PathBuf>,
    mask_tables: BTreeSet<PathBuf>,
}

impl StaticCalibrations {
    /// Record a file; returns the file it displaced, if any.
    pub fn insert(&mut self, tag: &str, path: PathBuf) -> Option<PathBuf> {
        if tag == MASK_TABLE_TAG {
            self.mask_tables.insert(path);
            return None;
        }
        self.by_tag.insert(tag.to_string(), path)
    }

    pub fn get(&self, tag: &str) -> Option<&Path> {
        self.by_tag.get(tag).map(PathBuf::as_path)
    }

    /// Members of a set-valued category, in path order.
    pub fn set_members(&self, tag: &str) -> Vec<&Path> {
        if tag == MASK_TABLE_TAG {
            self.mask_tables.iter().map(PathBuf::as_path).collect()
        } else {
            self.get(tag).into_iter().collect()
        }
    }

    pub fn len(&self) -> usize {
        self.by_tag.len() + self.mask_tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Everything found in the input directory, in sorted file-name order.
#[derive(Debug, Clone, Default)]
pub struct InputInventory {
    pub frames: Vec<InputFrame>,
    pub statics: StaticCalibrations,
}

/// Read headers of every raw frame and static calibration in `dir`.
pub fn scan_input_dir(dir: &Path) -> Result<InputInventory> {
    let raw_pattern = Regex::new(RAW_FRAME_PATTERN).context("compile raw frame pattern")?;
    let static_pattern =
        Regex::new(STATIC_FILE_PATTERN).context("compile static calibration pattern")?;
    let mut raw_paths = Vec::new();
    let mut static_paths = Vec::new();

    let entries =
        fs::read_dir(dir).with_context(|| format!("read input directory {}", dir.display()))?;
    for entry in entries {
        let path = entry
            .with_context(|| format!("read input directory {}", dir.display()))?
            .path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        if raw_pattern.is_match(name) {
            raw_paths.push(path);
        } else if static_pattern.is_match(name) {
            static_paths.push(path);
        }
    }
    raw_paths.sort();
    static_paths.sort();

    let mut inventory = InputInventory::default();
    for path in static_paths {
        let header = FitsHeader::read(&path)?;
        let tag = header.string(PRO_CATG_KEY)?;
        if let Some(dropped) = inventory.statics.insert(tag, path.clone()) {
            tracing::warn!(
                tag,
                kept = %path.display(),
                dropped = %dropped.display(),
                "duplicate static calibration category; keeping the last file"
            );
        }
    }
    for path in raw_paths {
        let frame = InputFrame::from_header(&FitsHeader::read(&path)?)?;
        tracing::debug!(
            file = %display_name(&frame.path),
            dpr_type = %frame.dpr_type,
            binning = %format!("{}x{}", frame.binx, frame.biny),
            exptime = frame.exptime,
            "raw frame"
        );
        inventory.frames.push(frame);
    }
    if inventory.statics.is_empty() {
        tracing::warn!(dir = %dir.display(), "no static calibration files found");
    }
    tracing::info!(
        raw_frames = inventory.frames.len(),
        static_files = inventory.statics.len(),
        dir = %dir.display(),
        "scanned input directory"
    );
    Ok(inventory)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
