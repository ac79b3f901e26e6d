//! SOF manifests: structured (path, tag) records and the per-stage builder.
//!
//! Building is split in two phases. Everything is classified, validated and
//! assembled in memory first; files are only written once every check has
//! passed, so a failed build leaves no partial set of manifests behind.
use crate::catalog::{FrameGroup, Source, Stage};
use crate::classify::{check_static_calibrations, classify_frames, ClassifiedFrames, ClassifyError};
use crate::config::{Binning, FiberBMode};
use crate::frames::{scan_input_dir, StaticCalibrations};
use crate::paths::OutputPaths;
use crate::relocate::write_atomic;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Scan(#[from] anyhow::Error),
    #[error(transparent)]
    Classify(#[from] ClassifyError),
    #[error("write manifest {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One SOF line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub path: PathBuf,
    pub tag: String,
}

impl ManifestEntry {
    pub fn new(path: impl Into<PathBuf>, tag: &str) -> Self {
        Self {
            path: path.into(),
            tag: tag.to_string(),
        }
    }

    /// Parse a `<path> <tag>` line.
    ///
    /// The tag is the last whitespace-separated field and the path is
    /// everything before it, so paths containing spaces survive.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        let split = line.rfind(char::is_whitespace)?;
        let path = line[..split].trim_end();
        let tag = line[split..].trim_start();
        if path.is_empty() || tag.is_empty() {
            return None;
        }
        Some(Self::new(path, tag))
    }
}

impl fmt::Display for ManifestEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.path.display(), self.tag)
    }
}

/// Ordered inputs of one engine invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|entry| format!("{entry}\n"))
            .collect()
    }
}

/// Result of a successful build.
#[derive(Debug, Clone)]
pub struct ManifestSet {
    /// One manifest per stage, in execution order. The science entry holds
    /// only the shared suffix.
    pub stages: Vec<(Stage, Manifest)>,
    /// One single-entry fragment per science exposure.
    pub science_fragments: Vec<ManifestEntry>,
}

impl ManifestSet {
    /// Write every manifest under the output directory; returns the files written.
    pub fn write(&self, paths: &OutputPaths) -> Result<Vec<PathBuf>, BuildError> {
        let mut written = Vec::with_capacity(self.stages.len() + 1);
        for (stage, manifest) in &self.stages {
            let path = paths.manifest_path(*stage);
            write_manifest(&path, &manifest.render())?;
            written.push(path);
        }
        let fragments: String = self
            .science_fragments
            .iter()
            .map(|entry| format!("{entry}\n"))
            .collect();
        let path = paths.science_fragments_path();
        write_manifest(&path, &fragments)?;
        written.push(path);
        Ok(written)
    }
}

fn write_manifest(path: &Path, text: &str) -> Result<(), BuildError> {
    write_atomic(path, text.as_bytes()).map_err(|source| BuildError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Scan `input_dir`, classify, and write one manifest per stage.
pub fn build_manifests(
    input_dir: &Path,
    paths: &OutputPaths,
    binning: Binning,
    fiber_b: FiberBMode,
) -> Result<ManifestSet, BuildError> {
    let inventory = scan_input_dir(input_dir)?;
    let classified = classify_frames(&inventory.frames, binning, fiber_b)?;
    check_static_calibrations(&inventory.statics)?;
    let set = assemble(&classified, &inventory.statics, paths);
    let written = set.write(paths)?;
    tracing::info!(
        manifests = written.len(),
        science_exposures = set.science_fragments.len(),
        dir = %paths.root().display(),
        "wrote manifests"
    );
    Ok(set)
}

/// Resolve every stage template against validated inputs.
pub fn assemble(
    classified: &ClassifiedFrames,
    statics: &StaticCalibrations,
    paths: &OutputPaths,
) -> ManifestSet {
    let mut stages = Vec::with_capacity(Stage::ORDER.len());
    let mut science_fragments = Vec::new();
    for stage in Stage::ORDER {
        let spec = stage.spec();
        let mut manifest = Manifest::default();
        for group in spec.groups {
            let entries = group_entries(classified, *group);
            if *group == FrameGroup::Science {
                science_fragments.extend(entries);
            } else {
                manifest.entries.extend(entries);
            }
        }
        for source in spec.template {
            match source {
                Source::Static(tag) => {
                    if let Some(path) = statics.get(tag) {
                        manifest.entries.push(ManifestEntry::new(path, tag));
                    }
                }
                Source::StaticSet(tag) => {
                    for path in statics.set_members(tag) {
                        manifest.entries.push(ManifestEntry::new(path, tag));
                    }
                }
                Source::Product { file, tag } => {
                    manifest
                        .entries
                        .push(ManifestEntry::new(paths.product_path(file), tag));
                }
            }
        }
        tracing::debug!(%stage, entries = manifest.entries.len(), "assembled manifest");
        stages.push((stage, manifest));
    }
    ManifestSet {
        stages,
        science_fragments,
    }
}

fn group_entries(classified: &ClassifiedFrames, group: FrameGroup) -> Vec<ManifestEntry> {
    classified
        .group(group)
        .map(|group| {
            group
                .frames
                .iter()
                .map(|path| ManifestEntry::new(path, group.rule.tag))
                .collect()
        })
        .unwrap_or_default()
}
