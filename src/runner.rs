//! Stage execution: pre-flight, engine invocation, relocation, cleanup.
use crate::catalog::{Stage, StageSpec, ENGINE_LOG, PRODUCT_PREFIX};
use crate::config::{Binning, FiberBMode};
use crate::engine::{EngineError, RecipeInvocation, ReductionEngine};
use crate::manifest::ManifestEntry;
use crate::paths::OutputPaths;
use crate::relocate::{move_file, scrub_scratch, write_atomic};
use crate::report::{RunReport, StageRecord};
use crate::util::{display_path, file_stem, now_epoch_ms};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PreflightError {
    #[error("read manifest {}", manifest.display())]
    Read {
        manifest: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{}:{line}: expected `<path> <tag>`, got {text:?}", manifest.display())]
    Malformed {
        manifest: PathBuf,
        line: usize,
        text: String,
    },
    #[error("manifest {} lists no inputs", manifest.display())]
    Empty { manifest: PathBuf },
    #[error(
        "input {} listed in {} does not exist\n\
         check:\n  \
         - is it a static calibration file that was renamed?\n  \
         - did the stage producing it run?\n  \
         - did that stage place its products in the output directory?\n  \
         - was the manifest built from the right input directory?",
        path.display(),
        manifest.display()
    )]
    MissingInput { path: PathBuf, manifest: PathBuf },
}

#[derive(Debug, Error)]
pub enum StageError {
    #[error("{stage}: pre-flight check failed")]
    Preflight {
        stage: Stage,
        #[source]
        source: PreflightError,
    },
    #[error("{stage}: engine run failed")]
    Engine {
        stage: Stage,
        #[source]
        source: EngineError,
    },
    #[error("{stage}: engine produced no {product} in {}", work_dir.display())]
    ProductMissing {
        stage: Stage,
        product: &'static str,
        work_dir: PathBuf,
    },
    #[error("{stage}: move {} to {}", from.display(), to.display())]
    Relocate {
        stage: Stage,
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{stage}: clean scratch files in {}", work_dir.display())]
    Cleanup {
        stage: Stage,
        work_dir: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("prepare science manifest {}", path.display())]
    ScienceManifest {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("write run report {}", path.display())]
    Report {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Parse `manifest` and confirm every listed input exists.
pub fn preflight(manifest: &Path) -> Result<Vec<ManifestEntry>, PreflightError> {
    let text = fs::read_to_string(manifest).map_err(|source| PreflightError::Read {
        manifest: manifest.to_path_buf(),
        source,
    })?;
    let mut entries = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let entry = ManifestEntry::parse(line).ok_or_else(|| PreflightError::Malformed {
            manifest: manifest.to_path_buf(),
            line: idx + 1,
            text: line.to_string(),
        })?;
        if !entry.path.is_file() {
            return Err(PreflightError::MissingInput {
                path: entry.path,
                manifest: manifest.to_path_buf(),
            });
        }
        entries.push(entry);
    }
    if entries.is_empty() {
        return Err(PreflightError::Empty {
            manifest: manifest.to_path_buf(),
        });
    }
    Ok(entries)
}

/// Runs stages in order against one engine and one working directory.
pub struct StageRunner<'a, E: ReductionEngine> {
    engine: &'a E,
    paths: OutputPaths,
    work_dir: PathBuf,
    fiber_b: FiberBMode,
    report: RunReport,
}

impl<'a, E: ReductionEngine> StageRunner<'a, E> {
    pub fn new(
        engine: &'a E,
        paths: OutputPaths,
        work_dir: PathBuf,
        binning: Binning,
        fiber_b: FiberBMode,
    ) -> Self {
        Self {
            engine,
            paths,
            work_dir,
            fiber_b,
            report: RunReport::new(binning, fiber_b),
        }
    }

    pub fn report(&self) -> &RunReport {
        &self.report
    }

    /// Run every stage; the first failure aborts the cascade.
    pub fn run_all(&mut self) -> Result<(), StageError> {
        for stage in Stage::ORDER {
            if stage == Stage::Science {
                self.run_science()?;
            } else {
                self.run_stage(stage)?;
            }
        }
        Ok(())
    }

    /// Run one calibration stage on its manifest.
    pub fn run_stage(&mut self, stage: Stage) -> Result<(), StageError> {
        let manifest = self.paths.manifest_path(stage);
        self.execute(stage, &manifest, None)
    }

    /// Run the science recipe once per exposure; returns how many ran.
    ///
    /// Each run gets the shared suffix followed by the exposure's own line.
    pub fn run_science(&mut self) -> Result<usize, StageError> {
        let fragments_path = self.paths.science_fragments_path();
        let fragments = read_science_input(&fragments_path)?;
        let suffix_path = self.paths.manifest_path(Stage::Science);
        let suffix = read_science_input(&suffix_path)?;
        let science_dir = self.paths.science_products_dir();
        fs::create_dir_all(&science_dir).map_err(|source| StageError::ScienceManifest {
            path: science_dir.clone(),
            source,
        })?;

        let lines: Vec<(usize, &str)> = fragments
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .collect();
        if lines.is_empty() {
            tracing::warn!(
                manifest = %fragments_path.display(),
                "no science exposures to reduce"
            );
        }
        let combined_path = self.paths.science_combined_path();
        for (position, (idx, line)) in lines.iter().enumerate() {
            let entry = ManifestEntry::parse(line).ok_or_else(|| StageError::Preflight {
                stage: Stage::Science,
                source: PreflightError::Malformed {
                    manifest: fragments_path.clone(),
                    line: idx + 1,
                    text: line.to_string(),
                },
            })?;
            let exposure = file_stem(&entry.path);
            let mut combined = suffix.clone();
            if !combined.is_empty() && !combined.ends_with('\n') {
                combined.push('\n');
            }
            combined.push_str(&format!("{entry}\n"));
            write_atomic(&combined_path, combined.as_bytes()).map_err(|source| {
                StageError::ScienceManifest {
                    path: combined_path.clone(),
                    source,
                }
            })?;
            tracing::info!(
                exposure = %exposure,
                index = position + 1,
                total = lines.len(),
                "science exposure"
            );
            self.execute(Stage::Science, &combined_path, Some(&exposure))?;
        }
        Ok(lines.len())
    }

    fn execute(
        &mut self,
        stage: Stage,
        manifest: &Path,
        exposure: Option<&str>,
    ) -> Result<(), StageError> {
        let spec = stage.spec();
        let started_at_epoch_ms = now_epoch_ms();
        let timer = Instant::now();

        let inputs = preflight(manifest).map_err(|source| StageError::Preflight { stage, source })?;
        tracing::info!(
            %stage,
            recipe = spec.recipe,
            inputs = inputs.len(),
            manifest = %display_path(manifest, Some(self.paths.root())),
            "running stage"
        );
        self.clear_stale_outputs(spec)?;
        self.engine
            .run(&RecipeInvocation {
                recipe: spec.recipe,
                options: spec.options,
                manifest,
            })
            .map_err(|source| StageError::Engine { stage, source })?;

        let products = self.relocate_products(spec, exposure)?;
        let log = self.relocate_log(spec, exposure)?;
        if spec.clean_scratch {
            let removed = scrub_scratch(&self.work_dir).map_err(|source| StageError::Cleanup {
                stage,
                work_dir: self.work_dir.clone(),
                source,
            })?;
            tracing::debug!(%stage, removed, "cleaned scratch files");
        }

        let elapsed_ms = timer.elapsed().as_millis();
        tracing::info!(%stage, products = products.len(), elapsed_ms = elapsed_ms as u64, "stage complete");
        self.report.stages.push(StageRecord {
            stage,
            recipe: spec.recipe,
            manifest: manifest.to_path_buf(),
            exposure: exposure.map(str::to_string),
            started_at_epoch_ms,
            elapsed_ms,
            products,
            log,
        });
        let report_path = self.paths.report_path();
        self.report
            .write(&report_path)
            .map_err(|source| StageError::Report {
                path: report_path,
                source,
            })
    }

    /// Remove leftovers of an earlier run so only this invocation's output is
    /// relocated.
    fn clear_stale_outputs(&self, spec: &StageSpec) -> Result<(), StageError> {
        let names = spec
            .products
            .iter()
            .map(|product| product.file)
            .chain([ENGINE_LOG]);
        for name in names {
            let path = self.work_dir.join(name);
            if !path.is_file() {
                continue;
            }
            tracing::warn!(
                stage = %spec.stage,
                file = name,
                "removing stale engine output from the work directory"
            );
            fs::remove_file(&path).map_err(|source| StageError::Cleanup {
                stage: spec.stage,
                work_dir: self.work_dir.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// Move the products expected for the fiber mode; all must be present.
    fn relocate_products(
        &self,
        spec: &StageSpec,
        exposure: Option<&str>,
    ) -> Result<Vec<PathBuf>, StageError> {
        let expected: Vec<&'static str> = spec
            .products
            .iter()
            .filter(|product| product.expected_for(self.fiber_b))
            .map(|product| product.file)
            .collect();
        if let Some(missing) = expected
            .iter()
            .find(|file| !self.work_dir.join(file).is_file())
        {
            return Err(StageError::ProductMissing {
                stage: spec.stage,
                product: *missing,
                work_dir: self.work_dir.clone(),
            });
        }

        let mut moved = Vec::with_capacity(expected.len());
        for file in expected {
            let from = self.work_dir.join(file);
            let to = self.destination(file, exposure);
            move_file(&from, &to).map_err(|source| StageError::Relocate {
                stage: spec.stage,
                from: from.clone(),
                to: to.clone(),
                source,
            })?;
            tracing::debug!(
                product = file,
                to = %display_path(&to, Some(self.paths.root())),
                "relocated product"
            );
            moved.push(to);
        }
        Ok(moved)
    }

    fn relocate_log(
        &self,
        spec: &StageSpec,
        exposure: Option<&str>,
    ) -> Result<Option<PathBuf>, StageError> {
        let from = self.work_dir.join(ENGINE_LOG);
        if !from.is_file() {
            tracing::warn!(stage = %spec.stage, "engine left no {ENGINE_LOG}");
            return Ok(None);
        }
        let to = match exposure {
            Some(exposure) => self
                .paths
                .science_products_dir()
                .join(format!("{exposure}_{}", spec.log_name)),
            None => self.paths.root().join(spec.log_name),
        };
        move_file(&from, &to).map_err(|source| StageError::Relocate {
            stage: spec.stage,
            from: from.clone(),
            to: to.clone(),
            source,
        })?;
        Ok(Some(to))
    }

    /// Calibration products keep their names; science products move to the
    /// science directory as `<exposure>_<name without prefix>`.
    fn destination(&self, file: &str, exposure: Option<&str>) -> PathBuf {
        match exposure {
            Some(exposure) => {
                let short = file.strip_prefix(PRODUCT_PREFIX).unwrap_or(file);
                self.paths
                    .science_products_dir()
                    .join(format!("{exposure}_{short}"))
            }
            None => self.paths.product_path(file),
        }
    }
}

fn read_science_input(path: &Path) -> Result<String, StageError> {
    fs::read_to_string(path).map_err(|source| StageError::ScienceManifest {
        path: path.to_path_buf(),
        source,
    })
}
