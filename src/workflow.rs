use crate::config::RunConfig;
use crate::engine::EsorexEngine;
use crate::manifest::build_manifests;
use crate::paths::OutputPaths;
use crate::runner::StageRunner;
use anyhow::{Context, Result};

/// Build every manifest, then run the cascade unless only manifests were asked for.
pub fn run(config: &RunConfig) -> Result<()> {
    let paths = OutputPaths::new(config.output_dir.clone());
    tracing::info!(
        input = %config.input_dir.display(),
        output = %config.output_dir.display(),
        binning = %config.binning,
        fiber_b = ?config.fiber_b,
        "building manifests"
    );
    let manifests = build_manifests(&config.input_dir, &paths, config.binning, config.fiber_b)
        .with_context(|| format!("build manifests from {}", config.input_dir.display()))?;
    if config.manifests_only {
        tracing::info!(
            science_exposures = manifests.science_fragments.len(),
            "manifests written; skipping recipe runs"
        );
        return Ok(());
    }

    let engine = EsorexEngine::new(config.engine.clone(), config.work_dir.clone());
    let mut runner = StageRunner::new(
        &engine,
        paths.clone(),
        config.work_dir.clone(),
        config.binning,
        config.fiber_b,
    );
    runner.run_all().context("reduction cascade aborted")?;
    tracing::info!(
        invocations = runner.report().stages.len(),
        report = %paths.report_path().display(),
        science = %paths.science_products_dir().display(),
        "cascade complete"
    );
    Ok(())
}
