//! The external reduction engine behind a capability trait.
use crate::config::EngineCommand;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::time::Instant;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("spawn engine {program:?} for recipe {recipe}")]
    Spawn {
        program: String,
        recipe: String,
        #[source]
        source: std::io::Error,
    },
    #[error("engine recipe {recipe} failed ({status}) on {}", manifest.display())]
    NonZeroExit {
        recipe: String,
        manifest: PathBuf,
        status: ExitStatus,
    },
}

/// One recipe run: `<recipe> [options] <manifest>`.
#[derive(Debug, Clone, Copy)]
pub struct RecipeInvocation<'a> {
    pub recipe: &'a str,
    pub options: &'a [&'a str],
    pub manifest: &'a Path,
}

impl RecipeInvocation<'_> {
    pub fn args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(self.options.len() + 2);
        args.push(self.recipe.to_string());
        args.extend(self.options.iter().map(|option| option.to_string()));
        args.push(self.manifest.display().to_string());
        args
    }
}

/// Runs one recipe to completion, writing products into a working directory.
pub trait ReductionEngine {
    fn run(&self, invocation: &RecipeInvocation<'_>) -> Result<(), EngineError>;
}

/// Blocking `esorex` subprocess run from the working directory.
///
/// Standard streams are inherited so the engine's own progress output reaches
/// the terminal.
#[derive(Debug, Clone)]
pub struct EsorexEngine {
    command: EngineCommand,
    work_dir: PathBuf,
}

impl EsorexEngine {
    pub fn new(command: EngineCommand, work_dir: PathBuf) -> Self {
        Self { command, work_dir }
    }
}

impl ReductionEngine for EsorexEngine {
    fn run(&self, invocation: &RecipeInvocation<'_>) -> Result<(), EngineError> {
        let args = invocation.args();
        tracing::debug!(
            program = %self.command.program,
            args = %shell_words::join(self.command.args.iter().chain(&args)),
            cwd = %self.work_dir.display(),
            "invoke engine"
        );
        let start = Instant::now();
        let status = Command::new(&self.command.program)
            .args(&self.command.args)
            .args(&args)
            .current_dir(&self.work_dir)
            .status()
            .map_err(|source| EngineError::Spawn {
                program: self.command.program.clone(),
                recipe: invocation.recipe.to_string(),
                source,
            })?;
        tracing::info!(
            recipe = invocation.recipe,
            elapsed_ms = start.elapsed().as_millis() as u64,
            status = %status,
            "engine finished"
        );
        if !status.success() {
            return Err(EngineError::NonZeroExit {
                recipe: invocation.recipe.to_string(),
                manifest: invocation.manifest.to_path_buf(),
                status,
            });
        }
        Ok(())
    }
}
