use anyhow::Result;
use clap::Parser;

mod catalog;
mod classify;
mod cli;
mod config;
mod engine;
mod fits;
mod frames;
mod logging;
mod manifest;
mod paths;
mod relocate;
mod report;
mod runner;
#[cfg(test)]
mod testing;
mod util;
mod workflow;

fn main() -> Result<()> {
    let args = cli::RootArgs::parse();
    logging::init(&args.log_level);
    let engine_env = std::env::var(config::ENGINE_ENV_VAR).ok();
    let config = config::RunConfig::from_args(&args, engine_env)?;
    workflow::run(&config)
}
