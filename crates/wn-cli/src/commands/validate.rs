//! Scenario validation

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;
use wn_core::Scenario;

#[derive(Args)]
pub struct ValidateArgs {
    /// Scenario file (RON)
    #[arg(short, long)]
    pub scenario: PathBuf,
}

pub fn execute(args: ValidateArgs) -> Result<()> {
    let scenario = Scenario::load(&args.scenario)
        .with_context(|| format!("Failed to load {}", args.scenario.display()))?;
    scenario
        .validate()
        .with_context(|| format!("Scenario '{}' is invalid", scenario.name))?;
    info!(scenario = %scenario.name, stages = scenario.stages.len(), "Scenario is valid");
    println!("{}: ok ({} stages)", scenario.name, scenario.stages.len());
    Ok(())
}
