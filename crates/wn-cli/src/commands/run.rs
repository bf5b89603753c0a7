//! Scenario execution

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::{Args, ValueEnum};
use tracing::info;
use wn_core::{Scenario, StageWaternet};
use wn_geom::PolygonKernel;

/// Output encoding of the waternets
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Ron,
    Json,
}

#[derive(Args)]
pub struct RunArgs {
    /// Scenario file (RON)
    #[arg(short, long)]
    pub scenario: PathBuf,

    /// Output file; standard output when absent
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[arg(short, long, value_enum, default_value_t = OutputFormat::Ron)]
    pub format: OutputFormat,
}

pub fn execute(args: RunArgs) -> Result<()> {
    let scenario = Scenario::load(&args.scenario)
        .with_context(|| format!("Failed to load {}", args.scenario.display()))?;

    let kernel = wn_geom::default_kernel();
    if !kernel.is_available() {
        bail!("Polygon kernel '{}' is not available", kernel.name());
    }

    let start = Instant::now();
    let results = scenario
        .run(kernel.as_ref())
        .with_context(|| format!("Scenario '{}' failed", scenario.name))?;
    info!(
        scenario = %scenario.name,
        stages = results.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Created waternets"
    );

    let text = encode(&results, args.format)?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, text)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), "Wrote waternets");
        }
        None => println!("{text}"),
    }
    Ok(())
}

fn encode(results: &[StageWaternet], format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Ron => {
            ron::ser::to_string_pretty(results, ron::ser::PrettyConfig::default())?
        }
        OutputFormat::Json => serde_json::to_string_pretty(results)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wn_core::Waternet;

    fn results() -> Vec<StageWaternet> {
        vec![StageWaternet {
            stage: "daily".into(),
            waternet: Waternet {
                name: "daily".into(),
                ..Default::default()
            },
        }]
    }

    #[test]
    fn test_encode_json() {
        let text = encode(&results(), OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value[0]["stage"], "daily");
        assert_eq!(value[0]["waternet"]["name"], "daily");
    }

    #[test]
    fn test_encode_ron() {
        let text = encode(&results(), OutputFormat::Ron).unwrap();
        let decoded: Vec<StageWaternet> = ron::from_str(&text).unwrap();
        assert_eq!(decoded, results());
    }
}
