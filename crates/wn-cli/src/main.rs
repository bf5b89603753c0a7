//! Waternet scenario runner

mod commands;

use clap::{Parser, Subcommand};

/// Create waternets for the stages of a dike cross-section scenario
#[derive(Parser)]
#[command(name = "wn")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Waternet synthesis for dike cross-sections", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every stage of a scenario and write the waternets
    Run(commands::run::RunArgs),
    /// Check a scenario file without running it
    Validate(commands::validate::ValidateArgs),
}

fn main() -> anyhow::Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wn_cli=info,wn_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => commands::run::execute(args),
        Commands::Validate(args) => commands::validate::execute(args),
    }
}
