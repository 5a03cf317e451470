//! tabfx CLI - offline rendering and parameter file tools.

mod commands;
mod wav;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tabfx")]
#[command(author, version, about = "Per-source audio effects engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a WAV file through a session
    Process(commands::process::ProcessArgs),

    /// List session parameters, their domains and defaults
    Params(commands::params::ParamsArgs),

    /// Validate a parameter snapshot or engine config file
    Check(commands::check::CheckArgs),
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Process(args) => commands::process::run(args),
        Commands::Params(args) => commands::params::run(args),
        Commands::Check(args) => commands::check::run(args),
    }
}
