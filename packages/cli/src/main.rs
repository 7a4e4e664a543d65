use anyhow::Result;
use chessmate_cli::{ProcessLauncher, RunnerConfig, Sweeper};
use clap::Parser;
use std::ffi::OsString;
use tracing::info;

/// chess-runner
/// Sweeps a two-thread program through every single forced context switch
#[derive(Parser)]
#[command(name = "chess-runner")]
#[command(about = "Systematic two-thread concurrency testing driver", long_about = None)]
struct Cli {
    /// Program to run under the scheduler
    program: OsString,

    /// Arguments passed through to the program
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<OsString>,
}

#[tokio::main]
async fn main() -> Result<()> {
    chessmate_cli::init_tracing();

    let cli = Cli::parse();
    let config = RunnerConfig::from_env()?;

    info!("♟️  chess-runner v{}", chessmate::VERSION);
    info!("🎯 Target: {:?} {:?}", cli.program, cli.args);
    info!("📄 Sequence file: {}", config.sequence_path.display());

    let sequence_path = config.sequence_path.clone();
    let launcher = ProcessLauncher::new(cli.program, cli.args, config);
    let mut sweeper = Sweeper::new(launcher, sequence_path, std::io::stdout());

    let report = sweeper.run().await?;
    match report.interrupted_at {
        Some(n) => info!("💥 Reproducible failure at index {}", n),
        None => info!("✅ {} replays completed", report.executed.len()),
    }

    Ok(())
}
