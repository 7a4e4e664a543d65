//! chess-runner Driver
//!
//! Launches a target program once to explore its schedule points, then once
//! per point with a forced context switch there. The first run that does not
//! exit cleanly is reported as the index that reproduces the failure.

pub mod config;
pub mod launcher;
pub mod sweep;

pub use config::{ConfigError, RunnerConfig};
pub use launcher::{Launcher, ProcessLauncher, RunOutcome};
pub use sweep::{SweepReport, Sweeper};

use tracing_subscriber::EnvFilter;

/// Install the `tracing` subscriber on stderr, filtered by `RUST_LOG`
///
/// Stdout is left to the progress lines.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
