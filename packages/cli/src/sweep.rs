//! Exploration / Replay Sweep
//!
//! ```text
//! clear sequence file
//! launch                      → target explores, leaves count N
//! for n in 0..N:
//!     write n, launch         → target forces a switch at point n
//!     non-success?            → "Interrupted at n = <n>", stop
//! ```

use crate::launcher::{Launcher, RunOutcome};
use anyhow::{bail, Context, Result};
use chessmate::infrastructure::sequence_file;
use std::io::Write;
use std::path::PathBuf;
use tracing::{info, warn};

/// What a sweep did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepReport {
    /// Schedule points counted by the exploration run
    pub count: u64,
    /// Replay indices launched, in order
    pub executed: Vec<u64>,
    /// First index whose run did not succeed
    pub interrupted_at: Option<u64>,
}

impl SweepReport {
    /// Returns `true` if every replay succeeded
    pub fn is_clean(&self) -> bool {
        self.interrupted_at.is_none()
    }
}

/// Drives one exploration run followed by one replay per schedule point
pub struct Sweeper<L, W> {
    launcher: L,
    sequence_path: PathBuf,
    console: W,
}

impl<L: Launcher, W: Write> Sweeper<L, W> {
    /// Sweeper writing progress lines to `console`
    pub fn new(launcher: L, sequence_path: impl Into<PathBuf>, console: W) -> Self {
        Self {
            launcher,
            sequence_path: sequence_path.into(),
            console,
        }
    }

    /// Run the full sweep
    ///
    /// # Errors
    /// - the sequence file cannot be cleared, read or written
    /// - the exploration run left no readable count
    /// - a launch fails outright, or exploration is interrupted
    pub async fn run(&mut self) -> Result<SweepReport> {
        sequence_file::clear(&self.sequence_path)?;

        writeln!(self.console, "Exploring...\n")?;
        let exploration = self.launcher.launch().await?;
        match exploration {
            RunOutcome::Success => {}
            RunOutcome::Interrupted => bail!("Exploration run was interrupted"),
            other => warn!("Exploration run ended with {:?}; using the count it reached", other),
        }

        let count = sequence_file::read_count(&self.sequence_path)
            .context("Couldn't open sequence file")?;
        info!("🔍 Exploration found {} schedule points", count);

        let mut report = SweepReport {
            count,
            executed: Vec::with_capacity(count as usize),
            interrupted_at: None,
        };

        for n in 0..count {
            writeln!(self.console, "Executing step {}/{}", n, count - 1)?;
            self.console.flush()?;
            sequence_file::write_index(&self.sequence_path, n)?;

            let outcome = self.launcher.launch().await?;
            report.executed.push(n);

            if !outcome.is_success() {
                warn!("Replay {} ended with {:?}", n, outcome);
                writeln!(self.console, "\nInterrupted at n = {}", n)?;
                report.interrupted_at = Some(n);
                break;
            }
        }

        writeln!(self.console, "\nDone executing.")?;
        self.console.flush()?;
        Ok(report)
    }

    /// Give back the console
    pub fn into_console(self) -> W {
        self.console
    }
}
