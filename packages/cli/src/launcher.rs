//! Target Launcher
//!
//! One launch is one run of the target program. The sweep only cares whether
//! a run succeeded; everything else about the process lives here.

use crate::config::RunnerConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chessmate::infrastructure::config::SEQUENCE_ENV;
use std::ffi::OsString;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, warn};

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Exit status zero
    Success,
    /// Non-zero exit, or killed by a signal (`None`)
    Failed(Option<i32>),
    /// Killed after exceeding the run timeout
    TimedOut,
    /// Killed because the operator pressed Ctrl-C
    Interrupted,
}

impl RunOutcome {
    /// Returns `true` only for a clean exit
    #[inline]
    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Runs the target once
#[async_trait]
pub trait Launcher: Send + Sync {
    /// Launch the target and wait for it to finish
    async fn launch(&self) -> Result<RunOutcome>;
}

#[async_trait]
impl<T: Launcher + ?Sized> Launcher for Arc<T> {
    async fn launch(&self) -> Result<RunOutcome> {
        (**self).launch().await
    }
}

/// Launches the target as a child process
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    program: OsString,
    args: Vec<OsString>,
    config: RunnerConfig,
}

impl ProcessLauncher {
    /// Launcher for `program args...`
    pub fn new(program: impl Into<OsString>, args: Vec<OsString>, config: RunnerConfig) -> Self {
        Self {
            program: program.into(),
            args,
            config,
        }
    }

    fn command(&self) -> Result<Command> {
        let stdout = std::fs::File::create(&self.config.output_path).with_context(|| {
            format!("Failed to create output file {}", self.config.output_path.display())
        })?;

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .env(SEQUENCE_ENV, &self.config.sequence_path)
            .stdout(Stdio::from(stdout))
            .kill_on_drop(true);
        if let Some(preload) = &self.config.preload {
            command.env("LD_PRELOAD", preload);
        }
        Ok(command)
    }
}

async fn wait_with_timeout(
    child: &mut Child,
    timeout: Option<Duration>,
) -> std::io::Result<Option<ExitStatus>> {
    match timeout {
        Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
            Ok(status) => status.map(Some),
            Err(_) => Ok(None),
        },
        None => child.wait().await.map(Some),
    }
}

#[async_trait]
impl Launcher for ProcessLauncher {
    async fn launch(&self) -> Result<RunOutcome> {
        let mut child = self
            .command()?
            .spawn()
            .with_context(|| format!("Failed to launch {:?}", self.program))?;
        debug!("Launched {:?} (pid {:?})", self.program, child.id());

        let outcome = tokio::select! {
            status = wait_with_timeout(&mut child, self.config.run_timeout) => {
                match status.context("Failed to wait for target")? {
                    Some(status) if status.success() => RunOutcome::Success,
                    Some(status) => RunOutcome::Failed(status.code()),
                    None => RunOutcome::TimedOut,
                }
            }
            _ = tokio::signal::ctrl_c() => RunOutcome::Interrupted,
        };

        if matches!(outcome, RunOutcome::TimedOut | RunOutcome::Interrupted) {
            warn!("Killing target: {:?}", outcome);
            if let Err(e) = child.kill().await {
                warn!("Failed to kill target: {}", e);
            }
        }

        Ok(outcome)
    }
}
