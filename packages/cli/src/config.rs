//! Driver Configuration

use chessmate::infrastructure::config::SEQUENCE_ENV;
use chessmate::infrastructure::sequence_file::DEFAULT_SEQUENCE_FILE;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable naming the file that receives the target's stdout
pub const OUTPUT_ENV: &str = "CHESS_OUTPUT";

/// Environment variable with the per-run timeout in seconds
pub const TIMEOUT_ENV: &str = "CHESS_RUN_TIMEOUT_SECS";

/// Environment variable with the interposer library to preload
pub const PRELOAD_ENV: &str = "CHESS_PRELOAD";

/// Default file for the target's stdout
pub const DEFAULT_OUTPUT_FILE: &str = "chess_runner.out";

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Timeout is not a whole number of seconds
    #[error("{TIMEOUT_ENV} must be a whole number of seconds, got {value:?}")]
    InvalidTimeout {
        /// Offending value
        value: String,
    },
}

/// Driver settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Sequence file shared with the target
    pub sequence_path: PathBuf,

    /// Where the target's stdout goes, truncated per run
    pub output_path: PathBuf,

    /// Kill a run that takes longer than this; `None` waits forever
    pub run_timeout: Option<Duration>,

    /// Shared library handed to the target as `LD_PRELOAD`
    pub preload: Option<PathBuf>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            sequence_path: PathBuf::from(DEFAULT_SEQUENCE_FILE),
            output_path: PathBuf::from(DEFAULT_OUTPUT_FILE),
            run_timeout: None,
            preload: None,
        }
    }
}

impl RunnerConfig {
    /// Read from the process environment
    ///
    /// # Errors
    /// - `InvalidTimeout` if the timeout is set but malformed
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read through an arbitrary lookup; empty values count as unset
    ///
    /// # Errors
    /// - `InvalidTimeout` if the timeout is set but malformed
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(path) = get(SEQUENCE_ENV) {
            config.sequence_path = PathBuf::from(path);
        }
        if let Some(path) = get(OUTPUT_ENV) {
            config.output_path = PathBuf::from(path);
        }
        if let Some(path) = get(PRELOAD_ENV) {
            config.preload = Some(PathBuf::from(path));
        }
        if let Some(value) = get(TIMEOUT_ENV) {
            let secs: u64 = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidTimeout { value: value.clone() })?;
            config.run_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }

        Ok(config)
    }
}
