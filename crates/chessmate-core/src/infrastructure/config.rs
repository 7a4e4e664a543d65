//! Instrumented Process Configuration

use super::sequence_file::DEFAULT_SEQUENCE_FILE;
use std::path::PathBuf;

/// Environment variable naming the sequence file
pub const SEQUENCE_ENV: &str = "CHESS_SEQUENCE";

/// Configuration read by an instrumented process at start-up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChessConfig {
    /// Where the schedule point count / replay index lives
    pub sequence_path: PathBuf,
}

impl Default for ChessConfig {
    fn default() -> Self {
        Self {
            sequence_path: PathBuf::from(DEFAULT_SEQUENCE_FILE),
        }
    }
}

impl ChessConfig {
    /// Read from the process environment, falling back to defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read through an arbitrary lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(path) = lookup(SEQUENCE_ENV).filter(|v| !v.is_empty()) {
            config.sequence_path = PathBuf::from(path);
        }
        config
    }

    /// Override the sequence file path
    pub fn with_sequence_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.sequence_path = path.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sequence_path() {
        assert_eq!(ChessConfig::default().sequence_path, PathBuf::from("chess_sequence"));
    }

    #[test]
    fn test_lookup_overrides_path() {
        let config = ChessConfig::from_lookup(|key| {
            (key == SEQUENCE_ENV).then(|| "/tmp/run/seq".to_string())
        });
        assert_eq!(config.sequence_path, PathBuf::from("/tmp/run/seq"));
    }

    #[test]
    fn test_empty_value_keeps_default() {
        let config = ChessConfig::from_lookup(|_| Some(String::new()));
        assert_eq!(config, ChessConfig::default());
    }
}
