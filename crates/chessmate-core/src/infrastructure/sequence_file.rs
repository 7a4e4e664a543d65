//! Sequence File Protocol
//!
//! The driver and the instrumented process run as separate processes and
//! share exactly one piece of state: a plain-text file holding one decimal
//! integer.
//!
//! ```text
//! driver                              instrumented process
//! ──────                              ────────────────────
//! clear(path)                 ──>     file absent  → explore, write total
//! read_count(path)            <──     "9"
//! write_index(path, 0..9)     ──>     file present → replay at index
//! ```
//!
//! In exploration mode the running total is rewritten after every schedule
//! point, so a crash or hang still leaves the count reached so far.

use crate::domain::ledger::{CountSink, SwitchLedger};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default file name, relative to the working directory
pub const DEFAULT_SEQUENCE_FILE: &str = "chess_sequence";

/// Failure reading or writing the sequence file
#[derive(Debug, thiserror::Error)]
pub enum SequenceError {
    /// Filesystem error
    #[error("sequence file {path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Content is not a single non-negative integer
    #[error("sequence file {path} does not contain a schedule point count: {content:?}")]
    Malformed {
        /// File involved
        path: PathBuf,
        /// What was read
        content: String,
    },
}

impl SequenceError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Exploration sink that rewrites the file with each new total
#[derive(Debug)]
pub struct SequenceFile {
    path: PathBuf,
    file: Mutex<File>,
}

impl SequenceFile {
    /// Create (or truncate) the file and write `0`
    ///
    /// # Errors
    /// - `SequenceError::Io` if the file cannot be created or written
    pub fn create(path: impl AsRef<Path>) -> Result<Self, SequenceError> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|e| SequenceError::io(path, e))?;

        let sink = Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        };
        sink.persist(0).map_err(|e| SequenceError::io(path, e))?;
        Ok(sink)
    }

    /// Path of the file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CountSink for SequenceFile {
    fn persist(&self, count: u64) -> io::Result<()> {
        let mut file = self.file.lock();
        let text = count.to_string();
        file.seek(SeekFrom::Start(0))?;
        file.write_all(text.as_bytes())?;
        file.set_len(text.len() as u64)?;
        file.flush()
    }
}

/// Build the ledger for this process from the state of the file
///
/// - absent: exploration, the file is created holding `0`
/// - present: replay at the index it holds
///
/// # Errors
/// - `SequenceError::Io` if the file cannot be read or created
/// - `SequenceError::Malformed` if it does not hold an integer
pub fn open_ledger(path: impl AsRef<Path>) -> Result<SwitchLedger, SequenceError> {
    let path = path.as_ref();
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let switch_index = parse_count(path, &content)?;
            info!("Replaying with forced switch at point {}", switch_index);
            Ok(SwitchLedger::replay(switch_index))
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!("Exploring; schedule point count goes to {}", path.display());
            let sink = SequenceFile::create(path)?;
            Ok(SwitchLedger::explore_into(Box::new(sink)))
        }
        Err(e) => Err(SequenceError::io(path, e)),
    }
}

/// Delete the file; a missing file is not an error
///
/// # Errors
/// - `SequenceError::Io` for any other removal failure
pub fn clear(path: impl AsRef<Path>) -> Result<(), SequenceError> {
    let path = path.as_ref();
    match std::fs::remove_file(path) {
        Ok(()) => {
            debug!("Cleared {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(SequenceError::io(path, e)),
    }
}

/// Overwrite the file with the index of the next replay
///
/// # Errors
/// - `SequenceError::Io` if the file cannot be written
pub fn write_index(path: impl AsRef<Path>, index: u64) -> Result<(), SequenceError> {
    let path = path.as_ref();
    std::fs::write(path, index.to_string()).map_err(|e| SequenceError::io(path, e))
}

/// Read the total left by an exploration run
///
/// # Errors
/// - `SequenceError::Io` if the file is missing or unreadable
/// - `SequenceError::Malformed` if it does not hold an integer
pub fn read_count(path: impl AsRef<Path>) -> Result<u64, SequenceError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| SequenceError::io(path, e))?;
    parse_count(path, &content)
}

fn parse_count(path: &Path, content: &str) -> Result<u64, SequenceError> {
    content
        .trim()
        .parse::<u64>()
        .map_err(|_| SequenceError::Malformed {
            path: path.to_path_buf(),
            content: content.to_string(),
        })
}
