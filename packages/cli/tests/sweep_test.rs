//! Integration Test: Sweep Ordering and Reporting
//!
//! A scripted launcher stands in for the target: the first launch plays the
//! exploration run and writes the point count, later launches record the
//! index they were handed.

use anyhow::Result;
use async_trait::async_trait;
use chessmate::infrastructure::sequence_file;
use chessmate_cli::{Launcher, RunOutcome, Sweeper};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

struct ScriptedLauncher {
    path: PathBuf,
    points: Option<u64>,
    fail_at: Option<u64>,
    seen: Mutex<Vec<Option<u64>>>,
}

impl ScriptedLauncher {
    fn new(path: PathBuf, points: u64) -> Self {
        Self {
            path,
            points: Some(points),
            fail_at: None,
            seen: Mutex::new(Vec::new()),
        }
    }

    fn failing_at(mut self, index: u64) -> Self {
        self.fail_at = Some(index);
        self
    }

    fn silent(mut self) -> Self {
        self.points = None;
        self
    }

    fn seen(&self) -> Vec<Option<u64>> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Launcher for ScriptedLauncher {
    async fn launch(&self) -> Result<RunOutcome> {
        let mut seen = self.seen.lock().unwrap();
        if seen.is_empty() {
            seen.push(None);
            if let Some(points) = self.points {
                sequence_file::write_index(&self.path, points)?;
            }
            return Ok(RunOutcome::Success);
        }

        let index = sequence_file::read_count(&self.path)?;
        seen.push(Some(index));
        if self.fail_at == Some(index) {
            return Ok(RunOutcome::TimedOut);
        }
        Ok(RunOutcome::Success)
    }
}

fn console_text(bytes: Vec<u8>) -> String {
    String::from_utf8(bytes).unwrap()
}

#[tokio::test]
async fn test_replays_every_index_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chess_sequence");
    let launcher = Arc::new(ScriptedLauncher::new(path.clone(), 5));

    let mut sweeper = Sweeper::new(launcher.clone(), &path, Vec::new());
    let report = sweeper.run().await.unwrap();

    assert_eq!(report.count, 5);
    assert_eq!(report.executed, vec![0, 1, 2, 3, 4]);
    assert!(report.is_clean());
    assert_eq!(
        launcher.seen(),
        vec![None, Some(0), Some(1), Some(2), Some(3), Some(4)]
    );

    let console = console_text(sweeper.into_console());
    assert!(console.starts_with("Exploring...\n\n"));
    assert!(console.contains("Executing step 0/4\n"));
    assert!(console.contains("Executing step 4/4\n"));
    assert!(!console.contains("Interrupted"));
    assert!(console.ends_with("\nDone executing.\n"));
}

#[tokio::test]
async fn test_stops_at_first_failing_index() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chess_sequence");
    let launcher = Arc::new(ScriptedLauncher::new(path.clone(), 9).failing_at(2));

    let mut sweeper = Sweeper::new(launcher.clone(), &path, Vec::new());
    let report = sweeper.run().await.unwrap();

    assert_eq!(report.count, 9);
    assert_eq!(report.executed, vec![0, 1, 2]);
    assert_eq!(report.interrupted_at, Some(2));
    assert_eq!(launcher.seen().len(), 4);

    let console = console_text(sweeper.into_console());
    assert!(console.contains("Executing step 2/8\n"));
    assert!(!console.contains("Executing step 3/8"));
    assert!(console.contains("\nInterrupted at n = 2\n"));
    assert!(console.ends_with("\nDone executing.\n"));
}

#[tokio::test]
async fn test_zero_points_runs_no_replay() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chess_sequence");
    let launcher = Arc::new(ScriptedLauncher::new(path.clone(), 0));

    let mut sweeper = Sweeper::new(launcher.clone(), &path, Vec::new());
    let report = sweeper.run().await.unwrap();

    assert_eq!(report.count, 0);
    assert!(report.executed.is_empty());
    assert_eq!(launcher.seen(), vec![None]);

    let console = console_text(sweeper.into_console());
    assert!(!console.contains("Executing step"));
    assert!(console.ends_with("\nDone executing.\n"));
}

#[tokio::test]
async fn test_missing_count_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chess_sequence");
    let launcher = Arc::new(ScriptedLauncher::new(path.clone(), 3).silent());

    let mut sweeper = Sweeper::new(launcher.clone(), &path, Vec::new());
    let err = sweeper.run().await.unwrap_err();

    assert!(err.to_string().contains("Couldn't open sequence file"));
    assert_eq!(launcher.seen(), vec![None]);
}

#[tokio::test]
async fn test_stale_sequence_file_is_cleared_first() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chess_sequence");
    std::fs::write(&path, "42").unwrap();
    let launcher = Arc::new(ScriptedLauncher::new(path.clone(), 3).silent());

    let mut sweeper = Sweeper::new(launcher, &path, Vec::new());
    assert!(sweeper.run().await.is_err());
    assert!(!path.exists());
}
