//! Schedule-Point Ledger
//!
//! # Overview
//!
//! Every create, lock and effective unlock passes through
//! [`SwitchLedger::record`]. The ledger numbers the points in the order they
//! occur and decides whether the caller must give up control right there.
//!
//! ```text
//! point:      0        1       2        3        4
//! kind:     create   lock    lock   unlock   unlock
//!                             ▲
//!                   Replay { switch_index: 2 } forces a switch here
//! ```
//!
//! # Modes
//!
//! - **Explore** never forces a switch. After each point the running total is
//!   handed to a [`CountSink`], so the total survives even if the program
//!   later crashes or hangs.
//! - **Replay** forces exactly one switch, at the point whose index equals
//!   `switch_index`. Indices are zero-based, so the sweep `0..count` visits
//!   every point of an exploration that reported `count`.
//!
//! Points are only recorded while the global lock is held, so the counter is
//! never contended; it is an atomic only so the ledger can be shared.

use crate::domain::types::{PointKind, ThreadIdentity};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Destination for the running total during exploration
pub trait CountSink: Send + Sync {
    /// Persist the current total
    fn persist(&self, count: u64) -> std::io::Result<()>;
}

/// How the current run treats schedule points
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerMode {
    /// Count points, never interfere
    Explore,

    /// Force one context switch at the given zero-based point index
    Replay {
        /// Index of the point that switches
        switch_index: u64,
    },
}

impl fmt::Display for LedgerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Explore => f.write_str("explore"),
            Self::Replay { switch_index } => write!(f, "replay@{switch_index}"),
        }
    }
}

/// What the caller of [`SwitchLedger::record`] must do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointDecision {
    /// Carry on
    Proceed,
    /// Hand control to the other thread before continuing
    ForceSwitch,
}

/// One recorded point, kept only when history is enabled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointRecord {
    /// Zero-based index
    pub index: u64,
    /// What kind of operation hit the point
    pub kind: PointKind,
    /// Thread that hit it
    pub thread: ThreadIdentity,
    /// Whether a switch was forced here
    pub forced: bool,
}

/// Counter and decision maker for schedule points
pub struct SwitchLedger {
    mode: LedgerMode,
    count: AtomicU64,
    sink: Option<Box<dyn CountSink>>,
    history: Option<Mutex<Vec<PointRecord>>>,
}

impl SwitchLedger {
    /// Ledger that counts without persisting
    pub fn explore() -> Self {
        Self::new(LedgerMode::Explore, None)
    }

    /// Ledger that counts and persists each total to `sink`
    pub fn explore_into(sink: Box<dyn CountSink>) -> Self {
        Self::new(LedgerMode::Explore, Some(sink))
    }

    /// Ledger that forces a switch at `switch_index`
    pub fn replay(switch_index: u64) -> Self {
        Self::new(LedgerMode::Replay { switch_index }, None)
    }

    fn new(mode: LedgerMode, sink: Option<Box<dyn CountSink>>) -> Self {
        Self {
            mode,
            count: AtomicU64::new(0),
            sink,
            history: None,
        }
    }

    /// Keep a [`PointRecord`] for every point
    pub fn with_history(mut self) -> Self {
        self.history = Some(Mutex::new(Vec::new()));
        self
    }

    /// Current mode
    #[inline(always)]
    pub fn mode(&self) -> LedgerMode {
        self.mode
    }

    /// Number of points recorded so far
    #[inline(always)]
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }

    /// Record a point and decide whether to switch
    pub fn record(&self, kind: PointKind, thread: ThreadIdentity) -> PointDecision {
        let index = self.count.fetch_add(1, Ordering::AcqRel);

        let decision = match self.mode {
            LedgerMode::Explore => {
                if let Some(sink) = &self.sink {
                    if let Err(e) = sink.persist(index + 1) {
                        warn!("Failed to persist schedule point count {}: {}", index + 1, e);
                    }
                }
                PointDecision::Proceed
            }
            LedgerMode::Replay { switch_index } if switch_index == index => {
                debug!("Forcing switch at point {} ({} by {})", index, kind, thread);
                PointDecision::ForceSwitch
            }
            LedgerMode::Replay { .. } => PointDecision::Proceed,
        };

        if let Some(history) = &self.history {
            history.lock().push(PointRecord {
                index,
                kind,
                thread,
                forced: decision == PointDecision::ForceSwitch,
            });
        }

        decision
    }

    /// Snapshot of the recorded points, empty unless history is enabled
    pub fn history(&self) -> Vec<PointRecord> {
        self.history
            .as_ref()
            .map(|h| h.lock().clone())
            .unwrap_or_default()
    }
}

impl fmt::Debug for SwitchLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SwitchLedger")
            .field("mode", &self.mode)
            .field("count", &self.count())
            .field("persisting", &self.sink.is_some())
            .finish()
    }
}
