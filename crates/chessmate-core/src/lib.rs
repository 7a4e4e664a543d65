//! Chessmate - Two-Thread Systematic Concurrency Testing
//!
//! # Overview
//!
//! `chessmate` replaces a program's thread and mutex primitives with
//! instrumented equivalents so that the interleaving of exactly two threads
//! can be forced, counted and deterministically replayed.
//!
//! # Trinity Architecture
//!
//! - **Domain**: handoff scheduler, registries, schedule-point ledger
//! - **Infrastructure**: real primitives, global lock, spinning, sequence file
//! - **Adapters**: the drop-in [`thread`] / [`sync`] surface
//!
//! # Exploration and Replay
//!
//! ```text
//! run 0      explore     count every create / lock / unlock   → N
//! run 1..=N  replay(k)   force one context switch at point k, k in 0..N
//! ```
//!
//! A process learns its mode from the sequence file (`CHESS_SEQUENCE`,
//! default `chess_sequence`): absent means explore, present means replay at
//! the index it holds. The `chess-runner` driver manages the file.
//!
//! # Usage
//!
//! ```rust
//! use chessmate::{Runtime, SwitchLedger};
//! use chessmate::sync::Mutex;
//! use std::sync::Arc;
//!
//! let runtime = Runtime::new(SwitchLedger::explore());
//! let counter = Arc::new(Mutex::with_runtime(runtime.clone(), 0));
//!
//! let child = {
//!     let counter = counter.clone();
//!     runtime.spawn(move || *counter.lock() += 1)
//! };
//! *counter.lock() += 1;
//! child.join().unwrap();
//!
//! // create + 2 × (lock + unlock)
//! assert_eq!(runtime.ledger().count(), 5);
//!
//! // Reading the result is two more points
//! assert_eq!(*counter.lock(), 2);
//! assert_eq!(runtime.ledger().count(), 7);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

// Trinity Architecture Layers
pub mod adapters;
pub mod domain;
pub mod infrastructure;

pub use adapters::{sync, thread};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Re-export Primary Types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub use adapters::Runtime;

pub use domain::{
    ControllerError,
    LedgerMode,
    PointDecision,
    PointKind,
    PointRecord,
    SchedulerController,
    SwitchLedger,
    ThreadIdentity,
    ThreadStatus,
};

pub use infrastructure::{ChessConfig, PrimitiveProvider, SequenceError, StdPrimitives};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_defined() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_surface_exported() {
        let runtime = Runtime::new(SwitchLedger::replay(3));
        let mutex = sync::Mutex::with_runtime(runtime.clone(), 1u8);
        assert_eq!(*mutex.lock(), 1);
        assert_eq!(runtime.ledger().mode(), LedgerMode::Replay { switch_index: 3 });
    }
}
