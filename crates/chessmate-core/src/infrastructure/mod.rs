//! Infrastructure Layer - Real Primitives and Process State
//!
//! Concrete pieces the scheduling logic in [`crate::domain`] runs on.
//!
//! # Responsibilities
//! - Resolving the real thread/mutex operations (`primitives`)
//! - The global exclusion lock (`global_lock`)
//! - Busy-wait parking (`spinner`)
//! - The driver side channel (`sequence_file`)
//! - Environment configuration (`config`)

pub mod config;
pub mod global_lock;
pub mod primitives;
pub mod sequence_file;
pub mod spinner;

pub use config::ChessConfig;
pub use global_lock::GlobalLock;
pub use primitives::{PrimitiveProvider, RawLock, Resolver, StdPrimitives, ThreadEntry};
pub use sequence_file::{open_ledger, SequenceError, SequenceFile};
pub use spinner::Spinner;
