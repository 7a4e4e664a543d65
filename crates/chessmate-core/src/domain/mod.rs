//! Domain Layer - Handoff Scheduling Logic
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Domain Layer                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  Types                         Registries                   │
//! │  ├─ ThreadIdentity             ├─ ThreadRegistry            │
//! │  ├─ MasterIdentity             └─ MutexRegistry             │
//! │  ├─ MutexKey                                                │
//! │  └─ ThreadStatus               Ledger                       │
//! │                                ├─ SwitchLedger              │
//! │                                └─ LedgerMode                │
//! │                                                             │
//! │                   SchedulerController<P>                    │
//! │                   ├─ spawn / join                           │
//! │                   ├─ lock / unlock                          │
//! │                   └─ yield_now                              │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The controller is generic over a
//! [`PrimitiveProvider`](crate::infrastructure::PrimitiveProvider), so the
//! same protocol drives both the `std` surface and the pthread preload.

pub mod controller;
pub mod error;
pub mod ledger;
pub mod registry;
pub mod types;

pub use controller::{SchedulerController, MAX_THREADS};
pub use error::{ControllerError, PrimitiveError, RegistryError};
pub use ledger::{CountSink, LedgerMode, PointDecision, PointRecord, SwitchLedger};
pub use registry::{MutexRecord, MutexRegistry, ThreadRecord, ThreadRegistry};
pub use types::{MasterIdentity, MutexKey, PointKind, ThreadIdentity, ThreadStatus};
