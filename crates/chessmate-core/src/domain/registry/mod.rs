//! Thread & Mutex Registries
//!
//! # Architecture
//!
//! Both registries are append-only for the life of the process. Records are
//! pushed into a `boxcar::Vec`, which never moves an element once it is
//! stored, so a spinning thread can keep a plain `&Record` while the other
//! thread registers more entries.
//!
//! ```text
//! ThreadRegistry                     MutexRegistry
//!   records: boxcar::Vec<Thread>       records: boxcar::Vec<Mutex>
//!   lookup: linear scan (n <= 2)       index:   DashMap<MutexKey, slot>
//! ```
//!
//! Records carry their mutable state in atomics. Writers publish with
//! `Release`, spin loops observe with `Acquire`.

pub mod mutex;
pub mod thread;

pub use mutex::{MutexRecord, MutexRegistry};
pub use thread::{ThreadHandle, ThreadRecord, ThreadRegistry};
