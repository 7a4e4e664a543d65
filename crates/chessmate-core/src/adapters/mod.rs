//! Adapters Layer - Drop-in Primitive Surface
//!
//! Connects Rust programs to the scheduler. Application code swaps
//! `std::thread` for [`thread`] and `std::sync::Mutex` for [`sync::Mutex`];
//! everything else stays the same.
//!
//! # Ports
//! - Inbound: `thread::spawn`, `JoinHandle::join`, `Mutex::lock`, guard drop,
//!   `thread::yield_now`
//! - Outbound: [`SchedulerController`](crate::domain::SchedulerController)
//!   over [`StdPrimitives`](crate::infrastructure::StdPrimitives)

pub mod runtime;
pub mod sync;
pub mod thread;

pub use runtime::Runtime;
