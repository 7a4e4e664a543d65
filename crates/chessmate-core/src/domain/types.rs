//! Core Types for the Handoff Scheduler
//!
//! # Overview
//!
//! The scheduler only ever talks about three things: which thread is asking,
//! which application mutex it is asking about, and what lifecycle state a
//! thread is in. Everything here is a small `Copy` value so it can live in an
//! atomic and be read from a spin loop.
//!
//! # Identity Model
//!
//! ```text
//! ThreadIdentity   raw OS-level identity (pthread_t, or a counter for std threads)
//! MasterIdentity   a ^ b of the two known identities
//! MutexKey         address (pthread) or construction counter (std)
//! ```

use std::fmt;

/// Identity of an instrumented thread
///
/// The value is whatever the primitive provider uses to tell threads apart.
/// Zero is reserved to mean "no thread" in atomics.
///
/// # Example
///
/// ```rust
/// use chessmate::domain::ThreadIdentity;
///
/// let a = ThreadIdentity::new(7);
/// let b = ThreadIdentity::new(9);
/// assert_ne!(a, b);
/// assert_eq!(a.as_u64(), 7);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadIdentity(pub u64);

impl ThreadIdentity {
    /// Placeholder stored in atomics before any thread is named
    pub const NONE: Self = Self(0);

    /// Create a new thread identity
    #[inline(always)]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw value
    #[inline(always)]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns `true` if this is the [`ThreadIdentity::NONE`] placeholder
    #[inline(always)]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for ThreadIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// Bitwise combination of the two known thread identities
///
/// # Design Notes
///
/// With exactly two participants, `master ^ me` is the other participant.
/// This turns "who do I hand off to" into a single XOR with no table scan.
/// Before any thread has been created the master is zero, so the counterpart
/// of any thread is itself, which callers treat as "nobody to hand off to".
///
/// ```rust
/// use chessmate::domain::{MasterIdentity, ThreadIdentity};
///
/// let main = ThreadIdentity::new(3);
/// let child = ThreadIdentity::new(12);
/// let master = MasterIdentity::combine(main, child);
///
/// assert_eq!(master.counterpart(main), child);
/// assert_eq!(master.counterpart(child), main);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MasterIdentity(pub u64);

impl MasterIdentity {
    /// Combine the creator and the created thread
    #[inline(always)]
    pub const fn combine(a: ThreadIdentity, b: ThreadIdentity) -> Self {
        Self(a.0 ^ b.0)
    }

    /// The identity of the thread that is not `me`
    #[inline(always)]
    pub const fn counterpart(self, me: ThreadIdentity) -> ThreadIdentity {
        ThreadIdentity(self.0 ^ me.0)
    }

    /// Get the raw value
    #[inline(always)]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

/// Identity of an application mutex
///
/// For pthread programs this is the mutex address. For Rust programs using
/// [`crate::sync::Mutex`] it is a process-unique construction counter, so a
/// mutex keeps its key when the value is moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MutexKey(pub usize);

impl MutexKey {
    /// Create a new mutex key
    #[inline(always)]
    pub const fn new(raw: usize) -> Self {
        Self(raw)
    }

    /// Get the raw value
    #[inline(always)]
    pub const fn as_usize(self) -> usize {
        self.0
    }
}

impl fmt::Display for MutexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m{:#x}", self.0)
    }
}

/// Lifecycle status of a registered thread
///
/// # State Transitions
///
/// ```text
/// RUNNING ──────> WAITING      (blocked entering a contended lock)
///    ↑               │
///    └───────────────┘         (lock granted)
///
/// RUNNING ──────> TERMINATED   (start routine returned)
/// ```
///
/// `Running` means "not blocked and not finished". Which of the two threads
/// is actually allowed to execute is decided by the controller's
/// `running_thread`, not by this status. `Terminated` is absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ThreadStatus {
    /// Thread may execute when it holds the scheduler
    Running = 0,

    /// Thread is parked waiting for a mutex held by the other thread
    Waiting = 1,

    /// Thread's start routine has returned
    Terminated = 2,
}

impl ThreadStatus {
    /// Decode the value stored in a record's atomic
    #[inline(always)]
    pub const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Running,
            1 => Self::Waiting,
            _ => Self::Terminated,
        }
    }

    /// Encode for storage in an atomic
    #[inline(always)]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// A thread can be yielded to only while it is `Running`
    #[inline(always)]
    pub const fn accepts_handoff(self) -> bool {
        matches!(self, Self::Running)
    }
}

impl fmt::Display for ThreadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Running => "RUNNING",
            Self::Waiting => "WAITING",
            Self::Terminated => "TERMINATED",
        };
        f.write_str(name)
    }
}

/// Kind of a schedule point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointKind {
    /// Thread creation
    Create,
    /// Mutex lock attempt
    Lock,
    /// Effective mutex unlock
    Unlock,
}

impl fmt::Display for PointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Create => "create",
            Self::Lock => "lock",
            Self::Unlock => "unlock",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counterpart_is_symmetric() {
        let a = ThreadIdentity::new(0x1234);
        let b = ThreadIdentity::new(0xbeef);
        let master = MasterIdentity::combine(a, b);

        assert_eq!(master.counterpart(a), b);
        assert_eq!(master.counterpart(b), a);
        assert_ne!(master.counterpart(a), a);
    }

    #[test]
    fn test_counterpart_without_master_is_self() {
        let me = ThreadIdentity::new(5);
        assert_eq!(MasterIdentity::default().counterpart(me), me);
    }

    #[test]
    fn test_status_round_trips_through_u8() {
        for status in [ThreadStatus::Running, ThreadStatus::Waiting, ThreadStatus::Terminated] {
            assert_eq!(ThreadStatus::from_u8(status.as_u8()), status);
        }
    }

    #[test]
    fn test_only_running_accepts_handoff() {
        assert!(ThreadStatus::Running.accepts_handoff());
        assert!(!ThreadStatus::Waiting.accepts_handoff());
        assert!(!ThreadStatus::Terminated.accepts_handoff());
    }

    #[test]
    fn test_display() {
        assert_eq!(ThreadIdentity::new(3).to_string(), "t3");
        assert_eq!(MutexKey::new(255).to_string(), "m0xff");
        assert_eq!(ThreadStatus::Waiting.to_string(), "WAITING");
        assert_eq!(PointKind::Unlock.to_string(), "unlock");
    }
}
