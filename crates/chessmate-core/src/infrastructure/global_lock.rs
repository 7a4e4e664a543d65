//! Global Exclusion Lock
//!
//! At steady state this lock is held by whichever of the two threads is
//! allowed to execute. It is released only during a handoff and when a
//! created thread's routine returns.
//!
//! # Design Notes
//!
//! The lock is a bare `parking_lot::RawMutex` rather than a guard-based
//! mutex: it is acquired in one instrumented call and released in another,
//! often on a different stack frame, so no guard could span the hold. The
//! holder's identity is recorded next to it and only the holder may release.
//!
//! Waiting is a `try_lock` loop driven by the [`Spinner`]. The slow path of
//! `RawMutex::lock` yields through `std::thread::yield_now`, which inside the
//! preload library is the interposed `sched_yield`.

use super::primitives::PrimitiveProvider;
use super::spinner::Spinner;
use crate::domain::types::ThreadIdentity;
use parking_lot::lock_api::RawMutex as _;
use std::sync::atomic::{AtomicU64, Ordering};

/// Exclusion domain shared by the two instrumented threads
pub struct GlobalLock {
    raw: parking_lot::RawMutex,
    holder: AtomicU64,
}

impl GlobalLock {
    /// Unlocked, unheld
    pub const fn new() -> Self {
        Self {
            raw: parking_lot::RawMutex::INIT,
            holder: AtomicU64::new(0),
        }
    }

    /// Spin until `me` holds the lock
    ///
    /// Acquiring a lock `me` already holds is a no-op.
    pub fn acquire<P: PrimitiveProvider>(&self, me: ThreadIdentity, provider: &P) {
        if self.is_held_by(me) {
            return;
        }
        Spinner::wait_until(provider, || self.raw.try_lock());
        self.holder.store(me.as_u64(), Ordering::Release);
    }

    /// Release the lock if `me` holds it
    ///
    /// Returns `true` if the lock was released.
    pub fn release(&self, me: ThreadIdentity) -> bool {
        if !self.is_held_by(me) {
            return false;
        }
        self.holder.store(ThreadIdentity::NONE.as_u64(), Ordering::Release);
        // SAFETY: `holder == me` is only ever stored by `me` after locking.
        unsafe { self.raw.unlock() };
        true
    }

    /// Current holder, if any
    #[inline]
    pub fn holder(&self) -> Option<ThreadIdentity> {
        let raw = self.holder.load(Ordering::Acquire);
        (raw != 0).then(|| ThreadIdentity::new(raw))
    }

    /// Returns `true` if `me` holds the lock
    #[inline(always)]
    pub fn is_held_by(&self, me: ThreadIdentity) -> bool {
        self.holder.load(Ordering::Acquire) == me.as_u64()
    }
}

impl Default for GlobalLock {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for GlobalLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalLock")
            .field("holder", &self.holder())
            .finish()
    }
}
