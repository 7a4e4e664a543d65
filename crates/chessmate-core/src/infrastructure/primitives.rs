//! Real (Non-Instrumented) Primitives
//!
//! # Overview
//!
//! The controller never calls the public thread or mutex API it replaces;
//! doing so from inside an interposed `pthread_mutex_lock` would recurse
//! straight back into the controller. Instead it calls through a
//! [`PrimitiveProvider`], resolved once per process by a [`Resolver`].
//!
//! ```text
//! instrumented call ──> SchedulerController ──> Resolver<P> ──> P (real ops)
//!                                                  │
//!                                                  └─ P::resolve() runs once
//! ```
//!
//! Two providers exist:
//!
//! - [`StdPrimitives`]: `std::thread` and `parking_lot::RawMutex`, used by the
//!   drop-in surface in [`crate::thread`] and [`crate::sync`].
//! - `PthreadPrimitives` in the preload crate: the real `pthread_*` symbols
//!   located with `dlsym(RTLD_NEXT, ..)`.

use crate::domain::error::PrimitiveError;
use crate::domain::types::{MutexKey, ThreadIdentity};
use once_cell::sync::OnceCell;
use parking_lot::lock_api::RawMutex as _;
use std::cell::Cell;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Entry point handed to [`PrimitiveProvider::spawn`]
pub type ThreadEntry<E> = Box<dyn FnOnce() -> E + Send + 'static>;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Provider Trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Capability: the real thread and mutex operations
///
/// # Safety Contract
///
/// Implementations must not route any of these operations through code the
/// controller instruments. In particular [`PrimitiveProvider::relax`] must not
/// call an interposed `sched_yield`.
pub trait PrimitiveProvider: Send + Sync + Sized + 'static {
    /// The real application mutex
    type Mutex: ?Sized;

    /// Real join handle of a created thread
    type Handle: Send;

    /// Value a thread's entry point returns
    type Exit: Send + 'static;

    /// Locate the real primitives
    ///
    /// # Errors
    /// - `PrimitiveError::Unresolved` if a primitive cannot be found
    fn resolve() -> Result<Self, PrimitiveError>;

    /// Identity of the calling thread
    fn current_thread(&self) -> ThreadIdentity;

    /// Start `entry` on a new OS thread
    ///
    /// Returns the new thread's identity as soon as it is known, which may be
    /// before `entry` starts running.
    fn spawn(
        &self,
        entry: ThreadEntry<Self::Exit>,
    ) -> Result<(ThreadIdentity, Self::Handle), PrimitiveError>;

    /// Wait for the OS thread to finish and collect its exit value
    fn join(&self, handle: Self::Handle) -> std::thread::Result<Self::Exit>;

    /// Identity of an application mutex
    fn mutex_key(&self, mutex: &Self::Mutex) -> MutexKey;

    /// Acquire the real mutex
    fn lock(&self, mutex: &Self::Mutex) -> Result<(), PrimitiveError>;

    /// Release the real mutex
    ///
    /// # Safety
    ///
    /// The calling thread must currently hold `mutex`.
    unsafe fn unlock(&self, mutex: &Self::Mutex) -> Result<(), PrimitiveError>;

    /// Give the CPU away during a long spin
    #[inline]
    fn relax(&self) {
        std::hint::spin_loop();
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Resolver
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Lazily resolved, process-lifetime provider
///
/// ```rust
/// use chessmate::infrastructure::{Resolver, StdPrimitives, PrimitiveProvider};
///
/// let resolver = Resolver::<StdPrimitives>::new();
/// let me = resolver.get().current_thread();
/// assert_eq!(resolver.get().current_thread(), me);
/// ```
#[derive(Debug)]
pub struct Resolver<P> {
    cell: OnceCell<P>,
}

impl<P: PrimitiveProvider> Resolver<P> {
    /// Unresolved resolver; nothing is looked up until first use
    pub const fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    /// Resolver around an already constructed provider
    pub fn with_provider(provider: P) -> Self {
        Self {
            cell: OnceCell::with_value(provider),
        }
    }

    /// Resolve on first call, then return the cached provider
    ///
    /// # Errors
    /// - Whatever `P::resolve` reported. A failed resolution is retried on
    ///   the next call.
    pub fn try_get(&self) -> Result<&P, PrimitiveError> {
        self.cell.get_or_try_init(P::resolve)
    }

    /// Resolve on first call, then return the cached provider
    ///
    /// # Panics
    ///
    /// Panics if the real primitives cannot be resolved. No instrumented
    /// operation can make progress without them.
    pub fn get(&self) -> &P {
        match self.try_get() {
            Ok(provider) => provider,
            Err(e) => panic!("unable to resolve real threading primitives: {e}"),
        }
    }

    /// Returns `true` once resolution has succeeded
    #[inline]
    pub fn is_resolved(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl<P: PrimitiveProvider> Default for Resolver<P> {
    fn default() -> Self {
        Self::new()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Std Provider
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

static NEXT_THREAD: AtomicU64 = AtomicU64::new(1);
static NEXT_MUTEX: AtomicUsize = AtomicUsize::new(1);

thread_local! {
    static CURRENT: Cell<u64> = const { Cell::new(0) };
}

fn fresh_thread_identity() -> u64 {
    NEXT_THREAD.fetch_add(1, Ordering::Relaxed)
}

/// Real mutex used by [`StdPrimitives`]
///
/// The key is taken from a process-wide counter at construction, so it stays
/// stable when the owning value is moved.
pub struct RawLock {
    key: MutexKey,
    raw: parking_lot::RawMutex,
}

impl RawLock {
    /// New unlocked mutex with a fresh key
    pub fn new() -> Self {
        Self {
            key: MutexKey::new(NEXT_MUTEX.fetch_add(1, Ordering::Relaxed)),
            raw: parking_lot::RawMutex::INIT,
        }
    }

    /// Key of this mutex
    #[inline(always)]
    pub fn key(&self) -> MutexKey {
        self.key
    }
}

impl Default for RawLock {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RawLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawLock")
            .field("key", &self.key)
            .field("locked", &self.raw.is_locked())
            .finish()
    }
}

/// Real primitives for Rust programs
///
/// Thread identities are handed out from a counter starting at 1, lazily for
/// threads the provider did not create.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdPrimitives;

impl PrimitiveProvider for StdPrimitives {
    type Mutex = RawLock;
    type Handle = std::thread::JoinHandle<()>;
    type Exit = ();

    fn resolve() -> Result<Self, PrimitiveError> {
        Ok(Self)
    }

    fn current_thread(&self) -> ThreadIdentity {
        CURRENT.with(|current| {
            if current.get() == 0 {
                current.set(fresh_thread_identity());
            }
            ThreadIdentity::new(current.get())
        })
    }

    fn spawn(
        &self,
        entry: ThreadEntry<()>,
    ) -> Result<(ThreadIdentity, Self::Handle), PrimitiveError> {
        let raw = fresh_thread_identity();
        let handle = std::thread::Builder::new()
            .name(format!("chessmate-t{raw}"))
            .spawn(move || {
                CURRENT.with(|current| current.set(raw));
                entry()
            })?;
        Ok((ThreadIdentity::new(raw), handle))
    }

    fn join(&self, handle: Self::Handle) -> std::thread::Result<()> {
        handle.join()
    }

    #[inline]
    fn mutex_key(&self, mutex: &RawLock) -> MutexKey {
        mutex.key
    }

    fn lock(&self, mutex: &RawLock) -> Result<(), PrimitiveError> {
        mutex.raw.lock();
        Ok(())
    }

    unsafe fn unlock(&self, mutex: &RawLock) -> Result<(), PrimitiveError> {
        // SAFETY: forwarded from the caller's contract.
        unsafe { mutex.raw.unlock() };
        Ok(())
    }

    fn relax(&self) {
        std::thread::yield_now();
    }
}
