//! Scheduler Controller
//!
//! # Overview
//!
//! A cooperative scheduler that makes two OS threads execute as if
//! single-stepped. Only the thread named by `running_thread` may run program
//! code, and at steady state it holds the global lock. The other thread is
//! parked: it released the global lock and spins until it is named again.
//!
//! # Handoff
//!
//! ```text
//!   thread A (running)                      thread B (parked)
//!   ──────────────────                      ─────────────────
//!   global.release(A)
//!   running_thread = B  ──────────────────> sees running_thread == B
//!   spin until running_thread == A          global.acquire(B)
//!        ...                                 ...runs...
//!                       <────────────────── running_thread = A
//!   global.acquire(A)                        (parks or terminates)
//! ```
//!
//! Fire-and-forget handoff (termination) names the other thread and returns.
//! Handoff-and-wait (join, contended lock, yield) names the other thread and
//! parks.
//!
//! # Schedule Points
//!
//! Creation, every lock attempt and every effective unlock go through the
//! [`SwitchLedger`]. In replay mode the ledger may demand a forced switch,
//! which is carried out as a voluntary yield.
//!
//! # Memory Ordering
//!
//! `running_thread`, `master_id`, thread status and mutex held/owner are all
//! stored with `Release` and loaded with `Acquire`. Everything written by the
//! thread giving up control is visible to the thread it names.

use crate::domain::error::{ControllerError, RegistryError};
use crate::domain::ledger::{PointDecision, SwitchLedger};
use crate::domain::registry::{MutexRegistry, ThreadRegistry};
use crate::domain::types::{MasterIdentity, MutexKey, PointKind, ThreadIdentity, ThreadStatus};
use crate::infrastructure::global_lock::GlobalLock;
use crate::infrastructure::primitives::{PrimitiveProvider, Resolver, ThreadEntry};
use crate::infrastructure::spinner::Spinner;
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, trace, warn};

/// Maximum number of threads the two-party handoff can represent
pub const MAX_THREADS: usize = 2;

/// Process-wide scheduler state and the instrumented operations built on it
pub struct SchedulerController<P: PrimitiveProvider> {
    resolver: Resolver<P>,
    global: GlobalLock,
    running: AtomicU64,
    master: AtomicU64,
    threads: ThreadRegistry,
    mutexes: MutexRegistry,
    ledger: SwitchLedger,
}

impl<P: PrimitiveProvider> SchedulerController<P> {
    /// Controller whose primitives are resolved on first use
    pub fn new(ledger: SwitchLedger) -> Self {
        Self::from_resolver(Resolver::new(), ledger)
    }

    /// Controller around an already constructed provider
    pub fn with_provider(provider: P, ledger: SwitchLedger) -> Self {
        Self::from_resolver(Resolver::with_provider(provider), ledger)
    }

    fn from_resolver(resolver: Resolver<P>, ledger: SwitchLedger) -> Self {
        Self {
            resolver,
            global: GlobalLock::new(),
            running: AtomicU64::new(ThreadIdentity::NONE.as_u64()),
            master: AtomicU64::new(0),
            threads: ThreadRegistry::new(),
            mutexes: MutexRegistry::new(),
            ledger,
        }
    }

    /// The real primitives
    ///
    /// # Panics
    ///
    /// Panics if they cannot be resolved.
    #[inline]
    pub fn provider(&self) -> &P {
        self.resolver.get()
    }

    /// Identity of the calling thread
    #[inline]
    pub fn current_thread(&self) -> ThreadIdentity {
        self.provider().current_thread()
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Instrumented Operations
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Create the second thread
    ///
    /// The creator takes the global lock and keeps it; the created thread
    /// blocks on it until the creator hands off. Both threads are registered
    /// as `Running` and the creation is a schedule point.
    ///
    /// # Errors
    /// - `ThreadLimit` if two threads are already registered
    /// - `Primitive` if the real creation fails
    pub fn spawn(
        self: &Arc<Self>,
        routine: ThreadEntry<P::Exit>,
    ) -> Result<(ThreadIdentity, P::Handle), ControllerError> {
        let provider = self.provider();
        let me = provider.current_thread();
        trace!("{} create", me);

        if self.threads.len() >= MAX_THREADS {
            return Err(ControllerError::ThreadLimit { creator: me });
        }

        self.global.acquire(me, provider);
        self.running.store(me.as_u64(), Ordering::Release);

        let controller = Arc::clone(self);
        let (child, handle) = provider.spawn(Box::new(move || controller.run_created(routine)))?;

        self.threads.register(me, ThreadStatus::Running);
        self.threads.register(child, ThreadStatus::Running);
        self.master
            .store(MasterIdentity::combine(me, child).as_u64(), Ordering::Release);
        debug!("Registered creator {} and child {}", me, child);

        self.schedule_point(PointKind::Create, me);
        Ok((child, handle))
    }

    /// Wait for `target` to terminate, then reap it
    ///
    /// The wait is the handoff protocol, not the real join: the caller names
    /// the target and keeps re-asserting that the other thread should run
    /// until the target's status is `Terminated`. Only then is the real join
    /// used to collect the exit value.
    ///
    /// # Errors
    /// - `Registry` if `target` was never registered
    pub fn join(
        &self,
        target: ThreadIdentity,
        handle: P::Handle,
    ) -> Result<std::thread::Result<P::Exit>, ControllerError> {
        let provider = self.provider();
        let me = provider.current_thread();
        trace!("{} join {}", me, target);

        let record = self.threads.find(target)?;
        self.global.release(me);
        self.running.store(target.as_u64(), Ordering::Release);

        let other = self.master().counterpart(me);
        Spinner::wait_until(provider, || {
            if record.status() == ThreadStatus::Terminated {
                return true;
            }
            self.running.store(other.as_u64(), Ordering::Release);
            false
        });

        self.global.acquire(me, provider);
        debug!("{} joined {}", me, target);
        Ok(provider.join(handle))
    }

    /// Lock an application mutex
    ///
    /// The attempt is a schedule point. If the mutex is held by the other
    /// thread the caller marks itself `Waiting`, hands control to the holder
    /// and spins until control comes back or the mutex is released.
    ///
    /// Locking a mutex the caller already holds goes straight to the real
    /// lock, which for a non-recursive mutex never returns.
    ///
    /// # Errors
    /// - `Registry` if the caller must wait but was never registered
    /// - `Primitive` if the real lock fails
    pub fn lock(&self, mutex: &P::Mutex) -> Result<(), ControllerError> {
        let provider = self.provider();
        let me = provider.current_thread();
        let key = provider.mutex_key(mutex);
        trace!("{} lock {}", me, key);

        self.schedule_point(PointKind::Lock, me);

        let record = self.mutexes.register(key);
        match record.owner() {
            Some(owner) if owner != me => {
                let this = self.threads.find(me)?;
                this.set_status(ThreadStatus::Waiting);
                self.global.release(me);
                self.running.store(owner.as_u64(), Ordering::Release);
                debug!("{} waits for {} held by {}", me, key, owner);

                Spinner::wait_until(provider, || {
                    self.running.load(Ordering::Acquire) == me.as_u64() || !record.is_held()
                });

                self.global.acquire(me, provider);
                this.set_status(ThreadStatus::Running);
                provider.lock(mutex)?;
                record.claim(me);
            }
            _ => {
                provider.lock(mutex)?;
                record.claim(me);
            }
        }
        Ok(())
    }

    /// Unlock an application mutex
    ///
    /// Only the recorded owner's unlock has effect. An effective unlock is a
    /// schedule point. Returns `true` if the mutex was released.
    ///
    /// # Errors
    /// - `Registry` if the mutex was never locked
    /// - `Primitive` if the real unlock fails
    pub fn unlock(&self, mutex: &P::Mutex) -> Result<bool, ControllerError> {
        let provider = self.provider();
        let me = provider.current_thread();
        let key = provider.mutex_key(mutex);
        trace!("{} unlock {}", me, key);

        let record = self.mutexes.find(key)?;
        if record.owner() != Some(me) {
            warn!("{} unlocked {} without holding it; ignored", me, key);
            return Ok(false);
        }

        record.release();
        // SAFETY: the record names `me` as owner, which is only claimed after
        // `me` acquired the real mutex.
        unsafe { provider.unlock(mutex)? };
        self.schedule_point(PointKind::Unlock, me);
        Ok(true)
    }

    /// Hand control to the other thread and wait for it to come back
    ///
    /// A no-op returning `false` when there is no other thread, or when it
    /// has terminated or is waiting on a mutex.
    pub fn yield_now(&self) -> bool {
        let me = self.current_thread();
        trace!("{} yield", me);
        self.yield_from(me)
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Inspection
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Thread currently permitted to run
    #[inline(always)]
    pub fn running_thread(&self) -> ThreadIdentity {
        ThreadIdentity::new(self.running.load(Ordering::Acquire))
    }

    /// Combination of the two registered identities
    #[inline(always)]
    pub fn master(&self) -> MasterIdentity {
        MasterIdentity(self.master.load(Ordering::Acquire))
    }

    /// Status of a registered thread
    ///
    /// # Errors
    /// - `ThreadNotFound` if `thread` was never registered
    pub fn thread_status(&self, thread: ThreadIdentity) -> Result<ThreadStatus, RegistryError> {
        self.threads.find(thread).map(|record| record.status())
    }

    /// Holder of a mutex, `None` if it is not held
    ///
    /// # Errors
    /// - `MutexNotFound` if the mutex was never locked
    pub fn mutex_owner(&self, key: MutexKey) -> Result<Option<ThreadIdentity>, RegistryError> {
        self.mutexes.find(key).map(|record| record.owner())
    }

    /// Registered threads
    #[inline]
    pub fn threads(&self) -> &ThreadRegistry {
        &self.threads
    }

    /// Schedule-point ledger of this run
    #[inline]
    pub fn ledger(&self) -> &SwitchLedger {
        &self.ledger
    }

    /// Global exclusion lock
    #[inline]
    pub fn global_lock(&self) -> &GlobalLock {
        &self.global
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Protocol Steps
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Body of every created thread
    fn run_created(&self, routine: ThreadEntry<P::Exit>) -> P::Exit {
        let provider = self.provider();
        let me = provider.current_thread();
        self.global.acquire(me, provider);
        trace!("{} starts", me);

        let outcome = catch_unwind(AssertUnwindSafe(routine));

        self.global.release(me);
        if let Err(e) = self.terminate(me) {
            error!("{} finished but could not hand off: {}", me, e);
        }

        match outcome {
            Ok(exit) => exit,
            Err(payload) => resume_unwind(payload),
        }
    }

    /// Mark `me` terminated and name the other thread (fire-and-forget)
    fn terminate(&self, me: ThreadIdentity) -> Result<(), ControllerError> {
        self.threads.find(me)?.set_status(ThreadStatus::Terminated);
        let next = self.master().counterpart(me);
        self.running.store(next.as_u64(), Ordering::Release);
        debug!("{} terminated, {} runs", me, next);
        Ok(())
    }

    fn yield_from(&self, me: ThreadIdentity) -> bool {
        let other = self.master().counterpart(me);
        if other == me {
            return false;
        }
        match self.threads.find(other) {
            Ok(record) if record.status().accepts_handoff() => {}
            _ => return false,
        }

        self.global.release(me);
        self.running.store(other.as_u64(), Ordering::Release);
        debug!("{} hands off to {}", me, other);

        let provider = self.provider();
        Spinner::wait_until(provider, || {
            self.running.load(Ordering::Acquire) == me.as_u64()
        });

        self.global.acquire(me, provider);
        true
    }

    fn schedule_point(&self, kind: PointKind, me: ThreadIdentity) {
        if self.ledger.record(kind, me) == PointDecision::ForceSwitch && !self.yield_from(me) {
            debug!("Forced switch at {} by {} found no thread to run", kind, me);
        }
    }
}

impl<P: PrimitiveProvider> std::fmt::Debug for SchedulerController<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerController")
            .field("running", &self.running_thread())
            .field("master", &self.master())
            .field("threads", &self.threads.len())
            .field("mutexes", &self.mutexes.len())
            .field("ledger", &self.ledger)
            .finish()
    }
}
