//! Instrumented Mutex
//!
//! [`Mutex`] mirrors `std::sync::Mutex` without poisoning: every `lock` is a
//! schedule point and dropping the guard is the unlock.

use super::runtime::Runtime;
use crate::domain::types::MutexKey;
use crate::infrastructure::primitives::RawLock;
use std::cell::UnsafeCell;
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use tracing::error;

/// Mutual exclusion scheduled by a [`Runtime`]
pub struct Mutex<T: ?Sized> {
    runtime: Runtime,
    raw: RawLock,
    data: UnsafeCell<T>,
}

// SAFETY: access to `data` is serialized by `raw`, as in `std::sync::Mutex`.
unsafe impl<T: ?Sized + Send> Send for Mutex<T> {}
unsafe impl<T: ?Sized + Send> Sync for Mutex<T> {}

impl<T> Mutex<T> {
    /// New mutex on the process-wide runtime
    pub fn new(value: T) -> Self {
        Self::with_runtime(Runtime::global().clone(), value)
    }

    /// New mutex on an explicit runtime
    pub fn with_runtime(runtime: Runtime, value: T) -> Self {
        Self {
            runtime,
            raw: RawLock::new(),
            data: UnsafeCell::new(value),
        }
    }

    /// Consume the mutex, returning the data
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: ?Sized> Mutex<T> {
    /// Acquire the mutex, parking this thread while the other one holds it
    ///
    /// # Panics
    ///
    /// Panics if the calling thread must wait but is unknown to the runtime.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        if let Err(e) = self.runtime.controller().lock(&self.raw) {
            panic!("chessmate: {e}");
        }
        MutexGuard {
            mutex: self,
            _not_send: PhantomData,
        }
    }

    /// Mutable access without locking; the borrow proves exclusivity
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    /// Key the scheduler tracks this mutex under
    #[inline(always)]
    pub fn key(&self) -> MutexKey {
        self.raw.key()
    }
}

impl<T: Default> Default for Mutex<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: ?Sized> fmt::Debug for Mutex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutex").field("key", &self.key()).finish_non_exhaustive()
    }
}

/// Scoped lock; dropping it unlocks
#[must_use = "if unused the Mutex will immediately unlock"]
pub struct MutexGuard<'a, T: ?Sized> {
    mutex: &'a Mutex<T>,
    _not_send: PhantomData<*const ()>,
}

// SAFETY: a shared guard only hands out `&T`.
unsafe impl<T: ?Sized + Sync> Sync for MutexGuard<'_, T> {}

impl<T: ?Sized> Deref for MutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the guard proves the lock is held.
        unsafe { &*self.mutex.data.get() }
    }
}

impl<T: ?Sized> DerefMut for MutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: the guard proves the lock is held.
        unsafe { &mut *self.mutex.data.get() }
    }
}

impl<T: ?Sized> Drop for MutexGuard<'_, T> {
    fn drop(&mut self) {
        if let Err(e) = self.mutex.runtime.controller().unlock(&self.mutex.raw) {
            error!("Failed to unlock {}: {}", self.mutex.key(), e);
        }
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for MutexGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ledger::SwitchLedger;
    use std::sync::Arc;

    #[test]
    fn test_lock_guards_data() {
        let runtime = Runtime::new(SwitchLedger::explore());
        let mutex = Mutex::with_runtime(runtime.clone(), 0);

        *mutex.lock() += 5;
        *mutex.lock() += 1;

        assert_eq!(*mutex.lock(), 6);
        assert_eq!(runtime.ledger().count(), 6, "three locks, three unlocks");
    }

    #[test]
    fn test_guard_drop_releases_ownership() {
        let runtime = Runtime::new(SwitchLedger::explore());
        let mutex = Mutex::with_runtime(runtime.clone(), ());
        let me = runtime.current_thread();

        let guard = mutex.lock();
        assert_eq!(runtime.controller().mutex_owner(mutex.key()).unwrap(), Some(me));
        drop(guard);
        assert_eq!(runtime.controller().mutex_owner(mutex.key()).unwrap(), None);
    }

    #[test]
    fn test_get_mut_and_into_inner_skip_the_scheduler() {
        let runtime = Runtime::new(SwitchLedger::explore());
        let mut mutex = Mutex::with_runtime(runtime.clone(), String::from("a"));

        mutex.get_mut().push('b');
        assert_eq!(mutex.into_inner(), "ab");
        assert_eq!(runtime.ledger().count(), 0);
    }

    #[test]
    fn test_shared_between_two_threads() {
        let runtime = Runtime::new(SwitchLedger::explore());
        let counter = Arc::new(Mutex::with_runtime(runtime.clone(), 0u32));

        let child = {
            let counter = counter.clone();
            runtime.spawn(move || {
                for _ in 0..10 {
                    *counter.lock() += 1;
                }
            })
        };
        for _ in 0..10 {
            *counter.lock() += 1;
        }
        child.join().unwrap();

        assert_eq!(*counter.lock(), 20);
    }
}
