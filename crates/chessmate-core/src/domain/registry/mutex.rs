//! Mutex Registry
//!
//! Tracks, per application mutex, whether it is held and by whom. The real
//! mutex is never inspected; this is the scheduler's own view, used to decide
//! whether a locking thread must hand control to the holder first.

use crate::domain::error::RegistryError;
use crate::domain::types::{MutexKey, ThreadIdentity};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Scheduler-side state of one application mutex
///
/// # Invariant
///
/// `owner` is meaningful only while `held` is `true`. [`MutexRecord::owner`]
/// enforces this by returning `None` for a released mutex.
#[derive(Debug)]
pub struct MutexRecord {
    key: MutexKey,
    held: AtomicBool,
    owner: AtomicU64,
}

impl MutexRecord {
    fn new(key: MutexKey) -> Self {
        Self {
            key,
            held: AtomicBool::new(false),
            owner: AtomicU64::new(ThreadIdentity::NONE.as_u64()),
        }
    }

    /// Key this record tracks
    #[inline(always)]
    pub fn key(&self) -> MutexKey {
        self.key
    }

    /// Returns `true` while some thread holds the mutex
    #[inline(always)]
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }

    /// The holding thread, if the mutex is held
    #[inline]
    pub fn owner(&self) -> Option<ThreadIdentity> {
        if self.is_held() {
            Some(ThreadIdentity::new(self.owner.load(Ordering::Acquire)))
        } else {
            None
        }
    }

    /// Record `owner` as the holder
    ///
    /// The owner is stored before `held` is published, so a reader that
    /// observes `held == true` also observes the new owner.
    pub fn claim(&self, owner: ThreadIdentity) {
        self.owner.store(owner.as_u64(), Ordering::Release);
        self.held.store(true, Ordering::Release);
    }

    /// Mark the mutex as not held
    pub fn release(&self) {
        self.held.store(false, Ordering::Release);
    }
}

/// Append-only set of mutex records with a key index
#[derive(Debug, Default)]
pub struct MutexRegistry {
    records: boxcar::Vec<MutexRecord>,
    index: DashMap<MutexKey, usize>,
}

impl MutexRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the record for `key`, creating a not-held record on first sight
    pub fn register(&self, key: MutexKey) -> &MutexRecord {
        let slot = *self
            .index
            .entry(key)
            .or_insert_with(|| self.records.push(MutexRecord::new(key)));

        // Slots come from `push` on this same vector and are never removed.
        &self.records[slot]
    }

    /// Find the record for `key`
    ///
    /// # Errors
    /// - `MutexNotFound` if `key` was never passed to [`MutexRegistry::register`]
    pub fn find(&self, key: MutexKey) -> Result<&MutexRecord, RegistryError> {
        let slot = self
            .index
            .get(&key)
            .map(|entry| *entry.value())
            .ok_or(RegistryError::MutexNotFound(key))?;
        self.records
            .get(slot)
            .ok_or(RegistryError::MutexNotFound(key))
    }

    /// Number of distinct mutexes seen
    #[inline]
    pub fn len(&self) -> usize {
        self.records.count()
    }

    /// Returns `true` if no mutex has been seen
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_registration_is_not_held() {
        let registry = MutexRegistry::new();
        let record = registry.register(MutexKey::new(0x1000));

        assert!(!record.is_held());
        assert_eq!(record.owner(), None);
    }

    #[test]
    fn test_register_is_idempotent() {
        let registry = MutexRegistry::new();
        let key = MutexKey::new(0x1000);

        registry.register(key).claim(ThreadIdentity::new(1));
        let again = registry.register(key);

        assert_eq!(registry.len(), 1);
        assert_eq!(again.owner(), Some(ThreadIdentity::new(1)));
    }

    #[test]
    fn test_claim_and_release() {
        let registry = MutexRegistry::new();
        let record = registry.register(MutexKey::new(8));
        let t1 = ThreadIdentity::new(1);

        record.claim(t1);
        assert!(record.is_held());
        assert_eq!(record.owner(), Some(t1));

        record.release();
        assert!(!record.is_held());
        assert_eq!(record.owner(), None, "owner is hidden once released");
    }

    #[test]
    fn test_find_unknown_returns_not_found() {
        let registry = MutexRegistry::new();
        registry.register(MutexKey::new(1));

        assert!(registry.find(MutexKey::new(1)).is_ok());
        assert_eq!(
            registry.find(MutexKey::new(2)).unwrap_err(),
            RegistryError::MutexNotFound(MutexKey::new(2))
        );
    }

    #[test]
    fn test_distinct_keys_get_distinct_records() {
        let registry = MutexRegistry::new();
        let a = registry.register(MutexKey::new(1));
        let b = registry.register(MutexKey::new(2));

        a.claim(ThreadIdentity::new(7));
        assert!(a.is_held());
        assert!(!b.is_held());
        assert_eq!(registry.len(), 2);
    }
}
