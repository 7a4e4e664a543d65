//! Thread Registry

use crate::domain::error::RegistryError;
use crate::domain::types::{ThreadIdentity, ThreadStatus};
use std::sync::atomic::{AtomicU8, Ordering};

/// Slot of a record inside the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThreadHandle(pub usize);

/// One observed thread
#[derive(Debug)]
pub struct ThreadRecord {
    identity: ThreadIdentity,
    status: AtomicU8,
}

impl ThreadRecord {
    fn new(identity: ThreadIdentity, status: ThreadStatus) -> Self {
        Self {
            identity,
            status: AtomicU8::new(status.as_u8()),
        }
    }

    /// Identity this record tracks
    #[inline(always)]
    pub fn identity(&self) -> ThreadIdentity {
        self.identity
    }

    /// Current status
    #[inline(always)]
    pub fn status(&self) -> ThreadStatus {
        ThreadStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    /// Publish a new status
    ///
    /// `Terminated` is absorbing: once stored, later writes are ignored.
    pub fn set_status(&self, status: ThreadStatus) {
        let _ = self
            .status
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                if current == ThreadStatus::Terminated.as_u8() {
                    None
                } else {
                    Some(status.as_u8())
                }
            });
    }
}

/// Append-only set of thread records
///
/// # Performance
///
/// `find` is a linear scan. The controller never registers more than two
/// threads, so this is two comparisons at most.
#[derive(Debug, Default)]
pub struct ThreadRegistry {
    records: boxcar::Vec<ThreadRecord>,
}

impl ThreadRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record at the tail
    pub fn register(&self, identity: ThreadIdentity, status: ThreadStatus) -> ThreadHandle {
        ThreadHandle(self.records.push(ThreadRecord::new(identity, status)))
    }

    /// Find the record for `identity`
    ///
    /// # Errors
    /// - `ThreadNotFound` if the identity was never registered
    pub fn find(&self, identity: ThreadIdentity) -> Result<&ThreadRecord, RegistryError> {
        self.records
            .iter()
            .map(|(_, record)| record)
            .find(|record| record.identity == identity)
            .ok_or(RegistryError::ThreadNotFound(identity))
    }

    /// Get a record by slot
    #[inline]
    pub fn get(&self, handle: ThreadHandle) -> Option<&ThreadRecord> {
        self.records.get(handle.0)
    }

    /// Number of registered threads
    #[inline]
    pub fn len(&self) -> usize {
        self.records.count()
    }

    /// Returns `true` if no thread has been registered
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over all records in registration order
    pub fn iter(&self) -> impl Iterator<Item = &ThreadRecord> + '_ {
        self.records.iter().map(|(_, record)| record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_find() {
        let registry = ThreadRegistry::new();
        let main = ThreadIdentity::new(1);
        let child = ThreadIdentity::new(2);

        let h_main = registry.register(main, ThreadStatus::Running);
        let h_child = registry.register(child, ThreadStatus::Running);

        assert_eq!(registry.len(), 2);
        assert_ne!(h_main, h_child);
        assert_eq!(registry.find(child).unwrap().identity(), child);
        assert_eq!(registry.get(h_main).unwrap().identity(), main);
    }

    #[test]
    fn test_find_unknown_returns_not_found() {
        let registry = ThreadRegistry::new();
        registry.register(ThreadIdentity::new(1), ThreadStatus::Running);

        let err = registry.find(ThreadIdentity::new(99)).unwrap_err();
        assert_eq!(err, RegistryError::ThreadNotFound(ThreadIdentity::new(99)));
    }

    #[test]
    fn test_status_transitions() {
        let registry = ThreadRegistry::new();
        let id = ThreadIdentity::new(1);
        registry.register(id, ThreadStatus::Running);
        let record = registry.find(id).unwrap();

        record.set_status(ThreadStatus::Waiting);
        assert_eq!(record.status(), ThreadStatus::Waiting);

        record.set_status(ThreadStatus::Running);
        assert_eq!(record.status(), ThreadStatus::Running);

        record.set_status(ThreadStatus::Terminated);
        assert_eq!(record.status(), ThreadStatus::Terminated);
    }

    #[test]
    fn test_terminated_is_absorbing() {
        let registry = ThreadRegistry::new();
        let id = ThreadIdentity::new(1);
        registry.register(id, ThreadStatus::Terminated);
        let record = registry.find(id).unwrap();

        record.set_status(ThreadStatus::Running);
        assert_eq!(record.status(), ThreadStatus::Terminated);
    }

    #[test]
    fn test_records_are_stable_across_appends() {
        let registry = ThreadRegistry::new();
        registry.register(ThreadIdentity::new(1), ThreadStatus::Running);
        let first = registry.find(ThreadIdentity::new(1)).unwrap();

        for raw in 2..64 {
            registry.register(ThreadIdentity::new(raw), ThreadStatus::Running);
        }

        assert_eq!(first.identity(), ThreadIdentity::new(1));
        assert_eq!(registry.iter().count(), 63);
    }
}
