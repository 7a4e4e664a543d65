//! Instrumented Threads
//!
//! Drop-in counterparts of `std::thread::spawn`, `JoinHandle::join` and
//! `std::thread::yield_now` that run through the process-wide
//! [`Runtime`](super::runtime::Runtime).
//!
//! ```rust,no_run
//! let handle = chessmate::thread::spawn(|| "from the child");
//! chessmate::thread::yield_now();
//! assert_eq!(handle.join().unwrap(), "from the child");
//! ```

use super::runtime::Runtime;
use crate::domain::types::ThreadIdentity;
use parking_lot::Mutex;
use std::any::Any;
use std::sync::Arc;

/// Owned permission to join an instrumented thread
#[derive(Debug)]
pub struct JoinHandle<T> {
    runtime: Runtime,
    thread: ThreadIdentity,
    inner: std::thread::JoinHandle<()>,
    slot: Arc<Mutex<Option<T>>>,
}

impl<T> JoinHandle<T> {
    pub(super) fn new(
        runtime: Runtime,
        thread: ThreadIdentity,
        inner: std::thread::JoinHandle<()>,
        slot: Arc<Mutex<Option<T>>>,
    ) -> Self {
        Self {
            runtime,
            thread,
            inner,
            slot,
        }
    }

    /// Identity of the thread
    #[inline(always)]
    pub fn thread(&self) -> ThreadIdentity {
        self.thread
    }

    /// Wait for the thread through the handoff protocol
    ///
    /// Returns `Err` with the panic payload if the thread panicked.
    ///
    /// # Panics
    ///
    /// Panics if the thread is unknown to the runtime that created it.
    pub fn join(self) -> std::thread::Result<T> {
        let outcome = match self.runtime.controller().join(self.thread, self.inner) {
            Ok(outcome) => outcome,
            Err(e) => panic!("chessmate: {e}"),
        };
        outcome?;

        let value = self.slot.lock().take();
        value.ok_or_else(|| Box::new("chessmate: thread finished without a value") as Box<dyn Any + Send>)
    }
}

/// Create the second thread on the process-wide runtime
///
/// # Panics
///
/// Panics if a thread was already created.
pub fn spawn<F, T>(f: F) -> JoinHandle<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    Runtime::global().spawn(f)
}

/// Hand control to the other thread if it can run
pub fn yield_now() {
    Runtime::global().yield_now();
}

#[cfg(test)]
mod tests {
    use crate::adapters::runtime::Runtime;
    use crate::domain::ledger::SwitchLedger;

    #[test]
    fn test_join_returns_value() {
        let runtime = Runtime::new(SwitchLedger::explore());
        let handle = runtime.spawn(|| vec![1, 2, 3]);
        assert_ne!(handle.thread(), runtime.current_thread());
        assert_eq!(handle.join().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_join_surfaces_panic_payload() {
        let runtime = Runtime::new(SwitchLedger::explore());
        let handle = runtime.spawn(|| -> u32 { panic!("boom") });

        let payload = handle.join().unwrap_err();
        assert_eq!(payload.downcast_ref::<&str>(), Some(&"boom"));
    }
}
