//! Runtime Handle
//!
//! Binds the [`SchedulerController`] to `std` primitives and gives the
//! drop-in surface one shared controller per process.

use super::thread::JoinHandle;
use crate::domain::controller::SchedulerController;
use crate::domain::ledger::SwitchLedger;
use crate::domain::types::ThreadIdentity;
use crate::infrastructure::config::ChessConfig;
use crate::infrastructure::primitives::StdPrimitives;
use crate::infrastructure::sequence_file::{open_ledger, SequenceError};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;

static GLOBAL: Lazy<Runtime> = Lazy::new(|| {
    let config = ChessConfig::from_env();
    match Runtime::from_config(&config) {
        Ok(runtime) => runtime,
        Err(e) => panic!("chessmate: cannot start scheduler: {e}"),
    }
});

/// Cloneable handle to a scheduler controller
#[derive(Clone, Debug)]
pub struct Runtime {
    controller: Arc<SchedulerController<StdPrimitives>>,
}

impl Runtime {
    /// Runtime with its own controller
    pub fn new(ledger: SwitchLedger) -> Self {
        Self {
            controller: Arc::new(SchedulerController::new(ledger)),
        }
    }

    /// Runtime whose mode comes from the sequence file
    ///
    /// # Errors
    /// - `SequenceError` if the file exists but cannot be read or parsed, or
    ///   cannot be created
    pub fn from_config(config: &ChessConfig) -> Result<Self, SequenceError> {
        let ledger = open_ledger(&config.sequence_path)?;
        info!("Scheduler started in {} mode", ledger.mode());
        Ok(Self::new(ledger))
    }

    /// The process-wide runtime, built from the environment on first use
    ///
    /// # Panics
    ///
    /// Panics if the sequence file is unusable.
    pub fn global() -> &'static Runtime {
        &GLOBAL
    }

    /// The underlying controller
    #[inline]
    pub fn controller(&self) -> &SchedulerController<StdPrimitives> {
        &self.controller
    }

    /// Schedule-point ledger of this runtime
    #[inline]
    pub fn ledger(&self) -> &SwitchLedger {
        self.controller.ledger()
    }

    /// Identity of the calling thread
    #[inline]
    pub fn current_thread(&self) -> ThreadIdentity {
        self.controller.current_thread()
    }

    /// Create the second thread
    ///
    /// # Panics
    ///
    /// Panics if two threads already exist or the OS refuses to create one.
    pub fn spawn<F, T>(&self, f: F) -> JoinHandle<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let slot = Arc::new(Mutex::new(None));
        let out = Arc::clone(&slot);
        let entry = Box::new(move || {
            let value = f();
            *out.lock() = Some(value);
        });

        match self.controller.spawn(entry) {
            Ok((thread, inner)) => JoinHandle::new(self.clone(), thread, inner, slot),
            Err(e) => panic!("chessmate: {e}"),
        }
    }

    /// Hand control to the other thread; `false` if there was nobody to run
    pub fn yield_now(&self) -> bool {
        self.controller.yield_now()
    }
}
