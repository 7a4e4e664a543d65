//! Chessmate pthread Interposer
//!
//! # Overview
//!
//! Built as a `cdylib` and loaded with `LD_PRELOAD`, this library takes over
//! five symbols of an unmodified C program:
//!
//! ```text
//! pthread_create        → SchedulerController::spawn
//! pthread_join          → SchedulerController::join
//! pthread_mutex_lock    → SchedulerController::lock
//! pthread_mutex_unlock  → SchedulerController::unlock
//! sched_yield           → SchedulerController::yield_now
//! ```
//!
//! The controller is built on first use. Its mode comes from the sequence
//! file named by `CHESS_SEQUENCE` (default `chess_sequence`).
//!
//! # Re-entry
//!
//! Code running inside the controller (the std runtime, `parking_lot`) may
//! itself call `sched_yield` or a pthread mutex function, which would land
//! back here. A per-thread flag marks "inside the controller"; nested calls
//! go straight to the real primitive.
//!
//! # Failure
//!
//! Contract violations (a third thread, joining an unknown thread) and an
//! unusable sequence file print a diagnostic to stderr and abort. Failures
//! of the real primitive are returned to the caller as its error code.

mod primitives;

use chessmate::domain::{ControllerError, PrimitiveError, RegistryError, SchedulerController};
use chessmate::infrastructure::{open_ledger, ChessConfig, Resolver};
use libc::{c_int, c_void, pthread_attr_t, pthread_mutex_t, pthread_t};
use once_cell::sync::Lazy;
use primitives::{ExitValue, PthreadMutex, PthreadPrimitives};
use std::cell::Cell;
use std::fmt::Display;
use std::sync::Arc;
use tracing::{trace, warn};

static REAL: Resolver<PthreadPrimitives> = Resolver::new();

static CONTROLLER: Lazy<Arc<SchedulerController<PthreadPrimitives>>> = Lazy::new(|| {
    init_logging();
    let config = ChessConfig::from_env();
    match open_ledger(&config.sequence_path) {
        Ok(ledger) => Arc::new(SchedulerController::with_provider(*REAL.get(), ledger)),
        Err(e) => fatal(e),
    }
});

thread_local! {
    static INSIDE: Cell<bool> = const { Cell::new(false) };
}

/// Marks the current thread as inside the controller until dropped
struct Reentry;

impl Reentry {
    /// `None` if the thread is already inside
    fn enter() -> Option<Self> {
        INSIDE.with(|inside| {
            if inside.get() {
                None
            } else {
                inside.set(true);
                Some(Self)
            }
        })
    }
}

impl Drop for Reentry {
    fn drop(&mut self) {
        INSIDE.with(|inside| inside.set(false));
    }
}

/// Log to stderr when `RUST_LOG` is set; the program's stdout is its own
fn init_logging() {
    if std::env::var_os("RUST_LOG").is_some() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .try_init();
    }
}

fn fatal(message: impl Display) -> ! {
    eprintln!("chessmate: {message}");
    std::process::abort()
}

fn primitive_code(error: ControllerError) -> c_int {
    match error {
        ControllerError::Primitive(PrimitiveError::Failed { code, .. }) => code,
        other => fatal(other),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Exported Symbols
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Instrumented `pthread_create`
///
/// # Safety
///
/// Same contract as `pthread_create(3)`.
#[no_mangle]
pub unsafe extern "C" fn pthread_create(
    thread: *mut pthread_t,
    attr: *const pthread_attr_t,
    start_routine: extern "C" fn(*mut c_void) -> *mut c_void,
    arg: *mut c_void,
) -> c_int {
    let Some(_inside) = Reentry::enter() else {
        fatal("pthread_create called from inside the scheduler");
    };
    trace!("pthread_create");

    let arg = arg as usize;
    primitives::set_pending_attr(attr);
    let routine = Box::new(move || ExitValue::new(start_routine(arg as *mut c_void)));

    match CONTROLLER.spawn(routine) {
        Ok((_, created)) => {
            if !thread.is_null() {
                // SAFETY: caller provided a writable out-pointer.
                unsafe { *thread = created };
            }
            0
        }
        Err(e) => primitive_code(e),
    }
}

/// Instrumented `pthread_join`
///
/// # Safety
///
/// Same contract as `pthread_join(3)`.
#[no_mangle]
pub unsafe extern "C" fn pthread_join(thread: pthread_t, retval: *mut *mut c_void) -> c_int {
    let Some(_inside) = Reentry::enter() else {
        fatal("pthread_join called from inside the scheduler");
    };
    trace!("pthread_join");

    let target = chessmate::ThreadIdentity::new(thread as u64);
    match CONTROLLER.join(target, thread) {
        Ok(Ok(exit)) => {
            if !retval.is_null() {
                // SAFETY: caller provided a writable out-pointer.
                unsafe { *retval = exit.as_ptr() };
            }
            0
        }
        Ok(Err(payload)) => match payload.downcast::<PrimitiveError>() {
            Ok(e) => primitive_code(ControllerError::Primitive(*e)),
            Err(_) => fatal("joined thread panicked"),
        },
        Err(e) => primitive_code(e),
    }
}

/// Instrumented `pthread_mutex_lock`
///
/// # Safety
///
/// Same contract as `pthread_mutex_lock(3)`.
#[no_mangle]
pub unsafe extern "C" fn pthread_mutex_lock(mutex: *mut pthread_mutex_t) -> c_int {
    if mutex.is_null() {
        return libc::EINVAL;
    }
    let Some(_inside) = Reentry::enter() else {
        // SAFETY: forwarded unchanged.
        return unsafe { REAL.get().raw_lock(mutex) };
    };

    // SAFETY: non-null application mutex, alive for the call.
    let mutex = unsafe { PthreadMutex::from_ptr(mutex) };
    match CONTROLLER.lock(mutex) {
        Ok(()) => 0,
        Err(e) => primitive_code(e),
    }
}

/// Instrumented `pthread_mutex_unlock`
///
/// An unlock by a thread that does not hold the mutex returns 0 and does
/// nothing. A mutex never locked through the scheduler is unlocked directly.
///
/// # Safety
///
/// Same contract as `pthread_mutex_unlock(3)`.
#[no_mangle]
pub unsafe extern "C" fn pthread_mutex_unlock(mutex: *mut pthread_mutex_t) -> c_int {
    if mutex.is_null() {
        return libc::EINVAL;
    }
    let Some(_inside) = Reentry::enter() else {
        // SAFETY: forwarded unchanged.
        return unsafe { REAL.get().raw_unlock(mutex) };
    };

    // SAFETY: non-null application mutex, alive for the call.
    let record = unsafe { PthreadMutex::from_ptr(mutex) };
    match CONTROLLER.unlock(record) {
        Ok(_) => 0,
        Err(ControllerError::Registry(RegistryError::MutexNotFound(key))) => {
            warn!("{} was never locked through the scheduler; unlocking directly", key);
            // SAFETY: forwarded unchanged.
            unsafe { REAL.get().raw_unlock(mutex) }
        }
        Err(e) => primitive_code(e),
    }
}

/// Instrumented `sched_yield`
#[no_mangle]
pub extern "C" fn sched_yield() -> c_int {
    let Some(_inside) = Reentry::enter() else {
        return REAL.get().raw_yield();
    };
    trace!("sched_yield");

    CONTROLLER.yield_now();
    0
}
