//! Real pthread Primitives
//!
//! The preload library exports `pthread_create`, `pthread_join`,
//! `pthread_mutex_lock`, `pthread_mutex_unlock` and `sched_yield` itself, so
//! the real ones are found with `dlsym(RTLD_NEXT, ..)`: the next definition
//! in load order after this library.

use chessmate::domain::{MutexKey, PrimitiveError, ThreadIdentity};
use chessmate::infrastructure::{PrimitiveProvider, ThreadEntry};
use libc::{c_int, c_void, pthread_attr_t, pthread_mutex_t, pthread_t};
use std::cell::{Cell, UnsafeCell};
use std::ffi::CStr;
use std::ptr;

type StartRoutine = extern "C" fn(*mut c_void) -> *mut c_void;
type CreateFn =
    unsafe extern "C" fn(*mut pthread_t, *const pthread_attr_t, StartRoutine, *mut c_void) -> c_int;
type JoinFn = unsafe extern "C" fn(pthread_t, *mut *mut c_void) -> c_int;
type MutexFn = unsafe extern "C" fn(*mut pthread_mutex_t) -> c_int;
type YieldFn = unsafe extern "C" fn() -> c_int;

thread_local! {
    static PENDING_ATTR: Cell<*const pthread_attr_t> = const { Cell::new(ptr::null()) };
}

/// Attributes for the next creation on this thread
///
/// The controller's `spawn` only carries the entry point, so the caller's
/// `pthread_attr_t` travels beside it.
pub fn set_pending_attr(attr: *const pthread_attr_t) {
    PENDING_ATTR.with(|pending| pending.set(attr));
}

/// Value returned by a thread's start routine
#[derive(Debug, Clone, Copy)]
pub struct ExitValue(usize);

impl ExitValue {
    /// Wrap a start routine's return value
    pub fn new(value: *mut c_void) -> Self {
        Self(value as usize)
    }

    /// The original pointer
    pub fn as_ptr(self) -> *mut c_void {
        self.0 as *mut c_void
    }
}

/// A `pthread_mutex_t` as seen by the controller
#[repr(transparent)]
pub struct PthreadMutex(UnsafeCell<pthread_mutex_t>);

impl PthreadMutex {
    /// View an application mutex
    ///
    /// # Safety
    ///
    /// `mutex` must be non-null and point to a mutex that outlives `'a`.
    pub unsafe fn from_ptr<'a>(mutex: *mut pthread_mutex_t) -> &'a Self {
        // SAFETY: repr(transparent) over UnsafeCell<pthread_mutex_t>.
        unsafe { &*(mutex as *const Self) }
    }

    fn as_ptr(&self) -> *mut pthread_mutex_t {
        self.0.get()
    }
}

/// The real pthread entry points
#[derive(Debug, Clone, Copy)]
pub struct PthreadPrimitives {
    create: CreateFn,
    join: JoinFn,
    lock: MutexFn,
    unlock: MutexFn,
    sched_yield: YieldFn,
}

fn next_symbol(name: &'static CStr) -> Result<*mut c_void, PrimitiveError> {
    // SAFETY: `name` is NUL-terminated; RTLD_NEXT is valid from a shared object.
    let symbol = unsafe { libc::dlsym(libc::RTLD_NEXT, name.as_ptr()) };
    if symbol.is_null() {
        return Err(PrimitiveError::Unresolved {
            symbol: name.to_str().unwrap_or("<non-utf8>"),
        });
    }
    Ok(symbol)
}

fn check(operation: &'static str, code: c_int) -> Result<(), PrimitiveError> {
    if code == 0 {
        Ok(())
    } else {
        Err(PrimitiveError::Failed { operation, code })
    }
}

extern "C" fn trampoline(arg: *mut c_void) -> *mut c_void {
    // SAFETY: `arg` was produced by `Box::into_raw` in `spawn` and is
    // consumed exactly once, here.
    let entry = unsafe { Box::from_raw(arg.cast::<ThreadEntry<ExitValue>>()) };
    entry().as_ptr()
}

impl PthreadPrimitives {
    /// Release a mutex without going through the controller
    ///
    /// # Safety
    ///
    /// Same contract as the real `pthread_mutex_unlock`.
    pub unsafe fn raw_unlock(&self, mutex: *mut pthread_mutex_t) -> c_int {
        unsafe { (self.unlock)(mutex) }
    }

    /// Acquire a mutex without going through the controller
    ///
    /// # Safety
    ///
    /// Same contract as the real `pthread_mutex_lock`.
    pub unsafe fn raw_lock(&self, mutex: *mut pthread_mutex_t) -> c_int {
        unsafe { (self.lock)(mutex) }
    }

    /// The real `sched_yield`
    pub fn raw_yield(&self) -> c_int {
        // SAFETY: sched_yield has no preconditions.
        unsafe { (self.sched_yield)() }
    }
}

impl PrimitiveProvider for PthreadPrimitives {
    type Mutex = PthreadMutex;
    type Handle = pthread_t;
    type Exit = ExitValue;

    fn resolve() -> Result<Self, PrimitiveError> {
        // SAFETY: each symbol is the libc function with the matching signature.
        unsafe {
            Ok(Self {
                create: std::mem::transmute::<*mut c_void, CreateFn>(next_symbol(
                    c"pthread_create",
                )?),
                join: std::mem::transmute::<*mut c_void, JoinFn>(next_symbol(c"pthread_join")?),
                lock: std::mem::transmute::<*mut c_void, MutexFn>(next_symbol(
                    c"pthread_mutex_lock",
                )?),
                unlock: std::mem::transmute::<*mut c_void, MutexFn>(next_symbol(
                    c"pthread_mutex_unlock",
                )?),
                sched_yield: std::mem::transmute::<*mut c_void, YieldFn>(next_symbol(
                    c"sched_yield",
                )?),
            })
        }
    }

    fn current_thread(&self) -> ThreadIdentity {
        // SAFETY: pthread_self has no preconditions.
        ThreadIdentity::new(unsafe { libc::pthread_self() } as u64)
    }

    fn spawn(
        &self,
        entry: ThreadEntry<ExitValue>,
    ) -> Result<(ThreadIdentity, pthread_t), PrimitiveError> {
        let attr = PENDING_ATTR.with(|pending| pending.replace(ptr::null()));
        let arg = Box::into_raw(Box::new(entry)).cast::<c_void>();

        let mut thread: pthread_t = 0;
        // SAFETY: `thread` is a valid out-pointer, `attr` is the caller's
        // (possibly null) attribute object, `arg` is owned by `trampoline`.
        let code = unsafe { (self.create)(&mut thread, attr, trampoline, arg) };
        if code != 0 {
            // SAFETY: the thread was not created, so `arg` is still ours.
            drop(unsafe { Box::from_raw(arg.cast::<ThreadEntry<ExitValue>>()) });
            return Err(PrimitiveError::Failed {
                operation: "pthread_create",
                code,
            });
        }

        Ok((ThreadIdentity::new(thread as u64), thread))
    }

    fn join(&self, handle: pthread_t) -> std::thread::Result<ExitValue> {
        let mut value: *mut c_void = ptr::null_mut();
        // SAFETY: `handle` came from `spawn` and is joined once.
        let code = unsafe { (self.join)(handle, &mut value) };
        match check("pthread_join", code) {
            Ok(()) => Ok(ExitValue::new(value)),
            Err(e) => Err(Box::new(e)),
        }
    }

    #[inline]
    fn mutex_key(&self, mutex: &PthreadMutex) -> MutexKey {
        MutexKey::new(mutex.as_ptr() as usize)
    }

    fn lock(&self, mutex: &PthreadMutex) -> Result<(), PrimitiveError> {
        // SAFETY: `mutex` points at a live application mutex.
        check("pthread_mutex_lock", unsafe { (self.lock)(mutex.as_ptr()) })
    }

    unsafe fn unlock(&self, mutex: &PthreadMutex) -> Result<(), PrimitiveError> {
        // SAFETY: forwarded from the caller's contract.
        check("pthread_mutex_unlock", unsafe { (self.unlock)(mutex.as_ptr()) })
    }

    fn relax(&self) {
        self.raw_yield();
    }
}
