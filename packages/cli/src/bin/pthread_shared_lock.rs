//! Shared-lock program written against raw pthreads.
//!
//! Nothing here knows about chessmate; run it with the preload library to
//! put it under the scheduler. The worker's return value travels back through
//! `pthread_join`.

use libc::{c_void, pthread_mutex_t, pthread_t};
use std::cell::UnsafeCell;
use std::process::exit;
use std::ptr;

const WORKER_RESULT: usize = 42;

struct Shared {
    mutex: UnsafeCell<pthread_mutex_t>,
    counter: UnsafeCell<u32>,
}

fn bump(shared: &Shared) {
    // SAFETY: the counter is only touched while the mutex is held.
    unsafe {
        libc::pthread_mutex_lock(shared.mutex.get());
        *shared.counter.get() += 1;
        libc::pthread_mutex_unlock(shared.mutex.get());
    }
}

extern "C" fn worker(arg: *mut c_void) -> *mut c_void {
    // SAFETY: `arg` points at `main`'s `Shared`, which outlives the join.
    let shared = unsafe { &*(arg as *const Shared) };
    bump(shared);
    WORKER_RESULT as *mut c_void
}

fn main() {
    let shared = Shared {
        mutex: UnsafeCell::new(libc::PTHREAD_MUTEX_INITIALIZER),
        counter: UnsafeCell::new(0),
    };

    let mut thread: pthread_t = 0;
    // SAFETY: valid out-pointer, default attributes, `shared` outlives the thread.
    let code = unsafe {
        libc::pthread_create(
            &mut thread,
            ptr::null(),
            worker,
            &shared as *const Shared as *mut c_void,
        )
    };
    if code != 0 {
        eprintln!("pthread_create failed: {code}");
        exit(1);
    }

    bump(&shared);

    let mut ret: *mut c_void = ptr::null_mut();
    // SAFETY: `thread` was created above and is joined once.
    let code = unsafe { libc::pthread_join(thread, &mut ret) };
    if code != 0 {
        eprintln!("pthread_join failed: {code}");
        exit(1);
    }

    // SAFETY: the worker has been joined.
    let counter = unsafe { *shared.counter.get() };
    println!("counter = {counter} ret = {}", ret as usize);
    if counter != 2 || ret as usize != WORKER_RESULT {
        exit(1);
    }
}
