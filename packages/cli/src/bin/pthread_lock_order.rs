//! Lock-order inversion written against raw pthreads.
//!
//! Main takes `first` then `second`; the worker takes `second` then `first`.

use libc::{c_void, pthread_mutex_t, pthread_t};
use std::cell::UnsafeCell;
use std::process::exit;
use std::ptr;

struct Locks {
    first: UnsafeCell<pthread_mutex_t>,
    second: UnsafeCell<pthread_mutex_t>,
}

fn lock_both(outer: &UnsafeCell<pthread_mutex_t>, inner: &UnsafeCell<pthread_mutex_t>) {
    // SAFETY: both mutexes are initialized and live for the whole program.
    unsafe {
        libc::pthread_mutex_lock(outer.get());
        libc::pthread_mutex_lock(inner.get());
        libc::pthread_mutex_unlock(inner.get());
        libc::pthread_mutex_unlock(outer.get());
    }
}

extern "C" fn worker(arg: *mut c_void) -> *mut c_void {
    // SAFETY: `arg` points at `main`'s `Locks`, which outlives the join.
    let locks = unsafe { &*(arg as *const Locks) };
    lock_both(&locks.second, &locks.first);
    ptr::null_mut()
}

fn main() {
    let locks = Locks {
        first: UnsafeCell::new(libc::PTHREAD_MUTEX_INITIALIZER),
        second: UnsafeCell::new(libc::PTHREAD_MUTEX_INITIALIZER),
    };

    let mut thread: pthread_t = 0;
    // SAFETY: valid out-pointer, default attributes, `locks` outlives the thread.
    let code = unsafe {
        libc::pthread_create(
            &mut thread,
            ptr::null(),
            worker,
            &locks as *const Locks as *mut c_void,
        )
    };
    if code != 0 {
        eprintln!("pthread_create failed: {code}");
        exit(1);
    }

    lock_both(&locks.first, &locks.second);

    // SAFETY: `thread` was created above and is joined once.
    if unsafe { libc::pthread_join(thread, ptr::null_mut()) } != 0 {
        exit(1);
    }
    println!("both threads finished");
}
