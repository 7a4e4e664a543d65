//! Main takes M1 then M2; the child takes M2 then M1.
//!
//! A switch right after main's first lock leaves each thread holding the
//! mutex the other wants, and the run never finishes.

use chessmate::sync::Mutex;
use chessmate::thread;
use std::sync::Arc;

fn main() {
    chessmate_cli::init_tracing();

    let m1 = Arc::new(Mutex::new(()));
    let m2 = Arc::new(Mutex::new(()));

    let child = {
        let (m1, m2) = (m1.clone(), m2.clone());
        thread::spawn(move || {
            let _second = m2.lock();
            let _first = m1.lock();
        })
    };

    {
        let _first = m1.lock();
        let _second = m2.lock();
    }

    if child.join().is_err() {
        std::process::exit(1);
    }
    println!("both threads finished");
}
