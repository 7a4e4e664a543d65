//! Both threads bump one counter under one mutex.

use chessmate::sync::Mutex;
use chessmate::thread;
use std::sync::Arc;

fn main() {
    chessmate_cli::init_tracing();

    let counter = Arc::new(Mutex::new(0u32));

    let child = {
        let counter = counter.clone();
        thread::spawn(move || *counter.lock() += 1)
    };
    *counter.lock() += 1;

    if child.join().is_err() {
        std::process::exit(1);
    }

    let Ok(counter) = Arc::try_unwrap(counter) else {
        std::process::exit(1);
    };
    let total = counter.into_inner();
    println!("counter = {total}");
    if total != 2 {
        std::process::exit(1);
    }
}
