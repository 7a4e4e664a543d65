//! Two threads that share nothing.

use chessmate::thread;

fn main() {
    chessmate_cli::init_tracing();

    let child = thread::spawn(|| (1..=10u64).sum::<u64>());
    let mine: u64 = (11..=20).sum();

    match child.join() {
        Ok(theirs) => println!("sum = {}", theirs + mine),
        Err(_) => std::process::exit(1),
    }
}
