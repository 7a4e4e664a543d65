//! Integration Test: Exploration and Replay of Two-Thread Programs
//!
//! Each program runs in-process against its own [`Runtime`], so the ledger
//! mode is chosen per test instead of through the sequence file.
//!
//! Programs:
//! - shared lock: both threads increment one counter under one mutex
//! - lock order: main locks M1 then M2, child locks M2 then M1
//! - independent: no shared mutex at all

use chessmate::sync::Mutex;
use chessmate::{Runtime, SwitchLedger, ThreadStatus};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Programs
// ============================================================================

fn shared_lock(runtime: &Runtime) -> u32 {
    let counter = Arc::new(Mutex::with_runtime(runtime.clone(), 0u32));

    let child = {
        let counter = counter.clone();
        runtime.spawn(move || *counter.lock() += 1)
    };
    *counter.lock() += 1;
    child.join().unwrap();

    Arc::try_unwrap(counter).unwrap().into_inner()
}

fn lock_order(runtime: &Runtime) {
    let m1 = Arc::new(Mutex::with_runtime(runtime.clone(), ()));
    let m2 = Arc::new(Mutex::with_runtime(runtime.clone(), ()));

    let child = {
        let (m1, m2) = (m1.clone(), m2.clone());
        runtime.spawn(move || {
            let _second = m2.lock();
            let _first = m1.lock();
        })
    };

    let first = m1.lock();
    let second = m2.lock();
    drop(second);
    drop(first);

    child.join().unwrap();
}

fn independent(runtime: &Runtime) -> u64 {
    let child = runtime.spawn(|| (1..=10u64).sum::<u64>());
    let mine: u64 = (11..=20).sum();
    child.join().unwrap() + mine
}

fn explore_count(program: impl Fn(&Runtime)) -> u64 {
    let runtime = Runtime::new(SwitchLedger::explore());
    program(&runtime);
    runtime.ledger().count()
}

// ============================================================================
// Exploration
// ============================================================================

#[test]
fn test_shared_lock_counts_every_point() {
    // create + 2 × (lock + unlock)
    assert_eq!(explore_count(|rt| assert_eq!(shared_lock(rt), 2)), 5);
}

#[test]
fn test_lock_order_counts_every_point() {
    // create + 2 × (lock, lock, unlock, unlock)
    assert_eq!(explore_count(lock_order), 9);
}

#[test]
fn test_independent_counts_only_creation() {
    assert_eq!(explore_count(|rt| assert_eq!(independent(rt), 210)), 1);
}

#[test]
fn test_exploration_is_idempotent() {
    let first = explore_count(lock_order);
    let second = explore_count(lock_order);
    assert_eq!(first, second);
}

// ============================================================================
// Replay
// ============================================================================

#[test]
fn test_shared_lock_replays_complete_at_every_index() {
    let count = explore_count(|rt| {
        shared_lock(rt);
    });

    for index in 0..count {
        let runtime = Runtime::new(SwitchLedger::replay(index));
        assert_eq!(shared_lock(&runtime), 2, "index {index}");
        assert_eq!(runtime.ledger().count(), count, "index {index}");
    }
}

#[test]
fn test_independent_replay_at_zero_completes() {
    let runtime = Runtime::new(SwitchLedger::replay(0));
    assert_eq!(independent(&runtime), 210);
}

#[test]
fn test_lock_order_completes_except_between_main_locks() {
    let count = explore_count(lock_order);

    for index in (0..count).filter(|&i| i != 2) {
        let runtime = Runtime::new(SwitchLedger::replay(index));
        lock_order(&runtime);
        assert_eq!(runtime.ledger().count(), count, "index {index}");
    }
}

#[test]
fn test_lock_order_deadlocks_with_switch_between_main_locks() {
    let runtime = Runtime::new(SwitchLedger::replay(2));
    let (done_tx, done_rx) = mpsc::channel();

    {
        let runtime = runtime.clone();
        // Detached: a deadlocked program never returns.
        std::thread::spawn(move || {
            lock_order(&runtime);
            let _ = done_tx.send(());
        });
    }

    assert!(
        done_rx.recv_timeout(Duration::from_millis(500)).is_err(),
        "forced switch between main's two locks must deadlock"
    );

    let statuses: Vec<_> = runtime
        .controller()
        .threads()
        .iter()
        .map(|record| record.status())
        .collect();
    assert!(statuses.contains(&ThreadStatus::Waiting), "statuses: {statuses:?}");
    assert!(!statuses.contains(&ThreadStatus::Terminated));
}
