//! Integration Test: Replay Reproducibility
//!
//! Thread identities differ between runs, so point histories are compared by
//! role (the creating thread vs. the created one).

use chessmate::sync::Mutex;
use chessmate::{PointKind, Runtime, SwitchLedger};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Main,
    Child,
}

/// Run the shared-counter program and return its point history by role
fn run(ledger: SwitchLedger) -> Vec<(Role, PointKind, bool)> {
    let runtime = Runtime::new(ledger.with_history());
    let main = runtime.current_thread();
    let counter = Arc::new(Mutex::with_runtime(runtime.clone(), Vec::new()));

    let child = {
        let counter = counter.clone();
        runtime.spawn(move || counter.lock().push("child"))
    };
    counter.lock().push("main");
    child.join().unwrap();

    runtime
        .ledger()
        .history()
        .into_iter()
        .map(|point| {
            let role = if point.thread == main { Role::Main } else { Role::Child };
            (role, point.kind, point.forced)
        })
        .collect()
}

#[test]
fn test_replay_is_reproducible() {
    for index in 0..5 {
        let first = run(SwitchLedger::replay(index));
        let second = run(SwitchLedger::replay(index));
        assert_eq!(first, second, "index {index}");
    }
}

#[test]
fn test_exactly_one_point_is_forced() {
    for index in 0..5 {
        let history = run(SwitchLedger::replay(index));
        let forced: Vec<_> = history.iter().map(|(_, _, forced)| *forced).collect();

        assert_eq!(forced.iter().filter(|f| **f).count(), 1, "index {index}");
        assert!(forced[index as usize], "index {index}");
    }
}

#[test]
fn test_exploration_forces_nothing() {
    let history = run(SwitchLedger::explore());
    assert_eq!(history.len(), 5);
    assert!(history.iter().all(|(_, _, forced)| !forced));
    assert_eq!(
        history.iter().map(|(role, kind, _)| (*role, *kind)).collect::<Vec<_>>(),
        vec![
            (Role::Main, PointKind::Create),
            (Role::Main, PointKind::Lock),
            (Role::Main, PointKind::Unlock),
            (Role::Child, PointKind::Lock),
            (Role::Child, PointKind::Unlock),
        ]
    );
}

#[test]
fn test_forced_switch_hands_control_to_other_thread() {
    // While main is still running, the point after a forced one belongs to
    // the child.
    for index in 0..=2 {
        let history = run(SwitchLedger::replay(index));
        let k = index as usize;
        assert_eq!(history[k].0, Role::Main, "index {index}");
        assert_eq!(history[k + 1].0, Role::Child, "index {index}");
    }
}
