//! Handoff Benchmark Suite
//!
//! # Scenarios
//!
//! 1. **Uncontended lock**: lock + unlock on one thread, no handoff
//! 2. **Spawn and join**: create, one handoff to the child, terminate
//! 3. **Forced switch**: spawn and join with a switch forced at creation
//! 4. **Ping-pong**: both threads hammer one mutex, with explicit yields

use chessmate::sync::Mutex;
use chessmate::{Runtime, SwitchLedger};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;

fn bench_uncontended_lock(c: &mut Criterion) {
    let runtime = Runtime::new(SwitchLedger::explore());
    let mutex = Mutex::with_runtime(runtime, 0u64);

    c.bench_function("uncontended_lock", |b| {
        b.iter(|| {
            *mutex.lock() += 1;
        });
    });

    black_box(mutex.into_inner());
}

fn bench_spawn_join(c: &mut Criterion) {
    c.bench_function("spawn_join", |b| {
        b.iter(|| {
            let runtime = Runtime::new(SwitchLedger::explore());
            let child = runtime.spawn(|| black_box(7u32));
            black_box(child.join().unwrap())
        });
    });

    c.bench_function("spawn_join_forced_switch", |b| {
        b.iter(|| {
            let runtime = Runtime::new(SwitchLedger::replay(0));
            let child = runtime.spawn(|| black_box(7u32));
            black_box(child.join().unwrap())
        });
    });
}

fn bench_ping_pong(c: &mut Criterion) {
    let mut group = c.benchmark_group("ping_pong");

    for rounds in [10u32, 100] {
        group.bench_with_input(BenchmarkId::from_parameter(rounds), &rounds, |b, &rounds| {
            b.iter(|| {
                let runtime = Runtime::new(SwitchLedger::explore());
                let counter = Arc::new(Mutex::with_runtime(runtime.clone(), 0u32));

                let child = {
                    let counter = counter.clone();
                    let peer = runtime.clone();
                    runtime.spawn(move || {
                        for _ in 0..rounds {
                            *counter.lock() += 1;
                            peer.yield_now();
                        }
                    })
                };
                for _ in 0..rounds {
                    *counter.lock() += 1;
                    runtime.yield_now();
                }
                child.join().unwrap();
                black_box(*counter.lock())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_uncontended_lock, bench_spawn_join, bench_ping_pong);
criterion_main!(benches);
