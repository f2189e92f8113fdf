//! Batch await.

use std::thread;

use tether_core::{Awaitable, Deferred, Dispatch, EventLoop, gather, spawn};

#[test]
fn results_are_in_input_order() {
    let lp = EventLoop::install().unwrap();
    let slow: Deferred<&str> = Deferred::new();
    let fast: Deferred<&str> = Deferred::new();
    let batch = spawn(gather::<&str, _>([slow.clone(), fast.clone()])).unwrap();

    lp.run_until_stalled();
    fast.resolve("fast", Dispatch::Scheduled).unwrap();
    lp.run_until_stalled();
    slow.resolve("slow", Dispatch::Scheduled).unwrap();

    assert_eq!(lp.block_on(batch), ["slow", "fast"]);
}

#[test]
fn spawned_drivers_progress_concurrently() {
    let lp = EventLoop::install().unwrap();
    let (gate_a, gate_b): (Deferred<i32>, Deferred<i32>) = (Deferred::new(), Deferred::new());
    let (a, b) = (gate_a.clone(), gate_b.clone());
    let first = spawn(async move { a.await * 10 }).unwrap();
    let second = spawn(async move { b.await * 100 }).unwrap();
    lp.run_until_stalled();

    gate_b.resolve(2, Dispatch::Scheduled).unwrap();
    lp.run_until_stalled();
    assert!(second.is_resolved(), "second finished before first was awaited");

    gate_a.resolve(1, Dispatch::Scheduled).unwrap();
    let items: Vec<Awaitable<i32>> = vec![first.into(), second.into()];
    assert_eq!(lp.block_on(gather(items)), [10, 200]);
}

#[test]
fn gathers_values_from_worker_threads() {
    let lp = EventLoop::install().unwrap();
    let items: Vec<Deferred<u64>> = (1..=4)
        .map(|n| {
            let d = Deferred::new();
            let resolver = d.resolver().unwrap();
            thread::spawn(move || resolver.resolve(n * 11).unwrap());
            d
        })
        .collect();
    assert_eq!(lp.block_on(gather::<u64, _>(items)), [11, 22, 33, 44]);
}
