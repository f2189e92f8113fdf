//! Coroutine driver scenarios.

use std::{
    cell::Cell,
    panic::{self, AssertUnwindSafe},
    rc::Rc,
    thread,
};

use tether_core::{Deferred, Dispatch, DriverState, EventLoop, Start, spawn, spawn_now};

use crate::common::serial;

fn rejected() -> u8 {
    panic!("rejected before suspending");
}

#[test]
fn sums_values_resolved_across_two_suspensions() {
    let lp = EventLoop::install().unwrap();
    let (a, b): (Deferred<i32>, Deferred<i32>) = (Deferred::new(), Deferred::new());
    let (first, second) = (a.clone(), b.clone());
    let driver = spawn(async move { first.await + second.await }).unwrap();

    lp.run_until_stalled();
    assert_eq!(driver.state(), DriverState::Suspended);
    a.resolve(1, Dispatch::Scheduled).unwrap();
    lp.run_until_stalled();
    assert_eq!(driver.state(), DriverState::Suspended);
    b.resolve(2, Dispatch::Scheduled).unwrap();
    lp.run_until_stalled();

    assert_eq!(driver.state(), DriverState::Completed);
    assert_eq!(lp.block_on(driver), 3);
}

#[test]
fn fault_before_first_suspension_leaves_container_unresolved() {
    let _serial = serial();
    let lp = EventLoop::install().unwrap();
    let driver = spawn(async {
        let value: u32 = "not a number".parse().expect("computation rejects its input");
        value
    })
    .unwrap();

    let step = panic::catch_unwind(AssertUnwindSafe(|| lp.run_once()));
    assert!(step.is_err(), "the fault must reach the step caller");
    assert_eq!(driver.state(), DriverState::Faulted);
    assert!(!driver.is_resolved());
    assert_eq!(lp.live_tasks(), 0);
}

#[test]
fn spawn_now_surfaces_an_early_fault_to_its_caller() {
    let _serial = serial();
    let _lp = EventLoop::install().unwrap();
    let started = panic::catch_unwind(AssertUnwindSafe(|| {
        spawn_now(async { rejected() })
    }));
    assert!(started.is_err());
}

#[test]
fn continuation_fires_once_with_final_value() {
    let lp = EventLoop::install().unwrap();
    let driver = spawn_now(async { "finished" }).unwrap();
    assert_eq!(driver.state(), DriverState::Completed);

    let calls = Rc::new(Cell::new(0));
    let counter = Rc::clone(&calls);
    driver
        .register(
            move |value| {
                assert_eq!(value, "finished");
                counter.set(counter.get() + 1);
            },
            Dispatch::Scheduled,
        )
        .unwrap();
    lp.run_until_stalled();
    lp.run_until_stalled();
    assert_eq!(calls.get(), 1);
}

#[test]
fn scheduled_start_waits_for_the_loop() {
    let lp = EventLoop::install().unwrap();
    let stepped = Rc::new(Cell::new(false));
    let flag = Rc::clone(&stepped);
    let driver = tether_core::Driver::start(
        async move {
            flag.set(true);
        },
        Start::Scheduled,
    )
    .unwrap();
    assert_eq!(driver.state(), DriverState::Created);
    assert!(!stepped.get());
    lp.run_once();
    assert!(stepped.get());
    assert_eq!(driver.state(), DriverState::Completed);
}

#[test]
fn drivers_resume_on_the_loop_thread_after_foreign_wakes() {
    let lp = EventLoop::install().unwrap();
    let owner = thread::current().id();
    let (tx, rx) = tokio::sync::oneshot::channel();
    let driver = spawn(async move {
        let payload: &str = rx.await.unwrap_or("closed");
        (payload, thread::current().id())
    })
    .unwrap();

    let worker = thread::spawn(move || tx.send("payload").unwrap());
    let (payload, resumed_on) = lp.block_on(driver);
    worker.join().unwrap();
    assert_eq!(payload, "payload");
    assert_eq!(resumed_on, owner);
}

#[test]
fn teardown_drops_suspended_drivers() {
    let lp = EventLoop::install().unwrap();
    let never: Deferred<()> = Deferred::new();
    let awaited = never.clone();
    let driver = spawn(async move { awaited.await }).unwrap();
    lp.run_until_stalled();
    assert_eq!(lp.live_tasks(), 1);
    drop(lp);
    assert!(!driver.is_resolved());
    assert!(never.is_registered());
}
