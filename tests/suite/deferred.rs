//! Deferred value container behaviour seen from outside the crate.

use std::{cell::RefCell, rc::Rc, thread};

use tether_core::{Deferred, DeferredError, Dispatch, EventLoop};

fn recorder<T: 'static>() -> (Rc<RefCell<Vec<T>>>, impl FnOnce(T) + 'static) {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    (seen, move |value| sink.borrow_mut().push(value))
}

#[test]
fn resolve_then_immediate_register_sees_42_synchronously() {
    let lp = EventLoop::install().unwrap();
    let d = Deferred::new();
    d.resolve(42, Dispatch::Scheduled).unwrap();

    let (seen, continuation) = recorder();
    d.register(continuation, Dispatch::Immediate).unwrap();
    assert_eq!(*seen.borrow(), [42]);

    assert_eq!(lp.run_until_stalled(), 0);
    assert_eq!(*seen.borrow(), [42]);
}

#[test]
fn register_then_resolve_delivers_done_on_a_later_iteration() {
    let lp = EventLoop::install().unwrap();
    let d = Deferred::new();
    let (seen, continuation) = recorder();
    d.register(continuation, Dispatch::Scheduled).unwrap();
    d.resolve("done", Dispatch::Scheduled).unwrap();

    assert!(seen.borrow().is_empty());
    lp.run_once();
    assert_eq!(*seen.borrow(), ["done"]);
    lp.run_until_stalled();
    assert_eq!(*seen.borrow(), ["done"]);
}

#[test]
fn resolution_and_subscription_happen_once() {
    let _lp = EventLoop::install().unwrap();
    let d = Deferred::new();
    d.register(|_: u8| {}, Dispatch::Scheduled).unwrap();
    assert_eq!(
        d.register(|_| {}, Dispatch::Scheduled),
        Err(DeferredError::AlreadyRegistered)
    );
    d.resolve(1, Dispatch::Scheduled).unwrap();
    assert_eq!(
        d.resolve(2, Dispatch::Scheduled),
        Err(DeferredError::AlreadyResolved)
    );
}

#[test]
fn clones_share_one_container() {
    let lp = EventLoop::install().unwrap();
    let d = Deferred::new();
    let other = d.clone();
    let (seen, continuation) = recorder();
    other.register(continuation, Dispatch::Scheduled).unwrap();
    d.resolve('x', Dispatch::Scheduled).unwrap();
    assert!(other.is_resolved());
    lp.run_until_stalled();
    assert_eq!(*seen.borrow(), ['x']);
}

#[test]
fn then_chains_run_in_order() {
    let lp = EventLoop::install().unwrap();
    let d = Deferred::new();
    let parsed = d.then(|text: String| text.len()).unwrap();
    let doubled = parsed.then(|len| len * 2).unwrap();
    d.resolve("tether".to_string(), Dispatch::Scheduled).unwrap();
    assert_eq!(lp.block_on(doubled), 12);
}

#[test]
fn resolvers_work_from_many_threads() {
    let lp = EventLoop::install().unwrap();
    let containers: Vec<Deferred<usize>> = (0..8).map(|_| Deferred::new()).collect();
    let workers: Vec<_> = containers
        .iter()
        .enumerate()
        .map(|(i, d)| {
            let resolver = d.resolver().unwrap();
            thread::spawn(move || resolver.resolve(i * i).unwrap())
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let mut total = 0;
    for d in containers {
        total += lp.block_on(d);
    }
    assert_eq!(total, (0..8).map(|i| i * i).sum::<usize>());
}

#[test]
fn resolver_gives_the_value_back_after_teardown() {
    let lp = EventLoop::install().unwrap();
    let d: Deferred<String> = Deferred::new();
    let resolver = d.resolver().unwrap();
    drop(lp);
    assert_eq!(resolver.resolve("late".to_string()), Err("late".to_string()));
    assert!(!d.is_resolved());
}
