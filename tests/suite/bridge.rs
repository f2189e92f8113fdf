//! Cross-thread notification bridge.

use std::thread;

use tether_engine::{
    AppSettings, Application, Delivery, DisplayMode, Fault, Outcome, Severity, call_soon, notify,
};

use crate::common::{Recorder, serial, tick_until_finished, wait_for_queued};

fn disk_fault() -> Fault {
    Fault::new(Severity::Warning, "Disk", "disk nearly full").with_detail(["volume: /var"])
}

#[test]
fn loop_thread_notify_is_direct() {
    let _serial = serial();
    let recorder = Recorder::answering(Outcome::Abort);
    let _app = Application::init(recorder.clone(), AppSettings::default()).unwrap();

    assert_eq!(notify(disk_fault()), Delivery::Direct(Outcome::Abort));
    let shown = recorder.shown();
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].thread, thread::current().id());
    assert_eq!(shown[0].fault.detail(), ["volume: /var"]);
}

#[test]
fn worker_notify_blocks_until_the_loop_thread_answers() {
    let _serial = serial();
    let recorder = Recorder::answering(Outcome::Abort);
    let app = Application::init(recorder.clone(), AppSettings::default()).unwrap();
    let loop_thread = thread::current().id();

    let worker = thread::spawn(|| notify(disk_fault()));
    let delivery = tick_until_finished(&app, worker).unwrap();

    assert_eq!(delivery, Delivery::HandedOff(Outcome::Abort));
    let shown = recorder.shown();
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].thread, loop_thread);
    assert_eq!(shown[0].fault.title(), "Disk");
}

#[test]
fn recording_mode_keeps_the_hand_off_contract() {
    let _serial = serial();
    let recorder = Recorder::default();
    let app = Application::init(
        recorder.clone(),
        AppSettings::default().with_mode(DisplayMode::Recording),
    )
    .unwrap();

    let worker = thread::spawn(|| notify(disk_fault()));
    let delivery = tick_until_finished(&app, worker).unwrap();
    assert_eq!(delivery, Delivery::HandedOff(Outcome::Ignore));
    assert_eq!(recorder.shown()[0].mode, DisplayMode::Recording);
}

#[test]
fn notify_after_teardown_is_a_no_op() {
    let _serial = serial();
    let recorder = Recorder::default();
    let app = Application::init(recorder.clone(), AppSettings::default()).unwrap();
    drop(app);

    assert_eq!(notify(disk_fault()), Delivery::Dropped);
    let from_worker = thread::spawn(|| notify(disk_fault())).join().unwrap();
    assert_eq!(from_worker, Delivery::Dropped);
    assert!(recorder.shown().is_empty());
}

#[test]
fn teardown_releases_a_waiting_worker() {
    let _serial = serial();
    let recorder = Recorder::default();
    let app = Application::init(recorder.clone(), AppSettings::default()).unwrap();

    let worker = thread::spawn(|| notify(disk_fault()));
    wait_for_queued(&app);
    drop(app);

    assert_eq!(worker.join().unwrap(), Delivery::Dropped);
    assert!(recorder.shown().is_empty());
}

#[test]
fn concurrent_workers_are_each_answered_once() {
    let _serial = serial();
    let recorder = Recorder::default();
    let app = Application::init(recorder.clone(), AppSettings::default()).unwrap();

    let workers: Vec<_> = (0..4)
        .map(|i| {
            thread::spawn(move || {
                notify(Fault::new(Severity::Information, format!("Worker {i}"), "done"))
            })
        })
        .collect();
    for worker in workers {
        let delivery = tick_until_finished(&app, worker).unwrap();
        assert_eq!(delivery, Delivery::HandedOff(Outcome::Ignore));
    }

    let mut titles = recorder.titles();
    titles.sort();
    assert_eq!(titles, ["Worker 0", "Worker 1", "Worker 2", "Worker 3"]);
}

#[test]
fn call_soon_reaches_the_loop_from_workers() {
    let _serial = serial();
    let app = Application::init(Recorder::default(), AppSettings::default()).unwrap();
    let (tx, rx) = std::sync::mpsc::channel();

    let worker = thread::spawn(move || {
        call_soon(move || tx.send(thread::current().id()).unwrap()).unwrap();
    });
    tick_until_finished(&app, worker).unwrap();
    app.exec(|| app.event_loop().queued() > 0);

    assert_eq!(rx.recv().unwrap(), thread::current().id());
}
