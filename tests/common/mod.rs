//! Shared test utilities and fixtures
//!
//! Common infrastructure for integration tests.

#![allow(dead_code)]

use std::{
    cell::RefCell,
    rc::Rc,
    sync::{Mutex, MutexGuard, PoisonError},
    thread::{self, JoinHandle, ThreadId},
    time::{Duration, Instant},
};

use tether_engine::{Application, DisplayHandler, DisplayMode, Fault, Outcome};

static SERIAL: Mutex<()> = Mutex::new(());

/// Tests that touch the process-wide application or the panic hook run one
/// at a time.
pub fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone)]
pub struct Shown {
    pub fault: Fault,
    pub mode: DisplayMode,
    pub thread: ThreadId,
}

/// Display handler that records every fault and answers with a fixed
/// outcome.
#[derive(Clone, Default)]
pub struct Recorder {
    answer: Outcome,
    shown: Rc<RefCell<Vec<Shown>>>,
}

impl Recorder {
    pub fn answering(answer: Outcome) -> Self {
        Self {
            answer,
            ..Self::default()
        }
    }

    pub fn shown(&self) -> Vec<Shown> {
        self.shown.borrow().clone()
    }

    pub fn titles(&self) -> Vec<String> {
        self.shown
            .borrow()
            .iter()
            .map(|shown| shown.fault.title().to_string())
            .collect()
    }
}

impl DisplayHandler for Recorder {
    fn show(&self, fault: &Fault, mode: DisplayMode) -> Outcome {
        self.shown.borrow_mut().push(Shown {
            fault: fault.clone(),
            mode,
            thread: thread::current().id(),
        });
        self.answer
    }
}

/// Tick the application until `worker` has finished, then join it.
pub fn tick_until_finished<T>(app: &Application, worker: JoinHandle<T>) -> thread::Result<T> {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !worker.is_finished() {
        assert!(Instant::now() < deadline, "worker did not finish in time");
        app.tick();
    }
    worker.join()
}

/// Wait until the loop has at least one callback queued.
pub fn wait_for_queued(app: &Application) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while app.event_loop().queued() == 0 {
        assert!(Instant::now() < deadline, "nothing was queued in time");
        thread::sleep(Duration::from_millis(1));
    }
}
