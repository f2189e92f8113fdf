//! Cross-thread notification bridge.
//!
//! Any thread may raise a [`Fault`]; only the loop thread may show it. On the
//! loop thread the handler runs directly. Anywhere else the fault is handed to
//! the loop as a callback and the caller blocks until the handler has
//! answered, so the outcome is known before the caller continues.

use std::{cell::Cell, process};

use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use tether_types::{Fault, Outcome, Severity};

use crate::app;

/// Exit status used when a fault is answered with [`Outcome::Abort`].
pub const ABORT_EXIT_CODE: i32 = 255;

/// Log target every raised fault is recorded under.
pub const FAULT_TARGET: &str = "tether::fault";

/// How a fault reached (or failed to reach) the display handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Shown on the calling thread, which is the loop thread.
    Direct(Outcome),
    /// Shown on the loop thread while the calling thread waited.
    HandedOff(Outcome),
    /// Not shown: no live application, the loop went away before answering,
    /// or the fault was raised while this thread was already delivering one.
    Dropped,
}

impl Delivery {
    #[must_use]
    pub const fn outcome(self) -> Option<Outcome> {
        match self {
            Delivery::Direct(outcome) | Delivery::HandedOff(outcome) => Some(outcome),
            Delivery::Dropped => None,
        }
    }

    #[must_use]
    pub const fn is_abort(self) -> bool {
        matches!(self.outcome(), Some(Outcome::Abort))
    }
}

thread_local! {
    static DELIVERING: Cell<bool> = const { Cell::new(false) };
}

/// Marks the current thread as busy delivering a fault.
struct DeliveryGuard;

impl DeliveryGuard {
    fn enter() -> Option<Self> {
        DELIVERING
            .try_with(|busy| (!busy.replace(true)).then_some(DeliveryGuard))
            .ok()
            .flatten()
    }
}

impl Drop for DeliveryGuard {
    fn drop(&mut self) {
        let _ = DELIVERING.try_with(|busy| busy.set(false));
    }
}

/// True while this thread is inside [`notify`] or showing a handed-off fault.
pub(crate) fn is_delivering() -> bool {
    DELIVERING.try_with(Cell::get).unwrap_or(true)
}

/// Show `fault` on the loop thread and return the handler's answer.
///
/// Blocks when called off the loop thread. Never blocks when no application
/// is running. Calling this from the loop thread while that thread is itself
/// blocked elsewhere is fine; calling it from a thread the loop thread is
/// waiting on (a `join` inside a callback) deadlocks.
pub fn notify(fault: Fault) -> Delivery {
    let Some(_guard) = DeliveryGuard::enter() else {
        return Delivery::Dropped;
    };
    record(&fault);

    let Some(link) = app::link() else {
        debug!(title = fault.title(), "No application running; fault dropped");
        return Delivery::Dropped;
    };

    if link.handle().is_loop_thread() {
        return app::dispatch(&fault).map_or(Delivery::Dropped, Delivery::Direct);
    }

    let (reply, answer) = oneshot::channel();
    let scheduled = link.handle().schedule(move || {
        let Some(_guard) = DeliveryGuard::enter() else {
            return;
        };
        if let Some(outcome) = app::dispatch(&fault) {
            let _ = reply.send(outcome);
        }
    });
    drop(link);
    if scheduled.is_err() {
        debug!("Application loop closed before the fault could be handed off");
        return Delivery::Dropped;
    }

    trace!("Waiting for the loop thread to answer");
    match answer.blocking_recv() {
        Ok(outcome) => Delivery::HandedOff(outcome),
        Err(_) => {
            debug!("Application torn down before the fault was answered");
            Delivery::Dropped
        }
    }
}

/// [`notify`], then exit with [`ABORT_EXIT_CODE`] if the answer was abort.
pub fn report(fault: Fault) -> Delivery {
    let delivery = notify(fault);
    if let Some(code) = exit_code(delivery) {
        warn!(code, "Fault answered with abort; exiting");
        process::exit(code);
    }
    delivery
}

fn exit_code(delivery: Delivery) -> Option<i32> {
    delivery.is_abort().then_some(ABORT_EXIT_CODE)
}

fn record(fault: &Fault) {
    let detail = fault.detail_text();
    match fault.severity() {
        Severity::Information => tracing::info!(
            target: FAULT_TARGET,
            title = fault.title(),
            detail = %detail,
            "{}",
            fault.summary()
        ),
        Severity::Warning => tracing::warn!(
            target: FAULT_TARGET,
            title = fault.title(),
            detail = %detail,
            "{}",
            fault.summary()
        ),
        Severity::Critical | Severity::Fatal => tracing::error!(
            target: FAULT_TARGET,
            severity = %fault.severity(),
            title = fault.title(),
            detail = %detail,
            "{}",
            fault.summary()
        ),
    }
}
