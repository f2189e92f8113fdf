//! The seam between the bridge and whatever shows faults to the user.

use std::rc::Rc;

use tether_types::{DisplayMode, Fault, Outcome};

/// Shows a fault and reports what should happen next.
///
/// Always called on the loop thread, one fault at a time. Implementations do
/// not need to be `Send`.
pub trait DisplayHandler {
    /// Called right before [`show`](Self::show), so the host can get out of the
    /// way (leave a full-screen view, flush pending output).
    fn pause_for_notification(&self) {}

    /// In [`DisplayMode::Recording`] this must return without waiting for
    /// input.
    fn show(&self, fault: &Fault, mode: DisplayMode) -> Outcome;
}

impl<H: DisplayHandler + ?Sized> DisplayHandler for Rc<H> {
    fn pause_for_notification(&self) {
        (**self).pause_for_notification();
    }

    fn show(&self, fault: &Fault, mode: DisplayMode) -> Outcome {
        (**self).show(fault, mode)
    }
}

impl<H: DisplayHandler + ?Sized> DisplayHandler for Box<H> {
    fn pause_for_notification(&self) {
        (**self).pause_for_notification();
    }

    fn show(&self, fault: &Fault, mode: DisplayMode) -> Outcome {
        (**self).show(fault, mode)
    }
}

/// Handler for hosts without a terminal: never blocks, answers with the
/// severity's default outcome.
///
/// The bridge already wrote the fault to the log, so this only notes the
/// decision.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogHandler;

impl DisplayHandler for LogHandler {
    fn show(&self, fault: &Fault, mode: DisplayMode) -> Outcome {
        let outcome = fault.severity().default_outcome();
        tracing::debug!(
            title = fault.title(),
            ?mode,
            ?outcome,
            "Fault answered without prompting"
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_types::Severity;

    #[test]
    fn log_handler_follows_severity_defaults() {
        let handler = LogHandler;
        for severity in Severity::ALL {
            let fault = Fault::new(severity, "t", "s");
            assert_eq!(
                handler.show(&fault, DisplayMode::Interactive),
                severity.default_outcome()
            );
        }
    }

    #[test]
    fn shared_handlers_delegate() {
        struct AlwaysAbort;
        impl DisplayHandler for AlwaysAbort {
            fn show(&self, _: &Fault, _: DisplayMode) -> Outcome {
                Outcome::Abort
            }
        }

        let shared = Rc::new(AlwaysAbort);
        let boxed: Box<dyn DisplayHandler> = Box::new(Rc::clone(&shared));
        let fault = Fault::new(Severity::Information, "t", "s");
        assert_eq!(boxed.show(&fault, DisplayMode::Recording), Outcome::Abort);
    }
}
