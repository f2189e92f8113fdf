//! Application lifecycle and fault notification for Tether.
//!
//! [`Application`] owns the event loop and the display handler on the loop
//! thread. [`notify`] and [`report`] get faults from any thread to that
//! handler; [`install_panic_hook`] and [`DiagnosticLayer`] are the two
//! built-in fault sources.

mod app;
mod bridge;
mod handler;
mod hooks;

pub use app::{AppError, AppSettings, Application, call_soon};
pub use bridge::{ABORT_EXIT_CODE, Delivery, FAULT_TARGET, notify, report};
pub use handler::{DisplayHandler, LogHandler};
pub use hooks::{DiagnosticLayer, install_panic_hook, severity_for_level};

pub use tether_types::{DisplayMode, Fault, Outcome, Severity};
