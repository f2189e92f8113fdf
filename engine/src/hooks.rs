//! Fault sources: the panic hook and the diagnostic `tracing` layer.

use std::{
    backtrace::Backtrace,
    fmt,
    panic::{self, Location},
    thread,
};

use tracing::{Event, Level, Subscriber, field::Field, field::Visit};
use tracing_subscriber::layer::{Context, Layer};

use tether_config::NotifyConfig;
use tether_types::{Fault, Severity};

use crate::bridge::{self, Delivery, FAULT_TARGET, report};

// ============================================================================
// Panic hook
// ============================================================================

/// Route every panic, on any thread, through the bridge as a critical fault.
///
/// The previously installed hook still runs when the bridge could not show
/// the fault (no application, or a panic inside the display handler).
pub fn install_panic_hook(capture_backtrace: bool) {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        let message = info.payload_as_str().unwrap_or("Box<dyn Any>");
        let backtrace = capture_backtrace.then(Backtrace::force_capture);
        let fault = panic_fault(message, info.location(), backtrace.as_ref());
        if report(fault) == Delivery::Dropped {
            previous(info);
        }
    }));
}

fn panic_fault(message: &str, location: Option<&Location<'_>>, backtrace: Option<&Backtrace>) -> Fault {
    let current = thread::current();
    let name = current.name().unwrap_or("<unnamed>");
    let mut detail = vec![match location {
        Some(at) => format!("thread '{name}' panicked at {at}:"),
        None => format!("thread '{name}' panicked:"),
    }];
    detail.extend(message.lines().map(str::to_string));
    if let Some(backtrace) = backtrace {
        push_backtrace(&mut detail, backtrace);
    }
    Fault::new(Severity::Critical, "Panic", message).with_detail(detail)
}

fn push_backtrace(detail: &mut Vec<String>, backtrace: &Backtrace) {
    detail.push(String::new());
    detail.push("stack backtrace:".to_string());
    detail.extend(backtrace.to_string().lines().map(str::to_string));
}

// ============================================================================
// Diagnostic layer
// ============================================================================

/// Map a `tracing` level onto the fault scale.
#[must_use]
pub fn severity_for_level(level: Level) -> Severity {
    if level == Level::ERROR {
        Severity::Critical
    } else if level == Level::WARN {
        Severity::Warning
    } else {
        Severity::Information
    }
}

/// Turns `tracing` events at or above a threshold into faults.
///
/// Events logged by the bridge itself, and events emitted while a fault is
/// being delivered on the same thread, are ignored. The layer only sees
/// events that the subscriber's filter lets through.
#[derive(Debug, Clone, Copy)]
pub struct DiagnosticLayer {
    threshold: Severity,
    capture_backtrace: bool,
}

impl DiagnosticLayer {
    #[must_use]
    pub fn new(threshold: Severity) -> Self {
        Self {
            threshold,
            capture_backtrace: false,
        }
    }

    #[must_use]
    pub fn from_config(config: &NotifyConfig) -> Self {
        Self::new(config.diagnostic_threshold).with_backtrace(config.capture_backtrace)
    }

    /// Attach the stack of the logging call to every fault.
    #[must_use]
    pub fn with_backtrace(mut self, capture: bool) -> Self {
        self.capture_backtrace = capture;
        self
    }

    #[must_use]
    pub fn threshold(&self) -> Severity {
        self.threshold
    }
}

impl<S: Subscriber> Layer<S> for DiagnosticLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        if meta.target().starts_with(FAULT_TARGET) || bridge::is_delivering() {
            return;
        }
        let severity = severity_for_level(*meta.level());
        if severity < self.threshold {
            return;
        }

        let mut fields = FieldCollector::default();
        event.record(&mut fields);
        let origin = Origin {
            file: meta.file(),
            line: meta.line(),
            module: meta.module_path(),
            target: meta.target(),
        };
        let backtrace = self.capture_backtrace.then(Backtrace::force_capture);
        report(diagnostic_fault(severity, &fields, &origin, backtrace.as_ref()));
    }
}

struct Origin<'a> {
    file: Option<&'a str>,
    line: Option<u32>,
    module: Option<&'a str>,
    target: &'a str,
}

#[derive(Default)]
struct FieldCollector {
    message: String,
    fields: Vec<String>,
}

impl Visit for FieldCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push(format!("{} = {value}", field.name()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.fields.push(format!("{} = {value:?}", field.name()));
        }
    }
}

fn diagnostic_fault(
    severity: Severity,
    fields: &FieldCollector,
    origin: &Origin<'_>,
    backtrace: Option<&Backtrace>,
) -> Fault {
    let label = severity.label();
    let file = origin.file.unwrap_or("<unknown>");
    let line = origin.line.map_or_else(|| "?".to_string(), |line| line.to_string());
    let module = origin.module.unwrap_or(origin.target);
    let summary = format!(
        "{label} Diagnostic: {} ({file}:{line}, {module})",
        fields.message
    );

    let mut detail = vec![format!("target: {}", origin.target)];
    detail.extend(fields.fields.iter().cloned());
    if let Some(backtrace) = backtrace {
        push_backtrace(&mut detail, backtrace);
    }
    detail.push(summary.clone());
    Fault::new(severity, format!("{label} Diagnostic"), summary).with_detail(detail)
}
