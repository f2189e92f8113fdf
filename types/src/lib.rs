//! Core domain types for Tether.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the application: the event loop,
//! the notification bridge, display handlers and configuration.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory

mod fault;
pub use fault::Fault;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Severity
// ============================================================================

/// How serious a reported fault is.
///
/// Ordered from least to most severe, so thresholds can be expressed as
/// `severity >= Severity::Warning`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[serde(alias = "info", alias = "debug")]
    Information,
    #[default]
    #[serde(alias = "warn")]
    Warning,
    #[serde(alias = "error")]
    Critical,
    Fatal,
}

#[derive(Debug, Error)]
#[error("unknown severity: {0}")]
pub struct SeverityParseError(String);

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Information,
        Severity::Warning,
        Severity::Critical,
        Severity::Fatal,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Severity::Information => "information",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
            Severity::Fatal => "fatal",
        }
    }

    /// Human-facing label used in dialog titles.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Severity::Information => "Information",
            Severity::Warning => "Warning",
            Severity::Critical => "Critical",
            Severity::Fatal => "Fatal",
        }
    }

    /// Single-glyph marker shown next to the dialog title.
    #[must_use]
    pub const fn icon(self) -> &'static str {
        match self {
            Severity::Information => "i",
            Severity::Warning => "!",
            Severity::Critical | Severity::Fatal => "x",
        }
    }

    /// The outcome a handler picks when nobody is there to answer.
    ///
    /// Fatal faults are never recoverable; everything else is ignored.
    #[must_use]
    pub const fn default_outcome(self) -> Outcome {
        match self {
            Severity::Information | Severity::Warning | Severity::Critical => Outcome::Ignore,
            Severity::Fatal => Outcome::Abort,
        }
    }

    pub fn parse(raw: &str) -> Result<Self, SeverityParseError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "information" | "info" | "debug" => Ok(Severity::Information),
            "warning" | "warn" => Ok(Severity::Warning),
            "critical" | "error" => Ok(Severity::Critical),
            "fatal" => Ok(Severity::Fatal),
            _ => Err(SeverityParseError(raw.to_string())),
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// Handler Outcome & Display Mode
// ============================================================================

/// What the user (or policy) decided after seeing a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Outcome {
    /// Keep running.
    #[default]
    Ignore,
    /// Terminate the process once the notification has been fully delivered.
    Abort,
}

impl Outcome {
    #[must_use]
    pub const fn is_abort(self) -> bool {
        matches!(self, Outcome::Abort)
    }
}

/// Whether faults may block for user input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DisplayMode {
    /// Show a blocking dialog and wait for an answer.
    #[default]
    Interactive,
    /// Record the fault to the diagnostic stream and return immediately.
    Recording,
}

impl DisplayMode {
    #[must_use]
    pub const fn from_interactive(interactive: bool) -> Self {
        if interactive {
            DisplayMode::Interactive
        } else {
            DisplayMode::Recording
        }
    }

    #[must_use]
    pub const fn is_interactive(self) -> bool {
        matches!(self, DisplayMode::Interactive)
    }
}
