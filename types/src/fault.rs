//! Fault notifications handed to display handlers.

use crate::Severity;

/// A fault ready to be shown to the user.
///
/// Immutable once built. The bridge moves it to the loop thread and the
/// display handler consumes it exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    severity: Severity,
    title: String,
    detail: Vec<String>,
    summary: String,
}

impl Fault {
    /// Build a fault with no detail lines.
    ///
    /// `summary` is reduced to its first non-empty line; when it has none,
    /// the title stands in for it.
    pub fn new(severity: Severity, title: impl Into<String>, summary: impl AsRef<str>) -> Self {
        let title = title.into();
        let summary = summary
            .as_ref()
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map_or_else(|| title.clone(), ToString::to_string);
        Self {
            severity,
            title,
            detail: Vec::new(),
            summary,
        }
    }

    /// Attach the trace/context lines. Trailing newlines are stripped.
    #[must_use]
    pub fn with_detail<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.detail = lines
            .into_iter()
            .map(|line| {
                let mut line: String = line.into();
                let kept = line.trim_end_matches(['\n', '\r']).len();
                line.truncate(kept);
                line
            })
            .collect();
        self
    }

    #[must_use]
    pub fn severity(&self) -> Severity {
        self.severity
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn detail(&self) -> &[String] {
        &self.detail
    }

    #[must_use]
    pub fn summary(&self) -> &str {
        &self.summary
    }

    /// Detail lines joined for a "show details" pane.
    #[must_use]
    pub fn detail_text(&self) -> String {
        self.detail.join("\n")
    }
}
