//! Blocking terminal dialog for faults.
//!
//! [`PromptHandler`] takes over the terminal (raw mode, alternate screen) for
//! the length of one fault and restores it on the way out, even on error.
//! In recording mode it answers with the default outcome without drawing.

use std::io::{self, Stdout, Write, stdout};

use anyhow::{Context, Result};
use crossterm::{
    cursor::{Hide, MoveTo, Show},
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute, queue,
    style::{Attribute, Print, SetAttribute},
    terminal::{
        self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode,
        enable_raw_mode,
    },
};
use tracing::warn;
use unicode_width::UnicodeWidthChar;

use tether_engine::{DisplayHandler, DisplayMode, Fault, Outcome};

const HINT: &str = "Enter choose · Tab switch · Esc ignore";
/// Title, summary, blank, blank, buttons, hint.
const CHROME_ROWS: u16 = 6;
const DETAIL_INDENT: &str = "  ";

/// What a key press does to the open dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// Close the dialog with this answer.
    Choose(Outcome),
    /// Move the highlight to this button.
    Select(Outcome),
    Unbound,
}

/// Map a key press onto the dialog. `selected` is the highlighted button.
#[must_use]
pub fn key_action(key: KeyEvent, selected: Outcome) -> KeyAction {
    if key.kind != KeyEventKind::Press {
        return KeyAction::Unbound;
    }
    match key.code {
        KeyCode::Enter | KeyCode::Char(' ') => KeyAction::Choose(selected),
        KeyCode::Esc => KeyAction::Choose(Outcome::Ignore),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            KeyAction::Choose(Outcome::Abort)
        }
        KeyCode::Char('i' | 'I') => KeyAction::Choose(Outcome::Ignore),
        KeyCode::Char('a' | 'A') => KeyAction::Choose(Outcome::Abort),
        KeyCode::Left | KeyCode::Right | KeyCode::Tab | KeyCode::BackTab => {
            KeyAction::Select(other(selected))
        }
        _ => KeyAction::Unbound,
    }
}

fn other(outcome: Outcome) -> Outcome {
    match outcome {
        Outcome::Ignore => Outcome::Abort,
        Outcome::Abort => Outcome::Ignore,
    }
}

/// Draw the whole dialog into a `cols` x `rows` screen.
///
/// Lines wider than the screen are cut with an ellipsis; detail that does
/// not fit is summarised as a count of hidden lines.
pub fn render_dialog<W: Write>(
    out: &mut W,
    fault: &Fault,
    selected: Outcome,
    cols: u16,
    rows: u16,
) -> io::Result<()> {
    let width = usize::from(cols.max(1));
    let severity = fault.severity();
    queue!(out, Clear(ClearType::All), MoveTo(0, 0))?;

    let title = format!("{} {}: {}", severity.icon(), severity.label(), fault.title());
    queue!(
        out,
        SetAttribute(Attribute::Bold),
        Print(fit(&title, width)),
        SetAttribute(Attribute::Reset),
        MoveTo(0, 1),
        Print(fit(fault.summary(), width))
    )?;

    let budget = usize::from(rows.saturating_sub(CHROME_ROWS));
    let detail = fault.detail();
    let (shown, hidden) = if detail.len() > budget {
        (budget.saturating_sub(1), detail.len() - budget.saturating_sub(1))
    } else {
        (detail.len(), 0)
    };

    let mut row: u16 = 3;
    for line in &detail[..shown] {
        let text = format!("{DETAIL_INDENT}{line}");
        queue!(out, MoveTo(0, row), Print(fit(&text, width)))?;
        row += 1;
    }
    if hidden > 0 {
        let text = format!("{DETAIL_INDENT}… {hidden} more lines in the log");
        queue!(out, MoveTo(0, row), Print(fit(&text, width)))?;
        row += 1;
    }

    row += 1;
    queue!(out, MoveTo(1, row))?;
    for (index, outcome) in [Outcome::Ignore, Outcome::Abort].into_iter().enumerate() {
        if index > 0 {
            queue!(out, Print("    "))?;
        }
        let label = button_label(outcome);
        if outcome == selected {
            queue!(
                out,
                SetAttribute(Attribute::Reverse),
                Print(format!("[ {label} ]")),
                SetAttribute(Attribute::Reset)
            )?;
        } else {
            queue!(out, Print(format!("  {label}  ")))?;
        }
    }
    queue!(out, MoveTo(1, row + 1), Print(fit(HINT, width.saturating_sub(1))))?;
    out.flush()
}

fn button_label(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Ignore => "Ignore",
        Outcome::Abort => "Abort",
    }
}

/// Cut `text` to `width` display columns.
fn fit(text: &str, width: usize) -> String {
    let total: usize = text.chars().map(|c| c.width().unwrap_or(0)).sum();
    if total <= width {
        return text.to_string();
    }

    let limit = width.saturating_sub(1);
    let mut used = 0;
    let mut cut = String::new();
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > limit {
            break;
        }
        used += w;
        cut.push(c);
    }
    if width > 0 {
        cut.push('…');
    }
    cut
}

/// Alternate screen + raw mode for the lifetime of one dialog.
struct DialogSession {
    out: Stdout,
}

impl DialogSession {
    fn enter() -> Result<Self> {
        enable_raw_mode().context("failed to enable raw mode")?;
        let mut out = stdout();
        if let Err(err) = execute!(out, EnterAlternateScreen, Hide) {
            let _ = disable_raw_mode();
            return Err(err).context("failed to enter the alternate screen");
        }
        Ok(Self { out })
    }
}

impl Drop for DialogSession {
    fn drop(&mut self) {
        let _ = execute!(self.out, Show, LeaveAlternateScreen);
        let _ = disable_raw_mode();
    }
}

/// Interactive handler that asks on the terminal.
///
/// In [`DisplayMode::Recording`], or when the terminal cannot be used, it
/// answers with the severity's default outcome instead.
#[derive(Debug, Default, Clone, Copy)]
pub struct PromptHandler;

impl PromptHandler {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn prompt(&self, fault: &Fault) -> Result<Outcome> {
        let mut session = DialogSession::enter()?;
        let mut selected = fault.severity().default_outcome();
        loop {
            let (cols, rows) = terminal::size().context("failed to query terminal size")?;
            render_dialog(&mut session.out, fault, selected, cols, rows)?;
            let Event::Key(key) = event::read().context("failed to read terminal input")? else {
                continue;
            };
            match key_action(key, selected) {
                KeyAction::Choose(outcome) => return Ok(outcome),
                KeyAction::Select(outcome) => selected = outcome,
                KeyAction::Unbound => {}
            }
        }
    }
}

impl DisplayHandler for PromptHandler {
    fn pause_for_notification(&self) {
        let _ = stdout().flush();
    }

    fn show(&self, fault: &Fault, mode: DisplayMode) -> Outcome {
        if !mode.is_interactive() {
            return fault.severity().default_outcome();
        }
        match self.prompt(fault) {
            Ok(outcome) => outcome,
            Err(err) => {
                let outcome = fault.severity().default_outcome();
                warn!(error = %format!("{err:#}"), ?outcome, "Fault dialog unavailable");
                outcome
            }
        }
    }
}
