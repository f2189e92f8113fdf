//! Terminal fault dialog for Tether.
//!
//! [`PromptHandler`] is the interactive [`DisplayHandler`]: it takes over the
//! terminal in an alternate screen, shows the fault with Ignore and Abort
//! buttons, and waits for a key.
//!
//! ```text
//! x Critical: Panic
//! index out of bounds
//!
//!   thread 'main' panicked at src/main.rs:4:5:
//!   ...
//!
//!  [ Ignore ]    Abort
//!  Enter choose · Tab switch · Esc ignore
//! ```

mod dialog;

pub use dialog::{KeyAction, PromptHandler, key_action, render_dialog};
