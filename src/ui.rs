//! User notification seam.
//!
//! The set-top-box firmware drives these through its dialog widgets; the
//! CLI prints to the terminal. The core only calls them at well-defined
//! checkpoints and never relies on a return value except for `confirm`.

use std::io::{self, BufRead, Write};

pub trait Notifier {
    fn show_info(&self, msg: &str);
    fn show_error(&self, msg: &str);
    /// Ask the user to confirm an action. Defaults to "no" on read errors.
    fn confirm(&self, msg: &str) -> bool;
}

/// Terminal-backed notifier used by the CLI.
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn show_info(&self, msg: &str) {
        println!("{}", msg);
    }

    fn show_error(&self, msg: &str) {
        eprintln!("ERROR: {}", msg);
    }

    fn confirm(&self, msg: &str) -> bool {
        print!("{} [y/N] ", msg);
        let _ = io::stdout().flush();
        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim(), "y" | "Y" | "yes")
    }
}

/// Notifier that swallows all output and auto-confirms.
///
/// Used by tests and by non-interactive runs (`apply --yes`).
pub struct SilentNotifier;

impl Notifier for SilentNotifier {
    fn show_info(&self, _msg: &str) {}

    fn show_error(&self, _msg: &str) {}

    fn confirm(&self, _msg: &str) -> bool {
        true
    }
}
