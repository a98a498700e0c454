// SPDX-License-Identifier: PMPL-1.0-or-later

//! Operator confirmation for degraded runs

use std::io::{self, BufRead, Write};

/// Asks whether to continue with incomplete permission coverage
pub trait Confirm {
    fn confirm(&mut self, question: &str) -> bool;
}

/// Interactive y/N question on the terminal. Anything but `y`/`yes`,
/// including end of input, declines.
pub struct TerminalConfirm;

impl Confirm for TerminalConfirm {
    fn confirm(&mut self, question: &str) -> bool {
        print!("{} [y/N] ", question);
        if io::stdout().flush().is_err() {
            return false;
        }
        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(0) | Err(_) => false,
            Ok(_) => matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"),
        }
    }
}

/// Non-interactive acceptance (`--yes`)
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&mut self, question: &str) -> bool {
        tracing::info!(question, "continuing without prompt");
        true
    }
}

/// Non-interactive refusal (`--no-input`)
pub struct AssumeNo;

impl Confirm for AssumeNo {
    fn confirm(&mut self, question: &str) -> bool {
        tracing::info!(question, "declining without prompt");
        false
    }
}
