//! Interactive confirmation prompts.

use std::io::{self, BufRead, Write};

use crate::planner::Confirm;

/// Asks for confirmation on the terminal.
///
/// The prompt goes to stderr so stdout stays clean for command output.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalConfirmer;

impl TerminalConfirmer {
    /// Creates a terminal confirmer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Confirm for TerminalConfirmer {
    fn confirm(&self, operation: &str, auto_yes: bool, context: &str) -> io::Result<bool> {
        if auto_yes {
            return Ok(true);
        }
        ask(&mut io::stdin().lock(), &mut io::stderr().lock(), operation, context)
    }
}

/// Writes the prompt to `output` and reads a y/N answer from `input`.
///
/// Anything other than `y` or `yes` is a no, including end of input.
///
/// # Errors
///
/// Returns an error if writing the prompt or reading the answer fails.
pub fn ask<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    operation: &str,
    context: &str,
) -> io::Result<bool> {
    write!(output, "Do you want to {operation} '{context}'? [y/N]: ")?;
    output.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
