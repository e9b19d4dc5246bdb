//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use serde::Serialize;
use std::fmt::Write as _;
use std::io::Write;
use std::sync::Mutex;
use tabled::{Table, Tabled};

use crate::config::{ProjectConfig, ValidationResult};
use crate::planner::{ActionOutput, Batch, ChangeSetPresenter, ExecutionResult, Outcome, UpdateReport};
use crate::stack::{ChangeSetDescription, ChangeSetStatus};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Launch order row for table display.
#[derive(Tabled)]
struct BatchRow {
    #[tabled(rename = "Batch")]
    batch: usize,
    #[tabled(rename = "Stack")]
    stack: String,
    #[tabled(rename = "Depends on")]
    depends_on: String,
}

/// Per-stack result row for table display.
#[derive(Tabled)]
struct ResultRow {
    #[tabled(rename = "Stack")]
    stack: String,
    #[tabled(rename = "Result")]
    result: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Returns the output format.
    #[must_use]
    pub const fn format(&self) -> OutputFormat {
        self.format
    }

    /// Formats the launch order of a target.
    #[must_use]
    pub fn format_launch_order(&self, target: &str, batches: &[Batch]) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = LaunchOrderJson {
                    target,
                    batches: batches.iter().map(Batch::names).collect(),
                };
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => {
                let mut output = String::new();
                let _ = writeln!(output, "\nLaunch order for {}\n", target.bold());

                let rows: Vec<BatchRow> = batches
                    .iter()
                    .enumerate()
                    .flat_map(|(index, batch)| {
                        batch.iter().map(move |stack| BatchRow {
                            batch: index + 1,
                            stack: stack.name.clone(),
                            depends_on: if stack.dependencies.is_empty() {
                                String::from("-")
                            } else {
                                stack.dependencies.join(", ")
                            },
                        })
                    })
                    .collect();

                output.push_str(&Table::new(rows).to_string());
                output.push('\n');

                let stacks: usize = batches.iter().map(Batch::len).sum();
                let _ = writeln!(output, "\n{} stacks in {} batches", stacks, batches.len());
                output
            }
        }
    }

    /// Formats the per-stack results of an operation.
    #[must_use]
    pub fn format_results(&self, operation: &str, result: &ExecutionResult) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = ResultsJson {
                    operation,
                    success: result.all_successful(),
                    stacks: result.iter().map(|(name, outcome)| StackJson::new(name, outcome)).collect(),
                };
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => {
                let mut output = String::new();
                if result.is_empty() {
                    let _ = writeln!(output, "No stacks to {operation}.");
                    return output;
                }

                let rows: Vec<ResultRow> = result
                    .iter()
                    .map(|(name, outcome)| ResultRow {
                        stack: name.to_string(),
                        result: Self::format_outcome(outcome),
                    })
                    .collect();
                output.push_str(&Table::new(rows).to_string());
                output.push('\n');

                let summary = if result.all_successful() {
                    format!("{} {operation} succeeded", "✓".green())
                } else {
                    format!("{} {operation} failed", "✗".red())
                };
                let _ = writeln!(
                    output,
                    "\n{summary} ({}/{} stacks)",
                    result.success_count(),
                    result.len()
                );
                output
            }
        }
    }

    /// Formats the result of a change-set update.
    #[must_use]
    pub fn format_update_report(&self, report: &UpdateReport) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = UpdateJson {
                    success: report.all_successful(),
                    batches: report
                        .batches
                        .iter()
                        .map(|batch| BatchJson {
                            change_set: &batch.change_set,
                            executed: batch.executed_stacks(),
                            unchanged: batch.unchanged_stacks(),
                            success: batch.all_successful(),
                        })
                        .collect(),
                };
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => {
                let mut output = String::new();
                for (index, batch) in report.batches.iter().enumerate() {
                    let executed = batch.executed_stacks();
                    let _ = writeln!(
                        output,
                        "Batch {} ({}): {} executed, {} without changes",
                        index + 1,
                        batch.change_set.dimmed(),
                        executed.len(),
                        batch.unchanged_stacks().len()
                    );
                    if let Some(result) = &batch.executed {
                        for (name, outcome) in result.iter() {
                            let _ = writeln!(output, "   {name}: {}", Self::format_outcome(outcome));
                        }
                    }
                }

                if report.all_successful() {
                    let _ = writeln!(output, "\n{} Update complete", "✓".green());
                } else {
                    let _ = writeln!(output, "\n{} Update finished with failures", "✗".red());
                }
                output
            }
        }
    }

    /// Formats a configuration validation result.
    #[must_use]
    pub fn format_validation(
        &self,
        config: &ProjectConfig,
        result: &ValidationResult,
        show_warnings: bool,
    ) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "valid": result.is_valid(),
                    "project": config.project.name,
                    "stacks": config.stacks.len(),
                    "groups": config.group_count(),
                    "errors": result.errors.iter().map(ToString::to_string).collect::<Vec<_>>(),
                    "warnings": result.warnings,
                });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => {
                let mut output = String::new();
                if result.is_valid() {
                    let _ = writeln!(output, "{} Configuration is valid!", "✓".green());
                } else {
                    let _ = writeln!(output, "{} Configuration is invalid:", "✗".red());
                    for error in &result.errors {
                        let _ = writeln!(output, "   - {error}");
                    }
                }

                if show_warnings && !result.warnings.is_empty() {
                    let _ = writeln!(output, "\n{} Warnings:", "⚠".yellow());
                    for warning in &result.warnings {
                        let _ = writeln!(output, "   - {warning}");
                    }
                }

                let _ = writeln!(output, "\nConfiguration summary:");
                let _ = writeln!(output, "   Project: {}", config.project.name);
                let _ = writeln!(output, "   Stacks: {}", config.stacks.len());
                let _ = writeln!(output, "   Groups: {}", config.group_count());
                output
            }
        }
    }

    /// Formats an outcome with color.
    fn format_outcome(outcome: &Outcome) -> String {
        match outcome {
            Outcome::Failure(e) => format!("{} {e}", "FAILED".red()),
            Outcome::Success(output) if outcome.is_success() => match output {
                ActionOutput::Status(_) | ActionOutput::ChangeSetStatus(_) => output.to_string().green().to_string(),
                _ => output.to_string(),
            },
            Outcome::Success(output) => output.to_string().yellow().to_string(),
        }
    }
}

/// Renders change-set descriptions to a writer.
///
/// Verbose mode prints every description in full. Otherwise descriptions
/// are simplified and stacks whose change set is not READY only get a
/// `NO CHANGES` line.
#[derive(Debug)]
pub struct ChangeSetPrinter<W> {
    out: Mutex<W>,
    format: OutputFormat,
    verbose: bool,
}

impl<W: Write + Send> ChangeSetPrinter<W> {
    /// Creates a printer writing to `out`.
    #[must_use]
    pub const fn new(out: W, format: OutputFormat, verbose: bool) -> Self {
        Self {
            out: Mutex::new(out),
            format,
            verbose,
        }
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Renders one stack's change set.
    #[must_use]
    pub fn render(
        &self,
        stack: &str,
        status: Option<ChangeSetStatus>,
        description: Option<&ChangeSetDescription>,
    ) -> String {
        if !self.verbose && status != Some(ChangeSetStatus::Ready) {
            return no_changes_marker(stack);
        }

        let Some(description) = description else {
            return format!("\n{stack:<50} DESCRIPTION UNAVAILABLE\n");
        };
        let description = if self.verbose {
            description.clone()
        } else {
            description.simplified()
        };

        let rendered = match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&description).map_err(|e| e.to_string()),
            OutputFormat::Text => serde_yaml::to_string(&description).map_err(|e| e.to_string()),
        };
        match rendered {
            Ok(text) => format!("{text}\n"),
            Err(e) => format!("\n{stack:<50} cannot render change set: {e}\n"),
        }
    }
}

impl<W: Write + Send> ChangeSetPresenter for ChangeSetPrinter<W> {
    fn present(&self, stack: &str, status: Option<ChangeSetStatus>, description: Option<&ChangeSetDescription>) {
        let rendered = self.render(stack, status, description);
        let mut out = self
            .out
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let _ = out.write_all(rendered.as_bytes());
        let _ = out.flush();
    }
}

/// The fixed line shown for a stack without changes to execute.
#[must_use]
pub fn no_changes_marker(stack: &str) -> String {
    format!("\n{stack:<50} NO CHANGES\n")
}

// JSON serialization helpers

#[derive(Serialize)]
struct LaunchOrderJson<'a> {
    target: &'a str,
    batches: Vec<Vec<String>>,
}

#[derive(Serialize)]
struct ResultsJson<'a> {
    operation: &'a str,
    success: bool,
    stacks: Vec<StackJson<'a>>,
}

#[derive(Serialize)]
struct StackJson<'a> {
    stack: &'a str,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<&'a ActionOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<'a> StackJson<'a> {
    fn new(stack: &'a str, outcome: &'a Outcome) -> Self {
        let (result, error) = match outcome {
            Outcome::Success(output) => (Some(output), None),
            Outcome::Failure(e) => (None, Some(e.to_string())),
        };
        Self {
            stack,
            success: outcome.is_success(),
            result,
            error,
        }
    }
}

#[derive(Serialize)]
struct UpdateJson<'a> {
    success: bool,
    batches: Vec<BatchJson<'a>>,
}

#[derive(Serialize)]
struct BatchJson<'a> {
    change_set: &'a str,
    executed: Vec<&'a str>,
    unchanged: Vec<&'a str>,
    success: bool,
}
