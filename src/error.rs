//! Error types for the stackplan deployment system.
//!
//! This module provides the error hierarchy for every stage of a run:
//! configuration, dependency resolution, backend calls, and the change-set
//! update workflow.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the stackplan deployment system.
#[derive(Debug, Error)]
pub enum StackplanError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Dependency resolution errors.
    #[error("Resolution error: {0}")]
    Resolve(#[from] ResolveError),

    /// Stack backend errors.
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Change-set update workflow errors.
    #[error("Update error: {0}")]
    Update(#[from] UpdateError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// Environment variable has an unusable value.
    #[error("Invalid value for environment variable {name}: {value}")]
    InvalidEnvVar {
        /// Name of the variable.
        name: String,
        /// The rejected value.
        value: String,
    },

    /// Two stacks share a name.
    #[error("Duplicate stack name: {name}")]
    DuplicateStack {
        /// The duplicated name.
        name: String,
    },

    /// A stack depends on a stack that is not configured.
    #[error("Stack '{stack}' depends on unknown stack '{dependency}'")]
    UnknownDependency {
        /// The stack declaring the dependency.
        stack: String,
        /// The missing dependency.
        dependency: String,
    },
}

/// Dependency resolution errors.
///
/// Both variants are raised before any backend call is made.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// The target path matches no stack and no stack group.
    #[error("No stack or stack group matches '{path}'")]
    UnknownTarget {
        /// The requested path.
        path: String,
    },

    /// The dependency graph reachable from the target contains a cycle.
    #[error("Cyclic dependency between stacks: {}", .stacks.join(", "))]
    CyclicDependency {
        /// Stacks that could not be placed in any batch.
        stacks: Vec<String>,
    },
}

/// Errors reported by a stack backend or by the action layer on top of it.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The stack does not exist in the backend.
    #[error("Stack does not exist: {stack}")]
    StackDoesNotExist {
        /// Name of the stack.
        stack: String,
    },

    /// The change set does not exist for the stack.
    #[error("Change set '{change_set}' not found for stack {stack}")]
    ChangeSetNotFound {
        /// Name of the stack.
        stack: String,
        /// Name of the change set.
        change_set: String,
    },

    /// A change set was executed while not in the READY state.
    #[error("Change set '{change_set}' for stack {stack} is {status}, expected READY")]
    InvalidChangeSetStatus {
        /// Name of the stack.
        stack: String,
        /// Name of the change set.
        change_set: String,
        /// The status the change set was found in.
        status: String,
    },

    /// Waiting for a change set exceeded the configured timeout.
    #[error("Timed out after {timeout_secs}s waiting for change set '{change_set}' on stack {stack}")]
    ChangeSetWaitTimeout {
        /// Name of the stack.
        stack: String,
        /// Name of the change set.
        change_set: String,
        /// The timeout that was exceeded.
        timeout_secs: u64,
    },

    /// A backend operation failed.
    #[error("{operation} failed for stack {stack}: {message}")]
    OperationFailed {
        /// Name of the stack.
        stack: String,
        /// The operation that failed.
        operation: String,
        /// Description of the failure.
        message: String,
    },

    /// The stack template could not be read or parsed.
    #[error("Invalid template {path} for stack {stack}: {message}")]
    TemplateError {
        /// Name of the stack.
        stack: String,
        /// Path to the template.
        path: PathBuf,
        /// Description of the problem.
        message: String,
    },

    /// Backend state could not be read or written.
    #[error("Backend state is corrupted: {message}")]
    StateCorrupted {
        /// Description of the corruption.
        message: String,
    },

    /// The task running the action for a stack did not complete.
    #[error("Task for stack {stack} failed: {message}")]
    TaskFailed {
        /// Name of the stack.
        stack: String,
        /// Description of the task failure.
        message: String,
    },
}

/// Errors that abort a change-set update as a whole.
#[derive(Debug, Error)]
pub enum UpdateError {
    /// The target could not be resolved.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Some stacks in the target do not exist; updates never create stacks.
    #[error("The following stacks don't exist: {}. Update can alter only existing stacks", .stacks.join(", "))]
    NonexistentStacks {
        /// Names of the missing stacks.
        stacks: Vec<String>,
    },

    /// The existence check itself failed.
    #[error("Existence check failed: {0}")]
    Precheck(BackendError),

    /// The user declined to execute the pending change sets.
    #[error("Update of {} declined{}", .stacks.join(", "), applied_note(.applied))]
    Declined {
        /// Stacks whose change sets were left unexecuted.
        stacks: Vec<String>,
        /// Stacks updated by earlier batches before the decline.
        applied: Vec<String>,
    },

    /// Asking for confirmation failed.
    #[error("Confirmation failed: {source}{}", applied_note(.applied))]
    Confirmation {
        /// The underlying read or write failure.
        source: std::io::Error,
        /// Stacks updated by earlier batches before the failure.
        applied: Vec<String>,
    },
}

/// Renders the stacks an aborted update had already applied.
fn applied_note(applied: &[String]) -> String {
    if applied.is_empty() {
        String::new()
    } else {
        format!("; already updated: {}", applied.join(", "))
    }
}

/// Result type alias for stackplan operations.
pub type Result<T> = std::result::Result<T, StackplanError>;

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

impl UpdateError {
    /// Records the stacks already updated when an abort happened.
    ///
    /// Only aborts raised between batches carry them.
    #[must_use]
    pub fn with_applied(self, stacks: Vec<String>) -> Self {
        match self {
            Self::Declined { stacks: pending, .. } => Self::Declined {
                stacks: pending,
                applied: stacks,
            },
            Self::Confirmation { source, .. } => Self::Confirmation {
                source,
                applied: stacks,
            },
            other => other,
        }
    }

    /// Returns the stacks already updated before the abort.
    #[must_use]
    pub fn applied(&self) -> &[String] {
        match self {
            Self::Declined { applied, .. } | Self::Confirmation { applied, .. } => applied,
            _ => &[],
        }
    }
}

impl BackendError {
    /// Creates an operation failure for a stack.
    #[must_use]
    pub fn operation(
        stack: impl Into<String>,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::OperationFailed {
            stack: stack.into(),
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Creates a state corruption error.
    #[must_use]
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::StateCorrupted {
            message: message.into(),
        }
    }

    /// Returns true if the error reports an absent stack.
    #[must_use]
    pub const fn is_stack_missing(&self) -> bool {
        matches!(self, Self::StackDoesNotExist { .. })
    }
}
