// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![warn(dead_code)]                   // Unused code is flagged
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![warn(unused_imports)]              // Unused imports are flagged
#![warn(unused_variables)]            // Unused variables are flagged
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Stackplan
//!
//! Dependency-ordered, batch-parallel deployment of infrastructure stacks.
//!
//! ## Overview
//!
//! A project declares stacks with path-like names (`dev/vpc`, `dev/app/web`)
//! and the stacks each one depends on. Stackplan:
//!
//! - Resolves a stack or stack group into ordered batches of independent stacks
//! - Runs an action concurrently within a batch and batch after batch
//! - Updates stacks through change sets that are always cleaned up
//! - Reports a per-stack outcome and maps it to a process exit code
//!
//! ## Architecture
//!
//! 1. **Resolution**: the stack graph and a target yield the launch order
//! 2. **Execution**: the batch executor applies one stack action per batch
//! 3. **Change sets**: the update orchestrator creates, waits, describes,
//!    confirms, executes and deletes change sets batch by batch
//!
//! ## Modules
//!
//! - [`config`]: Configuration parsing and validation
//! - [`stack`]: Stack model and the stack graph
//! - [`backend`]: Stack backend trait and the local file backend
//! - [`planner`]: Resolution, execution and change-set updates
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! project:
//!   name: web-platform
//!
//! settings:
//!   change_set_timeout_secs: 600
//!
//! stacks:
//!   - name: dev/vpc
//!     template: templates/vpc.yaml
//!   - name: dev/app
//!     template: templates/app.yaml
//!     dependencies: [dev/vpc]
//!     parameters:
//!       InstanceType: t3.small
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod planner;
pub mod stack;

// ============================================================================
// Re-exports
// ============================================================================

pub use backend::{LocalBackend, StackBackend};
pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ConfigHasher, ConfigParser, ConfigValidator, ProjectConfig};
pub use error::{Result, StackplanError};
pub use planner::{BatchExecutor, ExecutionResult, Outcome, Plan, StackAction, StackActions, UpdateOrchestrator};
pub use stack::{Stack, StackGraph};
