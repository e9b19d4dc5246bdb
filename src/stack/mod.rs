//! Stack model shared across the crate.
//!
//! Stacks are built once from configuration and shared as `Arc<Stack>` for
//! the lifetime of a plan run.

mod graph;
mod types;

pub use graph::{PROJECT_TARGET, StackGraph};
pub use types::{ChangeSetDescription, ChangeSetStatus, ResourceChange, Stack, StackStatus};

#[cfg(test)]
pub(crate) use graph::tests::{graph as test_graph, stack as test_stack};
