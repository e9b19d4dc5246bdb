//! Planning and execution of stack operations.
//!
//! This module resolves a target into ordered batches, applies stack
//! actions batch by batch, and drives change-set updates.

mod actions;
mod executor;
mod plan;
mod resolver;
mod update;

pub use actions::{ActionOutput, Outcome, StackAction, StackActions};
pub use executor::{BatchExecutor, ExecutionResult};
pub use plan::Plan;
pub use resolver::{Batch, resolve};
pub use update::{
    BatchReport, ChangeSetLease, ChangeSetPresenter, Confirm, UpdateOrchestrator, UpdateReport,
    change_set_name,
};
