//! Stack backends.
//!
//! The orchestrator talks to infrastructure only through [`StackBackend`].
//! A file-based [`LocalBackend`] is provided for running projects locally.

mod local;
mod store;
mod types;

#[cfg(test)]
pub(crate) mod recording;

pub use local::LocalBackend;
pub use store::{BackendResult, StackBackend};
pub use types::{BackendState, ChangeSetRecord, ResourceRecord, STATE_VERSION, StackRecord};

#[cfg(test)]
pub(crate) use store::MockStackBackend;
