//! Stack backend trait definition.
//!
//! This module defines the capability surface the orchestrator needs from an
//! infrastructure provider. Every call may suspend; polling, retries and
//! protocol details belong to the implementation.

use async_trait::async_trait;

use crate::error::BackendError;
use crate::stack::{ChangeSetDescription, ChangeSetStatus, Stack, StackStatus};

/// Result type for backend calls.
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Trait for stack backends.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StackBackend: Send + Sync {
    /// Returns the current status of a stack.
    ///
    /// Fails with [`BackendError::StackDoesNotExist`] if the stack is absent.
    async fn get_status(&self, stack: &Stack) -> BackendResult<StackStatus>;

    /// Creates the stack, or updates it if it already exists.
    async fn launch(&self, stack: &Stack) -> BackendResult<StackStatus>;

    /// Updates an existing stack.
    async fn update(&self, stack: &Stack) -> BackendResult<StackStatus>;

    /// Creates a named change set against the stack.
    async fn create_change_set(&self, stack: &Stack, name: &str) -> BackendResult<()>;

    /// Deletes a named change set.
    ///
    /// Fails with [`BackendError::ChangeSetNotFound`] if it is absent.
    async fn delete_change_set(&self, stack: &Stack, name: &str) -> BackendResult<()>;

    /// Blocks until the change set reaches a terminal status.
    async fn wait_for_change_set(&self, stack: &Stack, name: &str) -> BackendResult<ChangeSetStatus>;

    /// Describes the changes a change set would apply.
    async fn describe_change_set(
        &self,
        stack: &Stack,
        name: &str,
    ) -> BackendResult<ChangeSetDescription>;

    /// Applies a READY change set.
    ///
    /// Fails with [`BackendError::InvalidChangeSetStatus`] otherwise.
    async fn execute_change_set(&self, stack: &Stack, name: &str) -> BackendResult<StackStatus>;

    /// Gets the backend type name.
    fn backend_type(&self) -> &'static str;
}
