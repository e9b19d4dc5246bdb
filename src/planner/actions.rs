//! Per-stack actions.
//!
//! [`StackActions`] wraps a backend and normalises every call into a typed
//! result. [`StackAction`] names an action so the batch executor can apply
//! the same one to many stacks; [`StackActions::run`] turns a backend result
//! into an [`Outcome`] that never escapes as an error.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use crate::backend::{BackendResult, StackBackend};
use crate::error::BackendError;
use crate::stack::{ChangeSetDescription, ChangeSetStatus, Stack, StackStatus};

/// An action that can be applied to every stack of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackAction {
    /// Query the stack status.
    GetStatus,
    /// Check whether the stack exists.
    Exists,
    /// Create or update the stack.
    Launch,
    /// Update an existing stack.
    Update,
    /// Create the named change set.
    CreateChangeSet(String),
    /// Wait for the named change set to reach a terminal status.
    WaitForChangeSet(String),
    /// Describe the named change set.
    DescribeChangeSet(String),
    /// Execute the named change set.
    ExecuteChangeSet(String),
    /// Delete the named change set.
    DeleteChangeSet(String),
}

impl StackAction {
    /// Returns the action name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::GetStatus => "get_status",
            Self::Exists => "exists",
            Self::Launch => "launch",
            Self::Update => "update",
            Self::CreateChangeSet(_) => "create_change_set",
            Self::WaitForChangeSet(_) => "wait_for_cs_completion",
            Self::DescribeChangeSet(_) => "describe_change_set",
            Self::ExecuteChangeSet(_) => "execute_change_set",
            Self::DeleteChangeSet(_) => "delete_change_set",
        }
    }

    /// Returns the change-set name carried by the action, if any.
    #[must_use]
    pub fn change_set(&self) -> Option<&str> {
        match self {
            Self::GetStatus | Self::Exists | Self::Launch | Self::Update => None,
            Self::CreateChangeSet(name)
            | Self::WaitForChangeSet(name)
            | Self::DescribeChangeSet(name)
            | Self::ExecuteChangeSet(name)
            | Self::DeleteChangeSet(name) => Some(name),
        }
    }

    /// Returns true if the action changes backend state.
    #[must_use]
    pub const fn is_mutating(&self) -> bool {
        !matches!(
            self,
            Self::GetStatus | Self::Exists | Self::WaitForChangeSet(_) | Self::DescribeChangeSet(_)
        )
    }
}

impl fmt::Display for StackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.change_set() {
            Some(name) => write!(f, "{} ({name})", self.name()),
            None => write!(f, "{}", self.name()),
        }
    }
}

/// Value produced by a successful action.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ActionOutput {
    /// Stack status after a status query, launch, update or execution.
    Status(StackStatus),
    /// Whether the stack exists.
    Exists(bool),
    /// Terminal change-set status.
    ChangeSetStatus(ChangeSetStatus),
    /// Change-set description.
    Description(Box<ChangeSetDescription>),
    /// The action completed without a value.
    Done,
}

impl fmt::Display for ActionOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(status) => write!(f, "{status}"),
            Self::Exists(true) => write!(f, "EXISTS"),
            Self::Exists(false) => write!(f, "DOES_NOT_EXIST"),
            Self::ChangeSetStatus(status) => write!(f, "{status}"),
            Self::Description(description) => write!(
                f,
                "{} ({} changes)",
                description.status,
                description.changes.len()
            ),
            Self::Done => write!(f, "OK"),
        }
    }
}

/// Per-stack result of an action.
#[derive(Debug)]
pub enum Outcome {
    /// The backend call succeeded.
    Success(ActionOutput),
    /// The backend call failed.
    Failure(BackendError),
}

impl Outcome {
    /// Wraps a backend result.
    #[must_use]
    pub fn from_result(result: BackendResult<ActionOutput>) -> Self {
        match result {
            Ok(output) => Self::Success(output),
            Err(e) => Self::Failure(e),
        }
    }

    /// Returns true if the outcome counts as a success for the exit code.
    ///
    /// A failed or in-progress stack and a FAILED change set are not
    /// successes even though the call itself returned.
    #[must_use]
    pub fn is_success(&self) -> bool {
        match self {
            Self::Success(ActionOutput::Status(status)) => status.is_success(),
            Self::Success(ActionOutput::ChangeSetStatus(status)) => *status != ChangeSetStatus::Failed,
            Self::Success(_) => true,
            Self::Failure(_) => false,
        }
    }

    /// Returns the change-set status carried by the outcome.
    #[must_use]
    pub fn change_set_status(&self) -> Option<ChangeSetStatus> {
        match self {
            Self::Success(ActionOutput::ChangeSetStatus(status)) => Some(*status),
            Self::Success(ActionOutput::Description(description)) => Some(description.status),
            _ => None,
        }
    }

    /// Returns the change-set description carried by the outcome.
    #[must_use]
    pub fn description(&self) -> Option<&ChangeSetDescription> {
        match self {
            Self::Success(ActionOutput::Description(description)) => Some(&**description),
            _ => None,
        }
    }

    /// Returns the error carried by the outcome.
    #[must_use]
    pub const fn error(&self) -> Option<&BackendError> {
        match self {
            Self::Failure(e) => Some(e),
            Self::Success(_) => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success(output) => write!(f, "{output}"),
            Self::Failure(e) => write!(f, "FAILED: {e}"),
        }
    }
}

/// Stack actions backed by a [`StackBackend`].
#[derive(Clone)]
pub struct StackActions {
    backend: Arc<dyn StackBackend>,
    wait_timeout: Option<Duration>,
}

impl fmt::Debug for StackActions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StackActions")
            .field("backend", &self.backend.backend_type())
            .field("wait_timeout", &self.wait_timeout)
            .finish()
    }
}

impl StackActions {
    /// Creates actions over a backend.
    #[must_use]
    pub fn new(backend: Arc<dyn StackBackend>) -> Self {
        Self {
            backend,
            wait_timeout: None,
        }
    }

    /// Sets a limit on how long to wait for a change set.
    #[must_use]
    pub fn with_wait_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.wait_timeout = timeout;
        self
    }

    /// Returns the underlying backend.
    #[must_use]
    pub fn backend(&self) -> &Arc<dyn StackBackend> {
        &self.backend
    }

    /// Queries the stack status.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::StackDoesNotExist`] if the stack is absent.
    pub async fn get_status(&self, stack: &Stack) -> BackendResult<StackStatus> {
        self.backend.get_status(stack).await
    }

    /// Returns whether the stack exists.
    ///
    /// # Errors
    ///
    /// Returns backend errors other than an absent stack.
    pub async fn exists(&self, stack: &Stack) -> BackendResult<bool> {
        match self.backend.get_status(stack).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_stack_missing() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Creates the stack or brings it up to date.
    ///
    /// # Errors
    ///
    /// Returns the backend error if the launch fails.
    pub async fn launch(&self, stack: &Stack) -> BackendResult<StackStatus> {
        debug!("Launching {}", stack.name);
        self.backend.launch(stack).await
    }

    /// Updates an existing stack.
    ///
    /// # Errors
    ///
    /// Returns the backend error if the update fails.
    pub async fn update(&self, stack: &Stack) -> BackendResult<StackStatus> {
        debug!("Updating {}", stack.name);
        self.backend.update(stack).await
    }

    /// Creates a change set.
    ///
    /// # Errors
    ///
    /// Returns the backend error if creation fails.
    pub async fn create_change_set(&self, stack: &Stack, name: &str) -> BackendResult<()> {
        debug!("Creating change set {name} for {}", stack.name);
        self.backend.create_change_set(stack, name).await
    }

    /// Deletes a change set.
    ///
    /// An absent change set or stack is not an error, so this is safe after
    /// a partially failed creation.
    ///
    /// # Errors
    ///
    /// Returns any other backend error.
    pub async fn delete_change_set(&self, stack: &Stack, name: &str) -> BackendResult<()> {
        match self.backend.delete_change_set(stack, name).await {
            Err(BackendError::ChangeSetNotFound { .. } | BackendError::StackDoesNotExist { .. }) => {
                debug!("Change set {name} for {} already gone", stack.name);
                Ok(())
            }
            other => other,
        }
    }

    /// Waits for a change set to reach a terminal status.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::ChangeSetWaitTimeout`] if a wait timeout is
    /// set and exceeded, or the backend error.
    pub async fn wait_for_cs_completion(&self, stack: &Stack, name: &str) -> BackendResult<ChangeSetStatus> {
        let wait = self.backend.wait_for_change_set(stack, name);
        let Some(limit) = self.wait_timeout else {
            return wait.await;
        };

        tokio::time::timeout(limit, wait).await.unwrap_or_else(|_| {
            warn!("Timed out waiting for change set {name} on {}", stack.name);
            Err(BackendError::ChangeSetWaitTimeout {
                stack: stack.name.clone(),
                change_set: name.to_string(),
                timeout_secs: limit.as_secs(),
            })
        })
    }

    /// Describes a change set.
    ///
    /// # Errors
    ///
    /// Returns the backend error if the change set cannot be described.
    pub async fn describe_change_set(&self, stack: &Stack, name: &str) -> BackendResult<ChangeSetDescription> {
        self.backend.describe_change_set(stack, name).await
    }

    /// Executes a change set.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::InvalidChangeSetStatus`] if the change set is
    /// not READY, or the backend error.
    pub async fn execute_change_set(&self, stack: &Stack, name: &str) -> BackendResult<StackStatus> {
        debug!("Executing change set {name} for {}", stack.name);
        self.backend.execute_change_set(stack, name).await
    }

    /// Runs an action against one stack.
    pub async fn run(&self, stack: &Stack, action: &StackAction) -> Outcome {
        let result = match action {
            StackAction::GetStatus => self.get_status(stack).await.map(ActionOutput::Status),
            StackAction::Exists => self.exists(stack).await.map(ActionOutput::Exists),
            StackAction::Launch => self.launch(stack).await.map(ActionOutput::Status),
            StackAction::Update => self.update(stack).await.map(ActionOutput::Status),
            StackAction::CreateChangeSet(name) => {
                self.create_change_set(stack, name).await.map(|()| ActionOutput::Done)
            }
            StackAction::WaitForChangeSet(name) => self
                .wait_for_cs_completion(stack, name)
                .await
                .map(ActionOutput::ChangeSetStatus),
            StackAction::DescribeChangeSet(name) => self
                .describe_change_set(stack, name)
                .await
                .map(|d| ActionOutput::Description(Box::new(d))),
            StackAction::ExecuteChangeSet(name) => {
                self.execute_change_set(stack, name).await.map(ActionOutput::Status)
            }
            StackAction::DeleteChangeSet(name) => {
                self.delete_change_set(stack, name).await.map(|()| ActionOutput::Done)
            }
        };

        if let Err(e) = &result {
            warn!("{} failed for {}: {e}", action.name(), stack.name);
        }
        Outcome::from_result(result)
    }
}
