//! Change-set update workflow.
//!
//! For every batch of the launch order a change set is created, awaited,
//! described and, once confirmed, executed for the stacks that have
//! changes. The change set is held by a [`ChangeSetLease`] and deleted for
//! every stack of the batch on every exit path.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::UpdateError;
use crate::stack::{ChangeSetDescription, ChangeSetStatus, Stack};

use super::actions::{ActionOutput, Outcome, StackAction};
use super::executor::{BatchExecutor, ExecutionResult};
use super::resolver::Batch;

/// Asks the user whether to go ahead with an operation.
pub trait Confirm: Send + Sync {
    /// Returns true if the operation may proceed.
    ///
    /// `auto_yes` answers yes without asking.
    ///
    /// # Errors
    ///
    /// Returns an error if the answer cannot be read.
    fn confirm(&self, operation: &str, auto_yes: bool, context: &str) -> std::io::Result<bool>;
}

/// Shows change-set descriptions to the user.
pub trait ChangeSetPresenter: Send + Sync {
    /// Presents one stack's change set.
    ///
    /// `status` is `None` when waiting for the change set failed, and
    /// `description` is `None` when describing it failed.
    fn present(&self, stack: &str, status: Option<ChangeSetStatus>, description: Option<&ChangeSetDescription>);
}

/// Generates a unique change-set name.
#[must_use]
pub fn change_set_name() -> String {
    format!("change-set-{}", Uuid::new_v4().simple())
}

/// Scoped ownership of one batch's change set.
///
/// [`ChangeSetLease::release`] deletes the change set for every stack of
/// the batch. A lease dropped without release, for example when the update
/// future is cancelled, schedules the same deletion on the current runtime.
/// That deletion first waits for the executor's in-flight tasks, so a
/// creation still running at cancellation cannot land after it.
#[derive(Debug)]
pub struct ChangeSetLease {
    executor: BatchExecutor,
    batch: Batch,
    name: String,
    released: bool,
}

impl ChangeSetLease {
    /// Takes ownership of the named change set for a batch.
    #[must_use]
    pub fn acquire(executor: BatchExecutor, batch: Batch, name: impl Into<String>) -> Self {
        Self {
            executor,
            batch,
            name: name.into(),
            released: false,
        }
    }

    /// Returns the change-set name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Deletes the change set for every stack of the batch.
    pub async fn release(mut self) -> ExecutionResult {
        self.released = true;
        debug!("Deleting change set {} for {:?}", self.name, self.batch.names());
        self.executor
            .execute_batch(&StackAction::DeleteChangeSet(self.name.clone()), &self.batch)
            .await
    }
}

impl Drop for ChangeSetLease {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("No runtime to delete change set {}; it is left in the backend", self.name);
            return;
        };

        warn!("Change set {} was not released, deleting in background", self.name);
        let executor = self.executor.clone();
        let batch = self.batch.clone();
        let action = StackAction::DeleteChangeSet(self.name.clone());
        handle.spawn(async move {
            executor.wait_idle().await;
            executor.execute_batch(&action, &batch).await;
        });
    }
}

/// What happened to one batch during a change-set update.
#[derive(Debug)]
pub struct BatchReport {
    /// Change-set name used for the batch.
    pub change_set: String,
    /// Outcomes of change-set creation.
    pub created: ExecutionResult,
    /// Terminal change-set statuses.
    pub statuses: ExecutionResult,
    /// Change-set descriptions.
    pub descriptions: ExecutionResult,
    /// Outcomes of execution, if any stack had changes.
    pub executed: Option<ExecutionResult>,
    /// Outcomes of change-set deletion.
    pub cleanup: ExecutionResult,
}

impl BatchReport {
    /// Returns the stacks whose change set was executed.
    #[must_use]
    pub fn executed_stacks(&self) -> Vec<&str> {
        self.executed
            .as_ref()
            .map(|result| result.iter().map(|(name, _)| name).collect())
            .unwrap_or_default()
    }

    /// Returns the stacks whose change set held no changes.
    #[must_use]
    pub fn unchanged_stacks(&self) -> Vec<&str> {
        self.stacks_with_status(ChangeSetStatus::NoChanges)
    }

    fn stacks_with_status(&self, status: ChangeSetStatus) -> Vec<&str> {
        self.statuses
            .iter()
            .filter(|(_, outcome)| outcome.change_set_status() == Some(status))
            .map(|(name, _)| name)
            .collect()
    }

    /// Returns true if no step failed for any stack of the batch.
    #[must_use]
    pub fn all_successful(&self) -> bool {
        self.created.all_successful()
            && self.statuses.all_successful()
            && self.descriptions.all_successful()
            && self.executed.as_ref().is_none_or(ExecutionResult::all_successful)
            && self.cleanup.all_successful()
    }
}

/// Result of a whole change-set update.
#[derive(Debug, Default)]
pub struct UpdateReport {
    /// Per-batch reports in launch order.
    pub batches: Vec<BatchReport>,
}

impl UpdateReport {
    /// Returns true if every batch succeeded.
    #[must_use]
    pub fn all_successful(&self) -> bool {
        self.batches.iter().all(BatchReport::all_successful)
    }

    /// Returns every stack whose change set was executed.
    #[must_use]
    pub fn executed_stacks(&self) -> Vec<&str> {
        self.batches.iter().flat_map(BatchReport::executed_stacks).collect()
    }
}

/// Drives change-set updates across a launch order.
pub struct UpdateOrchestrator<'a> {
    executor: BatchExecutor,
    batches: &'a [Batch],
    confirm: &'a dyn Confirm,
    presenter: &'a dyn ChangeSetPresenter,
    auto_yes: bool,
}

impl<'a> UpdateOrchestrator<'a> {
    /// Creates an orchestrator over the given batches.
    #[must_use]
    pub fn new(
        executor: BatchExecutor,
        batches: &'a [Batch],
        confirm: &'a dyn Confirm,
        presenter: &'a dyn ChangeSetPresenter,
    ) -> Self {
        Self {
            executor,
            batches,
            confirm,
            presenter,
            auto_yes: false,
        }
    }

    /// Answers yes to every confirmation.
    #[must_use]
    pub const fn with_auto_yes(mut self, auto_yes: bool) -> Self {
        self.auto_yes = auto_yes;
        self
    }

    /// Runs the update.
    ///
    /// Nothing is created unless every stack already exists. Declining a
    /// confirmation stops the whole update; batches already executed stay
    /// applied.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::NonexistentStacks`] or
    /// [`UpdateError::Precheck`] before any change set is created, and
    /// [`UpdateError::Declined`] or [`UpdateError::Confirmation`] after the
    /// current batch's change set has been deleted. Those carry the stacks
    /// earlier batches already updated.
    pub async fn run(&self) -> Result<UpdateReport, UpdateError> {
        self.precheck().await?;

        let mut report = UpdateReport::default();
        for (index, batch) in self.batches.iter().enumerate() {
            let name = change_set_name();
            info!(
                "Updating batch {}/{} with change set {name}",
                index + 1,
                self.batches.len()
            );

            let lease = ChangeSetLease::acquire(self.executor.clone(), batch.clone(), name.clone());
            let step = self.update_batch(batch, lease.name()).await;
            let cleanup = lease.release().await;

            let mut batch_report = match step {
                Ok(batch_report) => batch_report,
                Err(e) => {
                    let applied = report.executed_stacks().into_iter().map(String::from).collect();
                    return Err(e.with_applied(applied));
                }
            };
            batch_report.cleanup = cleanup;
            report.batches.push(batch_report);
        }

        Ok(report)
    }

    /// Checks that every stack of the launch order exists.
    async fn precheck(&self) -> Result<(), UpdateError> {
        let result = self.executor.execute(&StackAction::Exists, self.batches).await;

        let mut missing = Vec::new();
        let mut failure = None;
        for (name, outcome) in result {
            match outcome {
                Outcome::Success(ActionOutput::Exists(false)) => missing.push(name),
                Outcome::Failure(e) if failure.is_none() => failure = Some(e),
                _ => {}
            }
        }

        if !missing.is_empty() {
            warn!("Aborting update, stacks do not exist: {:?}", missing);
            return Err(UpdateError::NonexistentStacks { stacks: missing });
        }
        failure.map_or(Ok(()), |e| Err(UpdateError::Precheck(e)))
    }

    async fn update_batch(&self, batch: &Batch, name: &str) -> Result<BatchReport, UpdateError> {
        let created = self
            .executor
            .execute_batch(&StackAction::CreateChangeSet(name.to_string()), batch)
            .await;
        let statuses = self
            .executor
            .execute_batch(&StackAction::WaitForChangeSet(name.to_string()), batch)
            .await;
        let descriptions = self
            .executor
            .execute_batch(&StackAction::DescribeChangeSet(name.to_string()), batch)
            .await;

        for stack in batch.iter() {
            self.presenter.present(
                &stack.name,
                statuses.get(&stack.name).and_then(Outcome::change_set_status),
                descriptions.get(&stack.name).and_then(Outcome::description),
            );
        }

        let candidates: Vec<Arc<Stack>> = batch
            .iter()
            .filter(|stack| {
                statuses.get(&stack.name).and_then(Outcome::change_set_status) == Some(ChangeSetStatus::Ready)
            })
            .cloned()
            .collect();

        let executed = if candidates.is_empty() {
            info!("No stack in batch has changes to execute");
            None
        } else {
            let candidates = Batch::new(candidates);
            let names = candidates.names();
            let proceed = self
                .confirm
                .confirm("update", self.auto_yes, &names.join(", "))
                .map_err(|source| UpdateError::Confirmation {
                    source,
                    applied: Vec::new(),
                })?;
            if !proceed {
                warn!("Update of {:?} declined", names);
                return Err(UpdateError::Declined {
                    stacks: names,
                    applied: Vec::new(),
                });
            }

            Some(
                self.executor
                    .execute_batch(&StackAction::ExecuteChangeSet(name.to_string()), &candidates)
                    .await,
            )
        };

        Ok(BatchReport {
            change_set: name.to_string(),
            created,
            statuses,
            descriptions,
            executed,
            cleanup: ExecutionResult::new(),
        })
    }
}
