//! Plan for one target.
//!
//! A [`Plan`] ties a target to the stack graph and the stack actions. Its
//! launch order is resolved on first use and shared by every operation
//! issued against the plan.

use std::fmt;
use std::sync::{Arc, OnceLock};

use tracing::info;

use crate::error::{ResolveError, UpdateError};
use crate::stack::StackGraph;

use super::actions::{StackAction, StackActions};
use super::executor::{BatchExecutor, ExecutionResult};
use super::resolver::{Batch, resolve};
use super::update::{ChangeSetPresenter, Confirm, UpdateOrchestrator, UpdateReport};

/// Operations over the stacks a target resolves to.
pub struct Plan {
    target: String,
    graph: Arc<StackGraph>,
    executor: BatchExecutor,
    launch_order: OnceLock<Result<Vec<Batch>, ResolveError>>,
}

impl fmt::Debug for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plan")
            .field("target", &self.target)
            .field("stacks", &self.graph.len())
            .field("resolved", &self.launch_order.get().is_some())
            .finish_non_exhaustive()
    }
}

impl Plan {
    /// Creates a plan for a target.
    #[must_use]
    pub fn new(target: impl Into<String>, graph: Arc<StackGraph>, actions: StackActions) -> Self {
        Self {
            target: target.into(),
            graph,
            executor: BatchExecutor::new(actions),
            launch_order: OnceLock::new(),
        }
    }

    /// Returns the target path.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Returns the executor used by this plan.
    #[must_use]
    pub const fn executor(&self) -> &BatchExecutor {
        &self.executor
    }

    /// Returns the ordered batches for the target, resolving them once.
    ///
    /// # Errors
    ///
    /// Returns the resolution error if the target is unknown or cyclic.
    pub fn launch_order(&self) -> Result<&[Batch], ResolveError> {
        match self
            .launch_order
            .get_or_init(|| resolve(&self.graph, &self.target))
        {
            Ok(batches) => Ok(batches.as_slice()),
            Err(e) => Err(e.clone()),
        }
    }

    /// Runs an action over the whole launch order.
    ///
    /// # Errors
    ///
    /// Returns the resolution error; per-stack failures are in the result.
    pub async fn execute(&self, action: &StackAction) -> Result<ExecutionResult, ResolveError> {
        let batches = self.launch_order()?;
        info!("{} {} ({} batches)", action, self.target, batches.len());
        Ok(self.executor.execute(action, batches).await)
    }

    /// Launches every stack of the target.
    ///
    /// # Errors
    ///
    /// Returns the resolution error; per-stack failures are in the result.
    pub async fn launch(&self) -> Result<ExecutionResult, ResolveError> {
        self.execute(&StackAction::Launch).await
    }

    /// Updates every stack of the target directly.
    ///
    /// # Errors
    ///
    /// Returns the resolution error; per-stack failures are in the result.
    pub async fn update(&self) -> Result<ExecutionResult, ResolveError> {
        self.execute(&StackAction::Update).await
    }

    /// Queries the status of every stack of the target.
    ///
    /// # Errors
    ///
    /// Returns the resolution error; per-stack failures are in the result.
    pub async fn status(&self) -> Result<ExecutionResult, ResolveError> {
        self.execute(&StackAction::GetStatus).await
    }

    /// Updates every stack of the target through change sets.
    ///
    /// # Errors
    ///
    /// See [`UpdateOrchestrator::run`].
    pub async fn update_with_change_sets(
        &self,
        confirm: &dyn Confirm,
        presenter: &dyn ChangeSetPresenter,
        auto_yes: bool,
    ) -> Result<UpdateReport, UpdateError> {
        let batches = self.launch_order()?;
        UpdateOrchestrator::new(self.executor.clone(), batches, confirm, presenter)
            .with_auto_yes(auto_yes)
            .run()
            .await
    }
}
