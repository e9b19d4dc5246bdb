//! Batch executor for applying one action across ordered batches.
//!
//! Every stack of a batch gets its own task; the next batch is not
//! submitted until every task of the current one has finished. Failures are
//! captured per stack and never abort the run.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::BackendError;

use super::actions::{Outcome, StackAction, StackActions};
use super::resolver::Batch;

/// Per-stack outcomes of one executor run, keyed by stack name.
#[derive(Debug, Default)]
pub struct ExecutionResult {
    outcomes: BTreeMap<String, Outcome>,
}

impl ExecutionResult {
    /// Creates an empty result.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the outcome for a stack.
    #[must_use]
    pub fn get(&self, stack: &str) -> Option<&Outcome> {
        self.outcomes.get(stack)
    }

    /// Returns the number of stacks in the result.
    #[must_use]
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Returns true if no stack was submitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Iterates outcomes in stack name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Outcome)> {
        self.outcomes.iter().map(|(name, outcome)| (name.as_str(), outcome))
    }

    /// Returns true if every outcome is a success.
    #[must_use]
    pub fn all_successful(&self) -> bool {
        self.outcomes.values().all(Outcome::is_success)
    }

    /// Returns the number of successful outcomes.
    #[must_use]
    pub fn success_count(&self) -> usize {
        self.outcomes.values().filter(|o| o.is_success()).count()
    }

    /// Returns the stacks whose call failed, with their errors.
    #[must_use]
    pub fn failures(&self) -> Vec<(&str, &BackendError)> {
        self.outcomes
            .iter()
            .filter_map(|(name, outcome)| outcome.error().map(|e| (name.as_str(), e)))
            .collect()
    }

    /// Records an outcome.
    pub fn insert(&mut self, stack: impl Into<String>, outcome: Outcome) {
        self.outcomes.insert(stack.into(), outcome);
    }
}

impl IntoIterator for ExecutionResult {
    type Item = (String, Outcome);
    type IntoIter = std::collections::btree_map::IntoIter<String, Outcome>;

    fn into_iter(self) -> Self::IntoIter {
        self.outcomes.into_iter()
    }
}

impl fmt::Display for ExecutionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, outcome) in &self.outcomes {
            writeln!(f, "{name}: {outcome}")?;
        }
        Ok(())
    }
}

/// Runs stack actions batch by batch.
///
/// Clones share one in-flight tracker: every spawned task holds a read
/// guard on it until its backend call returns, including tasks left
/// running when an `execute` future is dropped.
#[derive(Debug, Clone)]
pub struct BatchExecutor {
    actions: StackActions,
    in_flight: Arc<RwLock<()>>,
}

impl BatchExecutor {
    /// Creates an executor over a set of stack actions.
    #[must_use]
    pub fn new(actions: StackActions) -> Self {
        Self {
            actions,
            in_flight: Arc::new(RwLock::new(())),
        }
    }

    /// Returns the stack actions used by this executor.
    #[must_use]
    pub const fn actions(&self) -> &StackActions {
        &self.actions
    }

    /// Applies an action to every stack of every batch.
    ///
    /// Stacks within a batch run concurrently; batches run in order. The
    /// result holds one outcome per submitted stack.
    pub async fn execute(&self, action: &StackAction, batches: &[Batch]) -> ExecutionResult {
        let mut result = ExecutionResult::new();
        let total = batches.len();

        for (index, batch) in batches.iter().enumerate() {
            info!(
                "Running {} on batch {}/{}: {:?}",
                action,
                index + 1,
                total,
                batch.names()
            );

            let mut handles: Vec<(String, JoinHandle<Outcome>)> = Vec::with_capacity(batch.len());
            for stack in batch.iter() {
                let actions = self.actions.clone();
                let stack = Arc::clone(stack);
                let action = action.clone();

                let name = stack.name.clone();
                // Taken before spawning so a cancelled run never leaves an untracked task
                let guard = Arc::clone(&self.in_flight).read_owned().await;
                let handle = tokio::spawn(async move {
                    let outcome = actions.run(&stack, &action).await;
                    drop(guard);
                    outcome
                });
                handles.push((name, handle));
            }

            // Wait for the whole batch before moving on
            for (name, handle) in handles {
                let outcome = handle.await.unwrap_or_else(|e| {
                    warn!("Task for {name} did not complete: {e}");
                    Outcome::Failure(BackendError::TaskFailed {
                        stack: name.clone(),
                        message: e.to_string(),
                    })
                });
                debug!("{name}: {outcome}");
                result.insert(name, outcome);
            }
        }

        result
    }

    /// Waits until every task spawned by this executor or its clones has
    /// finished.
    pub async fn wait_idle(&self) {
        drop(self.in_flight.write().await);
    }

    /// Applies an action to a single batch.
    pub async fn execute_batch(&self, action: &StackAction, batch: &Batch) -> ExecutionResult {
        self.execute(action, std::slice::from_ref(batch)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::recording::{Op, RecordingBackend};
    use crate::backend::MockStackBackend;
    use crate::planner::actions::ActionOutput;
    use crate::planner::resolver::resolve;
    use crate::stack::{StackStatus, test_graph, test_stack};
    use std::time::Duration;

    fn executor(backend: Arc<RecordingBackend>) -> BatchExecutor {
        BatchExecutor::new(StackActions::new(backend))
    }

    #[tokio::test]
    async fn test_batch_members_run_concurrently() {
        let g = test_graph(&[("dev/a", &[]), ("dev/b", &[]), ("dev/c", &[]), ("dev/d", &[])]);
        let batches = resolve(&g, "dev").expect("resolves");
        let backend = Arc::new(RecordingBackend::new().with_delay(Duration::from_millis(100)));

        let result = executor(backend.clone()).execute(&StackAction::Launch, &batches).await;

        assert_eq!(result.len(), 4);
        assert!(result.all_successful());

        let calls = backend.calls_of(Op::Launch);
        let last_start = calls.iter().map(|c| c.started).max().expect("calls recorded");
        let first_finish = calls.iter().map(|c| c.finished).min().expect("calls recorded");
        assert!(last_start < first_finish, "every launch starts before any finishes");
    }

    #[tokio::test]
    async fn test_batches_run_in_order() {
        let g = test_graph(&[
            ("dev/vpc", &[]),
            ("dev/db", &["dev/vpc"]),
            ("dev/app", &["dev/db"]),
            ("dev/cdn", &["dev/vpc"]),
        ]);
        let batches = resolve(&g, "dev").expect("resolves");
        let backend = Arc::new(RecordingBackend::new().with_delay(Duration::from_millis(20)));

        let result = executor(backend.clone()).execute(&StackAction::Update, &batches).await;
        assert_eq!(result.len(), 4);

        let calls = backend.calls_of(Op::Update);
        for (index, batch) in batches.iter().enumerate().skip(1) {
            let earliest_start = calls
                .iter()
                .filter(|c| batch.contains(&c.stack))
                .map(|c| c.started)
                .min()
                .expect("batch ran");
            for previous in &batches[..index] {
                for call in calls.iter().filter(|c| previous.contains(&c.stack)) {
                    assert!(call.finished <= earliest_start, "{} finished late", call.stack);
                }
            }
        }
    }

    #[tokio::test]
    async fn test_failure_is_captured_per_stack() {
        let g = test_graph(&[("dev/a", &[]), ("dev/b", &[]), ("dev/c", &["dev/a"])]);
        let batches = resolve(&g, "dev").expect("resolves");
        let backend = Arc::new(RecordingBackend::new().failing(Op::Launch, "dev/a"));

        let result = executor(backend.clone()).execute(&StackAction::Launch, &batches).await;

        assert_eq!(result.len(), 3);
        assert!(!result.all_successful());
        assert_eq!(result.success_count(), 2);
        let failures = result.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "dev/a");
        // The next batch still runs; callers decide what a failure means
        assert_eq!(backend.count_for(Op::Launch, "dev/c"), 1);
    }

    #[tokio::test]
    async fn test_panicking_task_becomes_failure() {
        let mut mock = MockStackBackend::new();
        mock.expect_get_status().returning(|_| panic!("backend exploded"));
        let executor = BatchExecutor::new(StackActions::new(Arc::new(mock)));
        let batch = Batch::new(vec![Arc::new(test_stack("dev/a", &[]))]);

        let result = executor.execute_batch(&StackAction::GetStatus, &batch).await;

        assert!(matches!(
            result.get("dev/a"),
            Some(Outcome::Failure(BackendError::TaskFailed { .. }))
        ));
    }

    #[tokio::test]
    async fn test_wait_idle_outlasts_cancelled_execute() {
        let g = test_graph(&[("dev/a", &[]), ("dev/b", &[])]);
        let batches = resolve(&g, "dev").expect("resolves");
        let backend = Arc::new(RecordingBackend::new().with_delay(Duration::from_millis(100)));
        let executor = executor(backend.clone());

        let cancelled = tokio::time::timeout(
            Duration::from_millis(20),
            executor.execute(&StackAction::Launch, &batches),
        )
        .await;
        assert!(cancelled.is_err());
        assert!(backend.calls().is_empty());

        executor.clone().wait_idle().await;
        assert_eq!(backend.count(Op::Launch), 2);
    }

    #[tokio::test]
    async fn test_results_are_fresh_per_call() {
        let g = test_graph(&[("dev/a", &[]), ("prod/b", &[])]);
        let backend = Arc::new(RecordingBackend::new());
        let executor = executor(backend);

        let first = executor
            .execute(&StackAction::GetStatus, &resolve(&g, "dev").expect("resolves"))
            .await;
        let second = executor
            .execute(&StackAction::GetStatus, &resolve(&g, "prod").expect("resolves"))
            .await;

        assert_eq!(first.iter().map(|(n, _)| n).collect::<Vec<_>>(), vec!["dev/a"]);
        assert_eq!(second.iter().map(|(n, _)| n).collect::<Vec<_>>(), vec!["prod/b"]);
        assert!(matches!(
            second.get("prod/b"),
            Some(Outcome::Success(ActionOutput::Status(StackStatus::CreateComplete)))
        ));
    }
}
