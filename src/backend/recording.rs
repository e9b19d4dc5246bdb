//! Recording backend used by orchestration tests.
//!
//! Every call is recorded with its start and finish time so tests can check
//! concurrency, ordering and cleanup counts. Failures and change-set
//! statuses can be injected per stack.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::BackendError;
use crate::stack::{ChangeSetDescription, ChangeSetStatus, ResourceChange, Stack, StackStatus};

use super::store::{BackendResult, StackBackend};

/// Backend operations as seen by the recorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Op {
    GetStatus,
    Launch,
    Update,
    CreateChangeSet,
    DeleteChangeSet,
    Wait,
    Describe,
    Execute,
}

/// One recorded backend call.
#[derive(Debug, Clone)]
pub(crate) struct Call {
    pub(crate) op: Op,
    pub(crate) stack: String,
    pub(crate) change_set: Option<String>,
    pub(crate) started: Instant,
    pub(crate) finished: Instant,
}

#[derive(Debug, Default)]
pub(crate) struct RecordingBackend {
    calls: Mutex<Vec<Call>>,
    delay: Duration,
    failures: HashSet<(Op, String)>,
    missing: HashSet<String>,
    statuses: HashMap<String, ChangeSetStatus>,
}

impl RecordingBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Makes every call take `delay`.
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Makes `op` fail for `stack`.
    pub(crate) fn failing(mut self, op: Op, stack: &str) -> Self {
        self.failures.insert((op, stack.to_string()));
        self
    }

    /// Makes `stack` absent from the backend.
    pub(crate) fn missing(mut self, stack: &str) -> Self {
        self.missing.insert(stack.to_string());
        self
    }

    /// Sets the terminal change-set status reported for `stack`.
    pub(crate) fn change_set_status(mut self, stack: &str, status: ChangeSetStatus) -> Self {
        self.statuses.insert(stack.to_string(), status);
        self
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("call log poisoned").clone()
    }

    pub(crate) fn count(&self, op: Op) -> usize {
        self.calls().iter().filter(|c| c.op == op).count()
    }

    pub(crate) fn count_for(&self, op: Op, stack: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.op == op && c.stack == stack)
            .count()
    }

    pub(crate) fn calls_of(&self, op: Op) -> Vec<Call> {
        self.calls().into_iter().filter(|c| c.op == op).collect()
    }

    fn status_for(&self, stack: &str) -> ChangeSetStatus {
        self.statuses.get(stack).copied().unwrap_or(ChangeSetStatus::Ready)
    }

    async fn record<T>(&self, op: Op, stack: &Stack, change_set: Option<&str>, value: T) -> BackendResult<T> {
        let started = Instant::now();
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.calls.lock().expect("call log poisoned").push(Call {
            op,
            stack: stack.name.clone(),
            change_set: change_set.map(String::from),
            started,
            finished: Instant::now(),
        });

        if self.missing.contains(&stack.name) {
            return Err(BackendError::StackDoesNotExist {
                stack: stack.name.clone(),
            });
        }
        if self.failures.contains(&(op, stack.name.clone())) {
            return Err(BackendError::operation(&stack.name, format!("{op:?}"), "injected failure"));
        }
        Ok(value)
    }
}

#[async_trait]
impl StackBackend for RecordingBackend {
    async fn get_status(&self, stack: &Stack) -> BackendResult<StackStatus> {
        self.record(Op::GetStatus, stack, None, StackStatus::CreateComplete).await
    }

    async fn launch(&self, stack: &Stack) -> BackendResult<StackStatus> {
        self.record(Op::Launch, stack, None, StackStatus::CreateComplete).await
    }

    async fn update(&self, stack: &Stack) -> BackendResult<StackStatus> {
        self.record(Op::Update, stack, None, StackStatus::UpdateComplete).await
    }

    async fn create_change_set(&self, stack: &Stack, name: &str) -> BackendResult<()> {
        self.record(Op::CreateChangeSet, stack, Some(name), ()).await
    }

    async fn delete_change_set(&self, stack: &Stack, name: &str) -> BackendResult<()> {
        self.record(Op::DeleteChangeSet, stack, Some(name), ()).await
    }

    async fn wait_for_change_set(&self, stack: &Stack, name: &str) -> BackendResult<ChangeSetStatus> {
        let status = self.status_for(&stack.name);
        self.record(Op::Wait, stack, Some(name), status).await
    }

    async fn describe_change_set(
        &self,
        stack: &Stack,
        name: &str,
    ) -> BackendResult<ChangeSetDescription> {
        let status = self.status_for(&stack.name);
        let changes = if status == ChangeSetStatus::Ready {
            vec![ResourceChange {
                action: String::from("Modify"),
                logical_resource_id: String::from("Resource"),
                physical_resource_id: Some(String::from("resource-1")),
                replacement: Some(String::from("False")),
                resource_type: String::from("Test::Resource"),
                scope: vec![String::from("Properties")],
                details: None,
            }]
        } else {
            vec![]
        };
        let description = ChangeSetDescription {
            change_set_name: name.to_string(),
            stack_name: stack.name.clone(),
            creation_time: Utc::now(),
            execution_status: String::from("AVAILABLE"),
            status,
            status_reason: None,
            changes,
            extra: BTreeMap::new(),
        };
        self.record(Op::Describe, stack, Some(name), description).await
    }

    async fn execute_change_set(&self, stack: &Stack, name: &str) -> BackendResult<StackStatus> {
        let status = self.status_for(&stack.name);
        let result = self.record(Op::Execute, stack, Some(name), StackStatus::UpdateComplete).await?;
        if status != ChangeSetStatus::Ready {
            return Err(BackendError::InvalidChangeSetStatus {
                stack: stack.name.clone(),
                change_set: name.to_string(),
                status: status.to_string(),
            });
        }
        Ok(result)
    }

    fn backend_type(&self) -> &'static str {
        "recording"
    }
}
