//! Local file-based stack backend.
//!
//! This backend keeps deployed stacks and pending change sets in a JSON
//! state file so projects can be planned and exercised on a single machine.
//! Templates are read from disk; each entry of their top-level `Resources`
//! map is fingerprinted to decide what a launch or change set would alter.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::ConfigHasher;
use crate::error::BackendError;
use crate::stack::{ChangeSetDescription, ChangeSetStatus, ResourceChange, Stack, StackStatus};

use super::store::{BackendResult, StackBackend};
use super::types::{BackendState, ChangeSetRecord, ResourceRecord, StackRecord};

/// State file name.
const STATE_FILE: &str = "state.json";

/// Execution status of a change set that can still be executed.
const EXECUTION_AVAILABLE: &str = "AVAILABLE";

/// Execution status of a change set with nothing to execute.
const EXECUTION_UNAVAILABLE: &str = "UNAVAILABLE";

/// Execution status of an applied change set.
const EXECUTION_COMPLETE: &str = "EXECUTE_COMPLETE";

/// Local file-based stack backend.
#[derive(Debug)]
pub struct LocalBackend {
    /// Base directory for state files.
    base_dir: PathBuf,
    /// Path to the state file.
    state_path: PathBuf,
    /// Serialises read-modify-write cycles on the state file.
    guard: Mutex<()>,
    /// Fingerprint helper.
    hasher: ConfigHasher,
}

/// A resource declared in a template.
#[derive(Debug, Clone)]
struct TemplateResource {
    resource_type: String,
    hash: String,
}

/// Outcome of comparing a template against deployed resources.
#[derive(Debug, Default)]
struct ResourcePlan {
    target: BTreeMap<String, ResourceRecord>,
    changes: Vec<ResourceChange>,
}

impl LocalBackend {
    /// Creates a new local backend storing state under `base_dir`.
    #[must_use]
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        let state_path = base_dir.join(STATE_FILE);

        Self {
            base_dir,
            state_path,
            guard: Mutex::new(()),
            hasher: ConfigHasher::new(),
        }
    }

    /// Returns the path of the state file.
    #[must_use]
    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    /// Ensures the state directory exists.
    async fn ensure_dir(&self) -> BackendResult<()> {
        if !self.base_dir.exists() {
            debug!("Creating state directory: {}", self.base_dir.display());
            fs::create_dir_all(&self.base_dir).await.map_err(|e| {
                BackendError::corrupted(format!("Failed to create state directory: {e}"))
            })?;
        }
        Ok(())
    }

    /// Loads the state file, or an empty state if none exists yet.
    async fn load_state(&self) -> BackendResult<BackendState> {
        if !self.state_path.exists() {
            debug!("State file does not exist: {}", self.state_path.display());
            return Ok(BackendState::new());
        }

        let content = fs::read_to_string(&self.state_path)
            .await
            .map_err(|e| BackendError::corrupted(format!("Failed to read state file: {e}")))?;

        serde_json::from_str(&content)
            .map_err(|e| BackendError::corrupted(format!("Failed to parse state file: {e}")))
    }

    /// Writes the state file atomically.
    async fn save_state(&self, state: &mut BackendState) -> BackendResult<()> {
        self.ensure_dir().await?;
        state.updated_at = Utc::now();

        let content = serde_json::to_string_pretty(state)
            .map_err(|e| BackendError::corrupted(format!("Failed to serialize state: {e}")))?;

        // Write to a temporary file first, then rename for atomicity
        let temp_path = self.state_path.with_extension("tmp");

        let mut file = fs::File::create(&temp_path).await.map_err(|e| {
            BackendError::corrupted(format!("Failed to create temp state file: {e}"))
        })?;

        file.write_all(content.as_bytes())
            .await
            .map_err(|e| BackendError::corrupted(format!("Failed to write state file: {e}")))?;

        file.sync_all()
            .await
            .map_err(|e| BackendError::corrupted(format!("Failed to sync state file: {e}")))?;

        fs::rename(&temp_path, &self.state_path)
            .await
            .map_err(|e| BackendError::corrupted(format!("Failed to rename state file: {e}")))?;

        debug!("State saved to {}", self.state_path.display());
        Ok(())
    }

    /// Reads and fingerprints the resources declared by a stack template.
    async fn read_template(&self, stack: &Stack) -> BackendResult<BTreeMap<String, TemplateResource>> {
        let template_error = |message: String| BackendError::TemplateError {
            stack: stack.name.clone(),
            path: stack.template_path.clone(),
            message,
        };

        let content = fs::read_to_string(&stack.template_path)
            .await
            .map_err(|e| template_error(format!("cannot read template: {e}")))?;

        let document: serde_json::Value = serde_yaml::from_str(&content)
            .map_err(|e| template_error(format!("cannot parse template: {e}")))?;

        let resources = document
            .get("Resources")
            .and_then(serde_json::Value::as_object)
            .ok_or_else(|| template_error(String::from("template has no Resources map")))?;

        let mut declared = BTreeMap::new();
        for (logical_id, body) in resources {
            let resource_type = body
                .get("Type")
                .and_then(serde_json::Value::as_str)
                .ok_or_else(|| template_error(format!("resource {logical_id} has no Type")))?;

            declared.insert(
                logical_id.clone(),
                TemplateResource {
                    resource_type: resource_type.to_string(),
                    hash: self.hasher.hash_resource(body),
                },
            );
        }

        Ok(declared)
    }

    /// Compares template resources with what a stack currently holds.
    fn plan_resources(
        stack: &Stack,
        current: Option<&StackRecord>,
        template: &BTreeMap<String, TemplateResource>,
    ) -> ResourcePlan {
        let empty = BTreeMap::new();
        let deployed = current.map_or(&empty, |record| &record.resources);
        let inputs_changed = current.is_some_and(|record| record.inputs_hash != stack.inputs_hash);
        let mut plan = ResourcePlan::default();

        for (logical_id, resource) in template {
            match deployed.get(logical_id) {
                None => {
                    plan.changes.push(ResourceChange {
                        action: String::from("Add"),
                        logical_resource_id: logical_id.clone(),
                        physical_resource_id: None,
                        replacement: None,
                        resource_type: resource.resource_type.clone(),
                        scope: vec![],
                        details: Some(json!({ "AfterHash": resource.hash })),
                    });
                    plan.target.insert(
                        logical_id.clone(),
                        ResourceRecord {
                            resource_type: resource.resource_type.clone(),
                            hash: resource.hash.clone(),
                            physical_id: physical_id(stack, logical_id),
                        },
                    );
                }
                Some(existing) => {
                    let type_changed = existing.resource_type != resource.resource_type;
                    let body_changed = existing.hash != resource.hash;

                    if type_changed || body_changed || inputs_changed {
                        let mut scope = Vec::new();
                        if body_changed {
                            scope.push(String::from("Properties"));
                        }
                        if inputs_changed {
                            scope.push(String::from("Parameters"));
                        }
                        plan.changes.push(ResourceChange {
                            action: String::from("Modify"),
                            logical_resource_id: logical_id.clone(),
                            physical_resource_id: Some(existing.physical_id.clone()),
                            replacement: Some(String::from(if type_changed { "True" } else { "Conditional" })),
                            resource_type: resource.resource_type.clone(),
                            scope,
                            details: Some(json!({
                                "BeforeHash": existing.hash,
                                "AfterHash": resource.hash,
                            })),
                        });
                    }

                    let physical_id = if type_changed {
                        physical_id(stack, logical_id)
                    } else {
                        existing.physical_id.clone()
                    };
                    plan.target.insert(
                        logical_id.clone(),
                        ResourceRecord {
                            resource_type: resource.resource_type.clone(),
                            hash: resource.hash.clone(),
                            physical_id,
                        },
                    );
                }
            }
        }

        for (logical_id, existing) in deployed {
            if !template.contains_key(logical_id) {
                plan.changes.push(ResourceChange {
                    action: String::from("Remove"),
                    logical_resource_id: logical_id.clone(),
                    physical_resource_id: Some(existing.physical_id.clone()),
                    replacement: None,
                    resource_type: existing.resource_type.clone(),
                    scope: vec![],
                    details: Some(json!({ "BeforeHash": existing.hash })),
                });
            }
        }

        plan
    }

    /// Creates or updates a stack directly, without a change set.
    async fn deploy(&self, stack: &Stack, create_missing: bool) -> BackendResult<StackStatus> {
        let _guard = self.guard.lock().await;
        let mut state = self.load_state().await?;

        if !create_missing && !state.stacks.contains_key(&stack.name) {
            return Err(BackendError::StackDoesNotExist {
                stack: stack.name.clone(),
            });
        }

        let template = self.read_template(stack).await?;
        let plan = Self::plan_resources(stack, state.stacks.get(&stack.name), &template);

        let status = match state.stacks.get_mut(&stack.name) {
            None => {
                info!("Creating stack {} ({} resources)", stack.name, plan.target.len());
                state.stacks.insert(
                    stack.name.clone(),
                    StackRecord::new(&stack.name, &stack.inputs_hash, plan.target),
                );
                StackStatus::CreateComplete
            }
            Some(_) if plan.changes.is_empty() => {
                debug!("Stack {} is up to date", stack.name);
                return Ok(StackStatus::NoChanges);
            }
            Some(record) => {
                info!("Updating stack {} ({} changes)", stack.name, plan.changes.len());
                record.apply(&stack.inputs_hash, plan.target);
                StackStatus::UpdateComplete
            }
        };

        self.save_state(&mut state).await?;
        Ok(status)
    }
}

/// Generates a backend identifier for a resource.
fn physical_id(stack: &Stack, logical_id: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{logical_id}-{}", stack.name.replace('/', "-"), &suffix[..12])
}

fn change_set_not_found(stack: &Stack, name: &str) -> BackendError {
    BackendError::ChangeSetNotFound {
        stack: stack.name.clone(),
        change_set: name.to_string(),
    }
}

fn stack_missing(stack: &Stack) -> BackendError {
    BackendError::StackDoesNotExist {
        stack: stack.name.clone(),
    }
}

#[async_trait]
impl StackBackend for LocalBackend {
    async fn get_status(&self, stack: &Stack) -> BackendResult<StackStatus> {
        let _guard = self.guard.lock().await;
        let state = self.load_state().await?;
        state
            .stacks
            .get(&stack.name)
            .map(|record| record.status)
            .ok_or_else(|| stack_missing(stack))
    }

    async fn launch(&self, stack: &Stack) -> BackendResult<StackStatus> {
        self.deploy(stack, true).await
    }

    async fn update(&self, stack: &Stack) -> BackendResult<StackStatus> {
        self.deploy(stack, false).await
    }

    async fn create_change_set(&self, stack: &Stack, name: &str) -> BackendResult<()> {
        let _guard = self.guard.lock().await;
        let mut state = self.load_state().await?;

        let current = state.stacks.get(&stack.name).ok_or_else(|| stack_missing(stack))?;
        if current.change_sets.contains_key(name) {
            return Err(BackendError::operation(
                &stack.name,
                "create_change_set",
                format!("change set '{name}' already exists"),
            ));
        }

        let record = match self.read_template(stack).await {
            Ok(template) => {
                let plan = Self::plan_resources(stack, Some(current), &template);
                let (status, status_reason, execution_status) = if plan.changes.is_empty() {
                    (
                        ChangeSetStatus::NoChanges,
                        Some(String::from("The submitted information didn't contain changes.")),
                        EXECUTION_UNAVAILABLE,
                    )
                } else {
                    (ChangeSetStatus::Ready, None, EXECUTION_AVAILABLE)
                };
                ChangeSetRecord {
                    name: name.to_string(),
                    status,
                    status_reason,
                    execution_status: execution_status.to_string(),
                    changes: plan.changes,
                    target_resources: plan.target,
                    inputs_hash: stack.inputs_hash.clone(),
                    created_at: Utc::now(),
                }
            }
            // A broken template yields a FAILED change set, not a failed call
            Err(e) => ChangeSetRecord {
                name: name.to_string(),
                status: ChangeSetStatus::Failed,
                status_reason: Some(e.to_string()),
                execution_status: EXECUTION_UNAVAILABLE.to_string(),
                changes: vec![],
                target_resources: BTreeMap::new(),
                inputs_hash: stack.inputs_hash.clone(),
                created_at: Utc::now(),
            },
        };

        info!("Created change set {name} for {} ({})", stack.name, record.status);
        state
            .stacks
            .get_mut(&stack.name)
            .ok_or_else(|| stack_missing(stack))?
            .change_sets
            .insert(name.to_string(), record);

        self.save_state(&mut state).await
    }

    async fn delete_change_set(&self, stack: &Stack, name: &str) -> BackendResult<()> {
        let _guard = self.guard.lock().await;
        let mut state = self.load_state().await?;

        let record = state
            .stacks
            .get_mut(&stack.name)
            .ok_or_else(|| stack_missing(stack))?;
        if record.change_sets.remove(name).is_none() {
            return Err(change_set_not_found(stack, name));
        }

        debug!("Deleted change set {name} for {}", stack.name);
        self.save_state(&mut state).await
    }

    async fn wait_for_change_set(&self, stack: &Stack, name: &str) -> BackendResult<ChangeSetStatus> {
        // Change sets are computed on creation, so they are always terminal here
        let _guard = self.guard.lock().await;
        let state = self.load_state().await?;

        state
            .stacks
            .get(&stack.name)
            .ok_or_else(|| stack_missing(stack))?
            .change_sets
            .get(name)
            .map(|cs| cs.status)
            .ok_or_else(|| change_set_not_found(stack, name))
    }

    async fn describe_change_set(
        &self,
        stack: &Stack,
        name: &str,
    ) -> BackendResult<ChangeSetDescription> {
        let _guard = self.guard.lock().await;
        let state = self.load_state().await?;

        let record = state
            .stacks
            .get(&stack.name)
            .ok_or_else(|| stack_missing(stack))?
            .change_sets
            .get(name)
            .ok_or_else(|| change_set_not_found(stack, name))?;

        let mut extra = BTreeMap::new();
        extra.insert(String::from("Parameters"), json!(stack.parameters));
        extra.insert(String::from("Tags"), json!(stack.tags));
        extra.insert(String::from("InputsHash"), json!(record.inputs_hash));

        Ok(ChangeSetDescription {
            change_set_name: record.name.clone(),
            stack_name: stack.name.clone(),
            creation_time: record.created_at,
            execution_status: record.execution_status.clone(),
            status: record.status,
            status_reason: record.status_reason.clone(),
            changes: record.changes.clone(),
            extra,
        })
    }

    async fn execute_change_set(&self, stack: &Stack, name: &str) -> BackendResult<StackStatus> {
        let _guard = self.guard.lock().await;
        let mut state = self.load_state().await?;

        let record = state
            .stacks
            .get_mut(&stack.name)
            .ok_or_else(|| stack_missing(stack))?;
        let change_set = record
            .change_sets
            .get_mut(name)
            .ok_or_else(|| change_set_not_found(stack, name))?;

        if change_set.status != ChangeSetStatus::Ready || change_set.execution_status != EXECUTION_AVAILABLE {
            let status = if change_set.execution_status == EXECUTION_COMPLETE {
                EXECUTION_COMPLETE.to_string()
            } else {
                change_set.status.to_string()
            };
            return Err(BackendError::InvalidChangeSetStatus {
                stack: stack.name.clone(),
                change_set: name.to_string(),
                status,
            });
        }

        change_set.execution_status = EXECUTION_COMPLETE.to_string();
        let target = change_set.target_resources.clone();
        let inputs_hash = change_set.inputs_hash.clone();
        record.apply(&inputs_hash, target);

        info!("Executed change set {name} for {}", stack.name);
        self.save_state(&mut state).await?;
        Ok(StackStatus::UpdateComplete)
    }

    fn backend_type(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::test_stack;
    use tempfile::TempDir;

    const VPC_TEMPLATE: &str = r"
Resources:
  Vpc:
    Type: AWS::EC2::VPC
    Properties:
      CidrBlock: 10.0.0.0/16
";

    const VPC_TEMPLATE_V2: &str = r"
Resources:
  Vpc:
    Type: AWS::EC2::VPC
    Properties:
      CidrBlock: 10.1.0.0/16
  Gateway:
    Type: AWS::EC2::InternetGateway
";

    fn create_test_backend() -> (LocalBackend, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let backend = LocalBackend::with_base_dir(temp_dir.path().join(".stackplan"));
        (backend, temp_dir)
    }

    fn stack_with_template(temp: &TempDir, body: &str) -> Stack {
        let path = temp.path().join("vpc.yaml");
        std::fs::write(&path, body).expect("write template");
        let mut stack = test_stack("dev/vpc", &[]);
        stack.template_path = path;
        stack
    }

    #[tokio::test]
    async fn test_launch_creates_then_reports_no_changes() {
        let (backend, temp) = create_test_backend();
        let stack = stack_with_template(&temp, VPC_TEMPLATE);

        assert_eq!(backend.launch(&stack).await.expect("launch"), StackStatus::CreateComplete);
        assert_eq!(backend.launch(&stack).await.expect("relaunch"), StackStatus::NoChanges);
        assert_eq!(
            backend.get_status(&stack).await.expect("status"),
            StackStatus::CreateComplete
        );
        assert!(backend.state_path().exists());
    }

    #[tokio::test]
    async fn test_update_requires_existing_stack() {
        let (backend, temp) = create_test_backend();
        let stack = stack_with_template(&temp, VPC_TEMPLATE);

        let result = backend.update(&stack).await;
        assert!(matches!(result, Err(BackendError::StackDoesNotExist { .. })));
        assert!(matches!(
            backend.get_status(&stack).await,
            Err(BackendError::StackDoesNotExist { .. })
        ));
    }

    #[tokio::test]
    async fn test_change_set_lifecycle() {
        let (backend, temp) = create_test_backend();
        let stack = stack_with_template(&temp, VPC_TEMPLATE);
        backend.launch(&stack).await.expect("launch");

        std::fs::write(&stack.template_path, VPC_TEMPLATE_V2).expect("write template");
        backend.create_change_set(&stack, "cs-1").await.expect("create");

        assert_eq!(
            backend.wait_for_change_set(&stack, "cs-1").await.expect("wait"),
            ChangeSetStatus::Ready
        );

        let description = backend.describe_change_set(&stack, "cs-1").await.expect("describe");
        let actions: Vec<(&str, &str)> = description
            .changes
            .iter()
            .map(|c| (c.action.as_str(), c.logical_resource_id.as_str()))
            .collect();
        assert_eq!(actions, vec![("Add", "Gateway"), ("Modify", "Vpc")]);

        assert_eq!(
            backend.execute_change_set(&stack, "cs-1").await.expect("execute"),
            StackStatus::UpdateComplete
        );
        assert!(matches!(
            backend.execute_change_set(&stack, "cs-1").await,
            Err(BackendError::InvalidChangeSetStatus { ref status, .. }) if status == "EXECUTE_COMPLETE"
        ));

        backend.delete_change_set(&stack, "cs-1").await.expect("delete");
        assert!(matches!(
            backend.delete_change_set(&stack, "cs-1").await,
            Err(BackendError::ChangeSetNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_unchanged_template_gives_no_changes_change_set() {
        let (backend, temp) = create_test_backend();
        let stack = stack_with_template(&temp, VPC_TEMPLATE);
        backend.launch(&stack).await.expect("launch");

        backend.create_change_set(&stack, "cs-1").await.expect("create");
        assert_eq!(
            backend.wait_for_change_set(&stack, "cs-1").await.expect("wait"),
            ChangeSetStatus::NoChanges
        );
        assert!(matches!(
            backend.execute_change_set(&stack, "cs-1").await,
            Err(BackendError::InvalidChangeSetStatus { ref status, .. }) if status == "NO_CHANGES"
        ));
    }

    #[tokio::test]
    async fn test_broken_template_gives_failed_change_set() {
        let (backend, temp) = create_test_backend();
        let stack = stack_with_template(&temp, VPC_TEMPLATE);
        backend.launch(&stack).await.expect("launch");

        std::fs::write(&stack.template_path, "Outputs: {}\n").expect("write template");
        backend.create_change_set(&stack, "cs-1").await.expect("create");

        let description = backend.describe_change_set(&stack, "cs-1").await.expect("describe");
        assert_eq!(description.status, ChangeSetStatus::Failed);
        assert!(description.status_reason.is_some());
    }

    #[tokio::test]
    async fn test_parameter_change_modifies_resources() {
        let (backend, temp) = create_test_backend();
        let mut stack = stack_with_template(&temp, VPC_TEMPLATE);
        stack.inputs_hash = String::from("inputs-v1");
        backend.launch(&stack).await.expect("launch");

        stack.inputs_hash = String::from("inputs-v2");
        assert_eq!(backend.launch(&stack).await.expect("relaunch"), StackStatus::UpdateComplete);
    }
}
