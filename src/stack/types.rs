//! Stack and change-set types shared by the planner and the backends.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::config::{ProjectConfig, StackConfig};

/// A unit of infrastructure configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stack {
    /// Path-like stack name; the stack's identity.
    pub name: String,
    /// Absolute path of the template.
    pub template_path: PathBuf,
    /// Names of the stacks this stack depends on.
    pub dependencies: Vec<String>,
    /// Template parameters.
    pub parameters: BTreeMap<String, String>,
    /// Stack tags.
    pub tags: BTreeMap<String, String>,
    /// Fingerprint of parameters and tags.
    pub inputs_hash: String,
}

/// Status reported by a backend for a stack operation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StackStatus {
    /// The stack was created.
    CreateComplete,
    /// The stack was updated.
    UpdateComplete,
    /// The operation found nothing to change.
    NoChanges,
    /// The operation has not settled yet.
    InProgress,
    /// The operation failed.
    Failed,
}

/// Terminal status of a change set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeSetStatus {
    /// The change set holds changes and can be executed.
    Ready,
    /// The change set holds no changes.
    NoChanges,
    /// The change set could not be created.
    Failed,
}

/// Structured description of a change set.
///
/// Properties under `extra` and each change's `details` are verbose-only;
/// simplified output drops them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ChangeSetDescription {
    /// Name of the change set.
    pub change_set_name: String,
    /// Name of the stack.
    pub stack_name: String,
    /// When the change set was created.
    pub creation_time: DateTime<Utc>,
    /// Execution status (e.g. `AVAILABLE`, `EXECUTE_COMPLETE`).
    pub execution_status: String,
    /// Change-set status.
    pub status: ChangeSetStatus,
    /// Reason attached to the status, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_reason: Option<String>,
    /// Proposed resource changes.
    #[serde(default)]
    pub changes: Vec<ResourceChange>,
    /// Verbose-only properties.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// A single proposed resource change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ResourceChange {
    /// `Add`, `Modify` or `Remove`.
    pub action: String,
    /// Logical identifier inside the template.
    pub logical_resource_id: String,
    /// Physical identifier, once the resource exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical_resource_id: Option<String>,
    /// Whether the change replaces the resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement: Option<String>,
    /// Resource type.
    pub resource_type: String,
    /// Parts of the resource affected.
    #[serde(default)]
    pub scope: Vec<String>,
    /// Verbose-only change details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl Stack {
    /// Builds a stack from its configuration entry.
    #[must_use]
    pub fn from_config(config: &StackConfig, project: &ProjectConfig, inputs_hash: String) -> Self {
        Self {
            name: config.name.clone(),
            template_path: project.resolve_path(&config.template),
            dependencies: config.dependencies.clone(),
            parameters: config.parameters.clone(),
            tags: config.tags.clone(),
            inputs_hash,
        }
    }

    /// Returns true if the stack lives under the given group path.
    #[must_use]
    pub fn in_group(&self, group: &str) -> bool {
        self.name
            .strip_prefix(group)
            .is_some_and(|rest| rest.starts_with('/'))
    }
}

impl StackStatus {
    /// Returns true for statuses that count as a successful outcome.
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::CreateComplete | Self::UpdateComplete | Self::NoChanges)
    }
}

impl ChangeSetDescription {
    /// Returns a copy without verbose-only properties.
    #[must_use]
    pub fn simplified(&self) -> Self {
        Self {
            extra: BTreeMap::new(),
            changes: self
                .changes
                .iter()
                .map(|change| ResourceChange {
                    details: None,
                    ..change.clone()
                })
                .collect(),
            ..self.clone()
        }
    }
}

impl std::fmt::Display for StackStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::CreateComplete => "CREATE_COMPLETE",
            Self::UpdateComplete => "UPDATE_COMPLETE",
            Self::NoChanges => "NO_CHANGES",
            Self::InProgress => "IN_PROGRESS",
            Self::Failed => "FAILED",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for ChangeSetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Ready => "READY",
            Self::NoChanges => "NO_CHANGES",
            Self::Failed => "FAILED",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn description() -> ChangeSetDescription {
        let mut extra = BTreeMap::new();
        extra.insert(String::from("Parameters"), json!({"CidrBlock": "10.0.0.0/16"}));
        ChangeSetDescription {
            change_set_name: String::from("change-set-1"),
            stack_name: String::from("dev/vpc"),
            creation_time: Utc::now(),
            execution_status: String::from("AVAILABLE"),
            status: ChangeSetStatus::Ready,
            status_reason: None,
            changes: vec![ResourceChange {
                action: String::from("Modify"),
                logical_resource_id: String::from("Vpc"),
                physical_resource_id: Some(String::from("vpc-1234")),
                replacement: Some(String::from("False")),
                resource_type: String::from("AWS::EC2::VPC"),
                scope: vec![String::from("Properties")],
                details: Some(json!([{"Target": {"Name": "CidrBlock"}}])),
            }],
            extra,
        }
    }

    #[test]
    fn test_success_statuses() {
        assert!(StackStatus::CreateComplete.is_success());
        assert!(StackStatus::UpdateComplete.is_success());
        assert!(StackStatus::NoChanges.is_success());
        assert!(!StackStatus::InProgress.is_success());
        assert!(!StackStatus::Failed.is_success());
    }

    #[test]
    fn test_simplified_drops_verbose_properties() {
        let full = description();
        let simple = full.simplified();

        assert!(simple.extra.is_empty());
        assert!(simple.changes[0].details.is_none());
        assert_eq!(simple.changes[0].logical_resource_id, "Vpc");
        assert_eq!(simple.status, ChangeSetStatus::Ready);
    }

    #[test]
    fn test_description_serializes_pascal_case() {
        let value = serde_json::to_value(description()).expect("serializes");
        assert_eq!(value["StackName"], "dev/vpc");
        assert_eq!(value["Status"], "READY");
        assert_eq!(value["Changes"][0]["ResourceType"], "AWS::EC2::VPC");
        assert_eq!(value["Parameters"]["CidrBlock"], "10.0.0.0/16");
    }

    #[test]
    fn test_group_membership() {
        let stack = Stack {
            name: String::from("dev/app/web"),
            template_path: PathBuf::from("/t.yaml"),
            dependencies: vec![],
            parameters: BTreeMap::new(),
            tags: BTreeMap::new(),
            inputs_hash: String::new(),
        };
        assert!(stack.in_group("dev"));
        assert!(stack.in_group("dev/app"));
        assert!(!stack.in_group("de"));
        assert!(!stack.in_group("dev/app/web"));
    }
}
