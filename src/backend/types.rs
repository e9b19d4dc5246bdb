//! Persisted record types for the local backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::stack::{ChangeSetStatus, ResourceChange, StackStatus};

/// Current local state format version.
pub const STATE_VERSION: &str = "1";

/// Everything the local backend knows about deployed stacks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendState {
    /// State format version.
    pub version: String,
    /// When the state was last written.
    pub updated_at: DateTime<Utc>,
    /// Deployed stacks by name.
    #[serde(default)]
    pub stacks: BTreeMap<String, StackRecord>,
}

/// A deployed stack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackRecord {
    /// Stack name.
    pub name: String,
    /// Status of the last operation.
    pub status: StackStatus,
    /// Fingerprint of parameters and tags at last deployment.
    pub inputs_hash: String,
    /// Deployed resources.
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceRecord>,
    /// Pending change sets by name.
    #[serde(default)]
    pub change_sets: BTreeMap<String, ChangeSetRecord>,
    /// When the stack was created.
    pub created_at: DateTime<Utc>,
    /// When the stack was last changed.
    pub updated_at: DateTime<Utc>,
}

/// A deployed or proposed resource.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceRecord {
    /// Resource type from the template.
    pub resource_type: String,
    /// Fingerprint of the resource body.
    pub hash: String,
    /// Backend-assigned identifier.
    pub physical_id: String,
}

/// A change set held by the local backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeSetRecord {
    /// Change-set name.
    pub name: String,
    /// Terminal status.
    pub status: ChangeSetStatus,
    /// Reason attached to the status.
    #[serde(default)]
    pub status_reason: Option<String>,
    /// Execution status.
    pub execution_status: String,
    /// Proposed changes.
    #[serde(default)]
    pub changes: Vec<ResourceChange>,
    /// Resources the stack will hold after execution.
    #[serde(default)]
    pub target_resources: BTreeMap<String, ResourceRecord>,
    /// Inputs fingerprint the change set was computed for.
    pub inputs_hash: String,
    /// When the change set was created.
    pub created_at: DateTime<Utc>,
}

impl BackendState {
    /// Creates an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            version: STATE_VERSION.to_string(),
            updated_at: Utc::now(),
            stacks: BTreeMap::new(),
        }
    }
}

impl Default for BackendState {
    fn default() -> Self {
        Self::new()
    }
}

impl StackRecord {
    /// Creates a record for a freshly created stack.
    #[must_use]
    pub fn new(name: &str, inputs_hash: &str, resources: BTreeMap<String, ResourceRecord>) -> Self {
        let now = Utc::now();
        Self {
            name: name.to_string(),
            status: StackStatus::CreateComplete,
            inputs_hash: inputs_hash.to_string(),
            resources,
            change_sets: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Replaces deployed resources and marks the stack updated.
    pub fn apply(&mut self, inputs_hash: &str, resources: BTreeMap<String, ResourceRecord>) {
        self.inputs_hash = inputs_hash.to_string();
        self.resources = resources;
        self.status = StackStatus::UpdateComplete;
        self.updated_at = Utc::now();
    }
}
