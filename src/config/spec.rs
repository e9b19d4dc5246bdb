//! Configuration specification types for the deployment system.
//!
//! This module defines the structs that map to the `stackplan.yaml` file.
//! A project declares its stacks and the dependencies between them; stack
//! groups are implied by the path-like stack names.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// The root configuration structure for a stackplan project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectConfig {
    /// Project-level settings.
    pub project: ProjectSettings,
    /// Local backend state configuration.
    #[serde(default)]
    pub state: StateConfig,
    /// Orchestration settings.
    #[serde(default)]
    pub settings: RunSettings,
    /// Stacks managed by this project.
    #[serde(default)]
    pub stacks: Vec<StackConfig>,
    /// Directory the configuration was loaded from.
    ///
    /// Relative template and state paths are resolved against it.
    #[serde(skip)]
    pub root_dir: PathBuf,
}

/// Project-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectSettings {
    /// Unique name for the project.
    pub name: String,
}

/// Local backend state configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct StateConfig {
    /// Directory holding the backend state file.
    #[serde(default)]
    pub path: Option<String>,
}

/// Orchestration settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct RunSettings {
    /// Upper bound on waiting for a change set to settle, in seconds.
    #[serde(default)]
    pub change_set_timeout_secs: Option<u64>,
}

/// Configuration for a single stack.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StackConfig {
    /// Path-like stack name, e.g. `dev/vpc`.
    pub name: String,
    /// Template file, relative to the project root.
    pub template: String,
    /// Names of the stacks this stack depends on.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Template parameters.
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
    /// Stack tags.
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

/// Default state directory name.
pub const DEFAULT_STATE_DIR: &str = ".stackplan";

impl ProjectConfig {
    /// Returns the directory holding the local backend state.
    #[must_use]
    pub fn state_dir(&self) -> PathBuf {
        self.state
            .path
            .as_ref()
            .map_or_else(|| self.root_dir.join(DEFAULT_STATE_DIR), |p| self.resolve_path(p))
    }

    /// Resolves a project-relative path.
    #[must_use]
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root_dir.join(path)
        }
    }

    /// Returns the number of distinct top-level stack groups.
    #[must_use]
    pub fn group_count(&self) -> usize {
        let mut groups: Vec<&str> = self
            .stacks
            .iter()
            .filter_map(|s| s.name.split_once('/').map(|(group, _)| group))
            .collect();
        groups.sort_unstable();
        groups.dedup();
        groups.len()
    }
}
