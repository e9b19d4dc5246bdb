//! Registry of configured stacks and their declared dependencies.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::{ConfigHasher, ProjectConfig};
use crate::error::{ConfigError, ResolveError};

use super::types::Stack;

/// Path that targets every stack in the project.
pub const PROJECT_TARGET: &str = ".";

/// All configured stacks, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct StackGraph {
    stacks: BTreeMap<String, Arc<Stack>>,
}

impl StackGraph {
    /// Builds the graph from a project configuration.
    ///
    /// # Errors
    ///
    /// Returns an error on duplicate names or dependencies on unknown stacks.
    pub fn from_config(config: &ProjectConfig) -> Result<Self, ConfigError> {
        let hasher = ConfigHasher::new();
        let mut stacks = BTreeMap::new();

        for stack_config in &config.stacks {
            let stack = Stack::from_config(stack_config, config, hasher.hash_stack_inputs(stack_config));
            if stacks.insert(stack.name.clone(), Arc::new(stack)).is_some() {
                return Err(ConfigError::DuplicateStack {
                    name: stack_config.name.clone(),
                });
            }
        }

        let graph = Self { stacks };
        graph.check_references()?;
        Ok(graph)
    }

    /// Builds the graph from already constructed stacks.
    ///
    /// # Errors
    ///
    /// Returns an error on duplicate names or dependencies on unknown stacks.
    pub fn from_stacks(stacks: impl IntoIterator<Item = Stack>) -> Result<Self, ConfigError> {
        let mut map = BTreeMap::new();
        for stack in stacks {
            let name = stack.name.clone();
            if map.insert(name.clone(), Arc::new(stack)).is_some() {
                return Err(ConfigError::DuplicateStack { name });
            }
        }
        let graph = Self { stacks: map };
        graph.check_references()?;
        Ok(graph)
    }

    fn check_references(&self) -> Result<(), ConfigError> {
        for stack in self.stacks.values() {
            if let Some(missing) = stack
                .dependencies
                .iter()
                .find(|d| !self.stacks.contains_key(d.as_str()))
            {
                return Err(ConfigError::UnknownDependency {
                    stack: stack.name.clone(),
                    dependency: missing.clone(),
                });
            }
        }
        Ok(())
    }

    /// Looks up a stack by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<Stack>> {
        self.stacks.get(name)
    }

    /// Returns the number of stacks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stacks.len()
    }

    /// Returns true if no stacks are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }

    /// Iterates stacks in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Stack>> {
        self.stacks.values()
    }

    /// Selects the stacks a target path names.
    ///
    /// An exact stack name selects that stack; otherwise every stack under
    /// the path as a group is selected. `.` selects the whole project.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::UnknownTarget`] if nothing matches.
    pub fn select(&self, target: &str) -> Result<Vec<Arc<Stack>>, ResolveError> {
        let path = target.trim().trim_end_matches('/');

        if path == PROJECT_TARGET {
            if self.stacks.is_empty() {
                return Err(ResolveError::UnknownTarget {
                    path: target.to_string(),
                });
            }
            return Ok(self.stacks.values().cloned().collect());
        }

        if let Some(stack) = self.stacks.get(path) {
            return Ok(vec![Arc::clone(stack)]);
        }

        let members: Vec<Arc<Stack>> = self
            .stacks
            .values()
            .filter(|s| s.in_group(path))
            .cloned()
            .collect();

        if members.is_empty() {
            return Err(ResolveError::UnknownTarget {
                path: target.to_string(),
            });
        }
        Ok(members)
    }
}
