//! Dependency resolution into ordered batches.
//!
//! A target resolves to a sequence of batches: every stack in a batch
//! depends only on stacks in earlier batches, so a whole batch can be acted
//! on concurrently once its predecessors have finished.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::error::ResolveError;
use crate::stack::{Stack, StackGraph};

/// A set of stacks with no dependency among them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    stacks: Vec<Arc<Stack>>,
}

impl Batch {
    /// Creates a batch, ordering members by name.
    #[must_use]
    pub fn new(mut stacks: Vec<Arc<Stack>>) -> Self {
        stacks.sort_by(|a, b| a.name.cmp(&b.name));
        Self { stacks }
    }

    /// Returns the stacks in this batch.
    #[must_use]
    pub fn stacks(&self) -> &[Arc<Stack>] {
        &self.stacks
    }

    /// Returns the stack names in this batch.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.stacks.iter().map(|s| s.name.clone()).collect()
    }

    /// Returns true if the batch holds the named stack.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.stacks.iter().any(|s| s.name == name)
    }

    /// Returns the number of stacks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stacks.len()
    }

    /// Returns true if the batch is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }

    /// Iterates the stacks in this batch.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Stack>> {
        self.stacks.iter()
    }
}

/// Resolves a target into an ordered sequence of batches.
///
/// Layering runs over the target and everything it transitively depends
/// on, then keeps only target members. Dependencies outside the target are
/// not acted on but still order the members that need them.
///
/// # Errors
///
/// Returns [`ResolveError::UnknownTarget`] if the path matches nothing, or
/// [`ResolveError::CyclicDependency`] if a cycle is reachable from it.
pub fn resolve(graph: &StackGraph, target: &str) -> Result<Vec<Batch>, ResolveError> {
    let members = graph.select(target)?;
    let member_names: BTreeSet<String> = members.iter().map(|s| s.name.clone()).collect();

    // Collect the transitive dependency closure
    let mut closure: BTreeMap<String, Arc<Stack>> = BTreeMap::new();
    let mut pending = members;
    while let Some(stack) = pending.pop() {
        if closure.contains_key(&stack.name) {
            continue;
        }
        for dependency in &stack.dependencies {
            if let Some(dep) = graph.get(dependency) {
                pending.push(Arc::clone(dep));
            }
        }
        closure.insert(stack.name.clone(), stack);
    }

    let layers = layer(&closure)?;

    Ok(layers
        .into_iter()
        .map(|names| {
            names
                .into_iter()
                .filter(|name| member_names.contains(name))
                .filter_map(|name| closure.get(&name).cloned())
                .collect::<Vec<_>>()
        })
        .filter(|stacks| !stacks.is_empty())
        .map(Batch::new)
        .collect())
}

/// Kahn-style layering: each layer holds every stack whose dependencies
/// are all placed in earlier layers.
fn layer(stacks: &BTreeMap<String, Arc<Stack>>) -> Result<Vec<Vec<String>>, ResolveError> {
    let mut in_degree: BTreeMap<&str, usize> = BTreeMap::new();
    let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

    for (name, stack) in stacks {
        let deps: BTreeSet<&str> = stack
            .dependencies
            .iter()
            .map(String::as_str)
            .filter(|d| stacks.contains_key(*d))
            .collect();
        in_degree.insert(name.as_str(), deps.len());
        for dep in deps {
            dependents.entry(dep).or_default().push(name.as_str());
        }
    }

    let mut layers = Vec::new();
    loop {
        let ready: Vec<&str> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(name, _)| *name)
            .collect();

        if ready.is_empty() {
            break;
        }

        for name in &ready {
            in_degree.remove(name);
            for dependent in dependents.get(name).into_iter().flatten() {
                if let Some(degree) = in_degree.get_mut(dependent) {
                    *degree -= 1;
                }
            }
        }

        layers.push(ready.into_iter().map(String::from).collect());
    }

    // Anything left could not be placed
    if !in_degree.is_empty() {
        return Err(ResolveError::CyclicDependency {
            stacks: in_degree.keys().map(|s| (*s).to_string()).collect(),
        });
    }

    Ok(layers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::test_graph;

    fn batch_names(batches: &[Batch]) -> Vec<Vec<String>> {
        batches.iter().map(Batch::names).collect()
    }

    /// Checks that every stack appears once and after all its dependencies.
    fn assert_valid_partition(graph: &StackGraph, batches: &[Batch]) {
        let mut position = BTreeMap::new();
        for (index, batch) in batches.iter().enumerate() {
            assert!(!batch.is_empty());
            for stack in batch.iter() {
                assert!(
                    position.insert(stack.name.clone(), index).is_none(),
                    "{} placed twice",
                    stack.name
                );
            }
        }
        for (name, index) in &position {
            let stack = graph.get(name).expect("placed stack exists");
            for dep in &stack.dependencies {
                if let Some(dep_index) = position.get(dep) {
                    assert!(dep_index < index, "{dep} must precede {name}");
                }
            }
        }
    }

    #[test]
    fn test_independent_stacks_share_a_batch() {
        let g = test_graph(&[("dev/a", &[]), ("dev/b", &[]), ("dev/c", &[])]);
        let batches = resolve(&g, "dev").expect("resolves");
        assert_eq!(batch_names(&batches), vec![vec!["dev/a", "dev/b", "dev/c"]]);
    }

    #[test]
    fn test_chain_orders_batches() {
        let g = test_graph(&[("dev/b", &["dev/a"]), ("dev/a", &[])]);
        let batches = resolve(&g, "dev").expect("resolves");
        assert_eq!(batch_names(&batches), vec![vec!["dev/a"], vec!["dev/b"]]);
    }

    #[test]
    fn test_diamond_is_a_valid_partition() {
        let g = test_graph(&[
            ("net/vpc", &[]),
            ("net/dns", &[]),
            ("app/db", &["net/vpc"]),
            ("app/cache", &["net/vpc"]),
            ("app/web", &["app/db", "app/cache", "net/dns"]),
            ("app/cdn", &["app/web", "net/dns", "net/dns"]),
        ]);
        let batches = resolve(&g, ".").expect("resolves");
        assert_valid_partition(&g, &batches);
        assert_eq!(batches.iter().map(Batch::len).sum::<usize>(), 6);
        assert_eq!(
            batch_names(&batches),
            vec![
                vec!["net/dns", "net/vpc"],
                vec!["app/cache", "app/db"],
                vec!["app/web"],
                vec!["app/cdn"],
            ]
        );
    }

    #[test]
    fn test_out_of_target_dependencies_order_members() {
        let g = test_graph(&[
            ("shared/vpc", &[]),
            ("dev/app", &["shared/db"]),
            ("shared/db", &["shared/vpc"]),
            ("dev/worker", &[]),
        ]);
        let batches = resolve(&g, "dev").expect("resolves");
        assert_eq!(batch_names(&batches), vec![vec!["dev/worker"], vec!["dev/app"]]);
    }

    #[test]
    fn test_cycle_is_reported() {
        let g = test_graph(&[("dev/a", &["dev/b"]), ("dev/b", &["dev/a"]), ("dev/c", &[])]);
        assert_eq!(
            resolve(&g, "dev"),
            Err(ResolveError::CyclicDependency {
                stacks: vec![String::from("dev/a"), String::from("dev/b")],
            })
        );
    }

    #[test]
    fn test_cycle_outside_target_closure_is_ignored() {
        let g = test_graph(&[("dev/a", &["dev/b"]), ("dev/b", &["dev/a"]), ("prod/c", &[])]);
        let batches = resolve(&g, "prod").expect("resolves");
        assert_eq!(batch_names(&batches), vec![vec!["prod/c"]]);
    }

    #[test]
    fn test_demo_project_resolves() {
        let config = crate::config::ConfigParser::new()
            .with_base_path("demos")
            .parse_yaml(include_str!("../../demos/stackplan.yaml"), None)
            .expect("demo config parses");
        let g = StackGraph::from_config(&config).expect("demo graph builds");

        let batches = resolve(&g, "dev").expect("resolves");
        assert_valid_partition(&g, &batches);
        assert_eq!(
            batch_names(&batches),
            vec![
                vec!["dev/network/dns", "dev/network/vpc"],
                vec!["dev/app/db"],
                vec!["dev/app/web"],
            ]
        );

        let app = resolve(&g, "dev/app").expect("resolves");
        assert_eq!(batch_names(&app), vec![vec!["dev/app/db"], vec!["dev/app/web"]]);
    }

    #[test]
    fn test_unknown_target() {
        let g = test_graph(&[("dev/a", &[])]);
        assert!(matches!(resolve(&g, "staging"), Err(ResolveError::UnknownTarget { .. })));
    }
}
