//! Dependency tracking between struct schemas.

use super::types::KNOWN_TYPE_NAMES;
use crate::error::{Result, WpilogError};
use std::collections::{HashMap, HashSet};

/// Maps each known type name to the names it directly depends on.
///
/// Built-in scalar names are pre-seeded with no dependencies so they never
/// block decodability.
#[derive(Debug, Clone)]
pub struct StructDependencyGraph {
    dependencies: HashMap<String, HashSet<String>>,
}

impl StructDependencyGraph {
    pub fn new() -> Self {
        Self {
            dependencies: KNOWN_TYPE_NAMES
                .iter()
                .map(|name| (name.to_string(), HashSet::new()))
                .collect(),
        }
    }

    /// Merges `dependencies` into `name`'s dependency set, creating it if needed.
    ///
    /// Fails with [`WpilogError::DependencyCycle`] if the merged edges close a
    /// cycle; the graph is left as it was before the call.
    pub fn register_schema<I, S>(&mut self, name: &str, dependencies: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let previous = self.dependencies.get(name).cloned();
        self.dependencies
            .entry(name.to_string())
            .or_default()
            .extend(dependencies.into_iter().map(Into::into));

        if self.has_cycle_from(name) {
            match previous {
                Some(set) => self.dependencies.insert(name.to_string(), set),
                None => self.dependencies.remove(name),
            };
            return Err(WpilogError::DependencyCycle(name.to_string()));
        }

        Ok(())
    }

    /// Returns true if `name` has been registered (or is a built-in).
    pub fn contains(&self, name: &str) -> bool {
        self.dependencies.contains_key(name)
    }

    /// The transitive closure of `name`'s dependencies, including `name` itself.
    pub fn get_dependencies(&self, name: &str) -> HashSet<String> {
        let mut result = HashSet::new();
        let mut stack = vec![name];

        while let Some(current) = stack.pop() {
            if !result.insert(current.to_string()) {
                continue;
            }
            if let Some(deps) = self.dependencies.get(current) {
                stack.extend(deps.iter().map(String::as_str));
            }
        }

        result
    }

    /// Returns true once every name in `name`'s closure has been registered.
    pub fn is_decodable(&self, name: &str) -> bool {
        self.get_dependencies(name)
            .iter()
            .all(|dep| self.dependencies.contains_key(dep))
    }

    /// Every registered name whose closure has no dangling references.
    pub fn get_decodable_structs(&self) -> Vec<&str> {
        self.dependencies
            .keys()
            .map(String::as_str)
            .filter(|name| self.is_decodable(name))
            .collect()
    }

    /// Depth-first search from `start` with an explicit stack, so long chains
    /// of nested structs cannot exhaust the call stack.
    fn has_cycle_from(&self, start: &str) -> bool {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            InProgress,
            Done,
        }

        let mut marks: HashMap<&str, Mark> = HashMap::new();
        // (node, whether its children have been pushed)
        let mut stack: Vec<(&str, bool)> = vec![(start, false)];

        while let Some((node, expanded)) = stack.pop() {
            if expanded {
                marks.insert(node, Mark::Done);
                continue;
            }
            match marks.get(node) {
                Some(Mark::Done) => continue,
                Some(Mark::InProgress) => continue,
                None => {}
            }

            marks.insert(node, Mark::InProgress);
            stack.push((node, true));

            if let Some(deps) = self.dependencies.get(node) {
                for dep in deps {
                    match marks.get(dep.as_str()) {
                        Some(Mark::InProgress) => return true,
                        Some(Mark::Done) => {}
                        None => stack.push((dep.as_str(), false)),
                    }
                }
            }
        }

        false
    }
}

impl Default for StructDependencyGraph {
    fn default() -> Self {
        Self::new()
    }
}
