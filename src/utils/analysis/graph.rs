use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// File-level import graph. An edge `a -> b` means `a` imports `b`.
///
/// Ordered collections keep iteration, and everything derived from it,
/// identical across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyGraph {
    nodes: BTreeSet<String>,
    edges: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, path: impl Into<String>) {
        self.nodes.insert(path.into());
    }

    /// Adds `from -> to` when both ends are nodes and differ.
    /// Returns whether a new edge was recorded.
    pub fn add_edge(&mut self, from: &str, to: &str) -> bool {
        if from == to || !self.nodes.contains(from) || !self.nodes.contains(to) {
            return false;
        }
        self.edges
            .entry(from.to_string())
            .or_default()
            .insert(to.to_string())
    }

    pub fn nodes(&self) -> &BTreeSet<String> {
        &self.nodes
    }

    pub fn edges(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.edges
    }

    pub fn has_node(&self, path: &str) -> bool {
        self.nodes.contains(path)
    }

    /// Files imported by `path`.
    pub fn dependencies(&self, path: &str) -> Vec<&str> {
        self.edges
            .get(path)
            .map(|targets| targets.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Files importing `path`.
    pub fn dependents(&self, path: &str) -> Vec<&str> {
        self.edges
            .iter()
            .filter(|(_, targets)| targets.contains(path))
            .map(|(from, _)| from.as_str())
            .collect()
    }

    pub fn out_degree(&self, path: &str) -> usize {
        self.edges.get(path).map_or(0, BTreeSet::len)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
