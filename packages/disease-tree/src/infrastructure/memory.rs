//! In-memory hierarchy and label source
//!
//! Serves both source ports from plain maps. Child order is insertion order.

use std::collections::{HashMap, HashSet};

use crate::config::DEFAULT_CANONICAL_PREFIX;
use crate::domain::{HierarchyNode, HierarchySource, LabelSource};
use crate::error::{IndexError, Result};

#[derive(Debug, Clone)]
pub struct MemoryHierarchy {
    nodes: HashMap<String, HierarchyNode>,
    children: HashMap<String, Vec<String>>,
    /// `(label, linked identifier)` rows
    assignments: Vec<(String, Option<String>)>,
    canonical_prefix: String,
}

impl Default for MemoryHierarchy {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHierarchy {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            children: HashMap::new(),
            assignments: Vec::new(),
            canonical_prefix: DEFAULT_CANONICAL_PREFIX.to_string(),
        }
    }

    pub fn with_canonical_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.canonical_prefix = prefix.into();
        self
    }

    pub fn add_node(&mut self, node: HierarchyNode) {
        self.nodes.insert(node.id.clone(), node);
    }

    pub fn add_edge(&mut self, parent: impl Into<String>, child: impl Into<String>) {
        self.children
            .entry(parent.into())
            .or_default()
            .push(child.into());
    }

    pub fn add_assignment(&mut self, label: impl Into<String>, linked_id: Option<&str>) {
        self.assignments
            .push((label.into(), linked_id.map(str::to_string)));
    }

    pub fn node(mut self, id: &str, name: &str) -> Self {
        self.add_node(HierarchyNode::new(id, name));
        self
    }

    pub fn node_with_definition(mut self, id: &str, name: &str, definition: &str) -> Self {
        self.add_node(HierarchyNode::new(id, name).with_definition(definition));
        self
    }

    pub fn edge(mut self, parent: &str, child: &str) -> Self {
        self.add_edge(parent, child);
        self
    }

    pub fn assignment(mut self, label: &str, linked_id: Option<&str>) -> Self {
        self.add_assignment(label, linked_id);
        self
    }

    fn is_canonical_id(&self, id: &str) -> bool {
        id.get(..self.canonical_prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(&self.canonical_prefix))
    }
}

impl HierarchySource for MemoryHierarchy {
    fn node_details(&self, id: &str) -> Result<(String, Option<String>)> {
        self.nodes
            .get(id)
            .map(|node| (node.name.clone(), node.definition.clone()))
            .ok_or_else(|| IndexError::not_found(id))
    }

    fn children(&self, id: &str) -> Result<Vec<String>> {
        Ok(self.children.get(id).cloned().unwrap_or_default())
    }
}

impl LabelSource for MemoryHierarchy {
    fn distinct_labels(&self) -> Result<Vec<String>> {
        let labels: HashSet<&String> = self.assignments.iter().map(|(label, _)| label).collect();
        Ok(labels.into_iter().cloned().collect())
    }

    fn is_canonically_linked(&self, label: &str) -> Result<bool> {
        Ok(self.assignments.iter().any(|(l, linked)| {
            l == label && linked.as_deref().is_some_and(|id| self.is_canonical_id(id))
        }))
    }
}
