// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Spatial hierarchy snapshot
//!
//! A detached tree of ids and names built by walking decomposition and
//! containment relations. It holds no references into the file it came from.

use crate::EntityId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Node in the spatial hierarchy tree
///
/// The tree typically follows: Project → Site → Building → Storey → Elements
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpatialNode {
    /// Entity ID
    pub id: EntityId,
    /// Display name, empty when the entity carries none
    pub name: String,
    /// Concrete type name (e.g., "IfcWall")
    pub entity_type: String,
    /// Child nodes
    pub children: Vec<SpatialNode>,
}

impl SpatialNode {
    /// Create a new spatial node
    pub fn new(id: EntityId, name: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            entity_type: entity_type.into(),
            children: Vec::new(),
        }
    }

    /// Add a child node
    pub fn add_child(&mut self, child: SpatialNode) {
        self.children.push(child);
    }

    /// Number of nodes in this subtree, including self
    pub fn len(&self) -> usize {
        1 + self.children.iter().map(SpatialNode::len).sum::<usize>()
    }

    /// Always false, a node counts itself
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Find a node by ID (recursive)
    pub fn find(&self, id: EntityId) -> Option<&SpatialNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }

    /// Iterate all nodes (depth-first, pre-order)
    pub fn iter(&self) -> SpatialNodeIter<'_> {
        SpatialNodeIter { stack: vec![(0, self)] }
    }
}

/// Iterator over spatial nodes (depth-first), yielding `(depth, node)`
pub struct SpatialNodeIter<'a> {
    stack: Vec<(usize, &'a SpatialNode)>,
}

impl<'a> Iterator for SpatialNodeIter<'a> {
    type Item = (usize, &'a SpatialNode);

    fn next(&mut self) -> Option<Self::Item> {
        let (depth, node) = self.stack.pop()?;
        // Reverse so the first child comes out first
        for child in node.children.iter().rev() {
            self.stack.push((depth + 1, child));
        }
        Some((depth, node))
    }
}

/// Indented outline, one node per line: `IfcSite #20 "Site"`
impl fmt::Display for SpatialNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (depth, node) in self.iter() {
            writeln!(
                f,
                "{:indent$}{} {} {:?}",
                "",
                node.entity_type,
                node.id,
                node.name,
                indent = depth * 2
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SpatialNode {
        let mut project = SpatialNode::new(EntityId(1), "P", "IfcProject");
        let mut site = SpatialNode::new(EntityId(2), "S", "IfcSite");
        site.add_child(SpatialNode::new(EntityId(3), "B", "IfcBuilding"));
        project.add_child(site);
        project.add_child(SpatialNode::new(EntityId(4), "", "IfcSite"));
        project
    }

    #[test]
    fn test_iter_is_preorder() {
        let tree = sample();
        let ids: Vec<u32> = tree.iter().map(|(_, n)| n.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        assert_eq!(tree.len(), 4);
    }

    #[test]
    fn test_find() {
        let tree = sample();
        assert_eq!(tree.find(EntityId(3)).map(|n| n.name.as_str()), Some("B"));
        assert!(tree.find(EntityId(9)).is_none());
    }

    #[test]
    fn test_display_outline() {
        let text = sample().to_string();
        assert_eq!(
            text,
            "IfcProject #1 \"P\"\n  IfcSite #2 \"S\"\n    IfcBuilding #3 \"B\"\n  IfcSite #4 \"\"\n"
        );
    }
}
