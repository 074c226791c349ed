//! Conversion between the flat pre-order rows of a descendants query and a nested tree.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::node::Node;

/// One node with its ordered children.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TreeNode {
    pub node: Node,
    pub children: Vec<TreeNode>,
}

impl Drop for TreeNode {
    // Tear down without recursing, so arbitrarily deep trees drop safely.
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut child) = pending.pop() {
            pending.append(&mut child.children);
        }
    }
}

/// Build a forest from rows sorted by `left` ascending.
///
/// A row becomes a child of the nearest preceding row whose interval contains it; rows with no
/// enclosing row in the input become top-level entries. Each row is visited once, and open
/// ancestors live on an explicit stack so depth is bounded by memory, not by the call stack.
pub fn build_tree(rows: &[Node]) -> Vec<TreeNode> {
    let mut forest = Vec::new();
    let mut open: Vec<TreeNode> = Vec::new();
    for row in rows {
        while open
            .last()
            .is_some_and(|top| row.left > top.node.right || row.root != top.node.root)
        {
            close_top(&mut open, &mut forest);
        }
        open.push(TreeNode {
            node: row.clone(),
            children: Vec::new(),
        });
    }
    while !open.is_empty() {
        close_top(&mut open, &mut forest);
    }
    forest
}

/// Pop the innermost open entry and attach it to its parent, or to the forest at top level.
fn close_top(open: &mut Vec<TreeNode>, forest: &mut Vec<TreeNode>) {
    if let Some(done) = open.pop() {
        match open.last_mut() {
            Some(parent) => parent.children.push(done),
            None => forest.push(done),
        }
    }
}

/// Pre-order flattening; the inverse of `build_tree` for well-formed input.
pub fn flatten(forest: &[TreeNode]) -> Vec<Node> {
    let mut out = Vec::new();
    let mut stack: Vec<&TreeNode> = forest.iter().rev().collect();
    while let Some(entry) = stack.pop() {
        out.push(entry.node.clone());
        stack.extend(entry.children.iter().rev());
    }
    out
}

/// Result of a descendants relation: flat pre-order rows, convertible into a nested tree.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Descendants {
    rows: Vec<Node>,
}

impl Descendants {
    pub fn new(rows: Vec<Node>) -> Self {
        Self { rows }
    }

    pub fn as_flat(&self) -> &[Node] {
        &self.rows
    }

    pub fn into_flat(self) -> Vec<Node> {
        self.rows
    }

    pub fn to_tree(&self) -> Vec<TreeNode> {
        build_tree(&self.rows)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
