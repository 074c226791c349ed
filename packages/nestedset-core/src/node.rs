#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::ids::NodeId;

/// A persisted node row as returned by a `NodeStore`.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Node {
    pub id: NodeId,
    pub left: i64,
    pub right: i64,
    pub level: i64,
    /// Tree scope in forest mode; `None` in single-tree mode.
    pub root: Option<NodeId>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub payload: Vec<u8>,
}

impl Node {
    pub fn is_leaf(&self) -> bool {
        self.right - self.left == 1
    }

    pub fn is_root(&self) -> bool {
        self.left == 1
    }

    /// Strict interval containment within the same tree scope.
    ///
    /// Single-tree rows carry no scope, so the scope comparison only matters in forest mode.
    pub fn is_descendant_of(&self, other: &Node) -> bool {
        self.left > other.left && self.right < other.right && self.root == other.root
    }

    /// Width of the interval, i.e. two boundaries per node in the subtree.
    pub fn width(&self) -> i64 {
        self.right - self.left + 1
    }

    pub fn descendant_count(&self) -> i64 {
        (self.right - self.left - 1) / 2
    }

    pub(crate) fn apply(&mut self, patch: &NodePatch) {
        if let Some(left) = patch.left {
            self.left = left;
        }
        if let Some(right) = patch.right {
            self.right = right;
        }
        if let Some(level) = patch.level {
            self.level = level;
        }
        if let Some(root) = patch.root {
            self.root = Some(root);
        }
        if let Some(payload) = &patch.payload {
            self.payload = payload.clone();
        }
    }
}

/// A node that has not been persisted yet.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NewNode {
    /// Caller-assigned id; `None` lets the store pick one.
    pub id: Option<NodeId>,
    pub payload: Vec<u8>,
}

impl NewNode {
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            id: None,
            payload: payload.into(),
        }
    }

    pub fn with_id(id: NodeId, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            id: Some(id),
            payload: payload.into(),
        }
    }
}

/// Full field set handed to `NodeStore::create`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeDraft {
    pub id: Option<NodeId>,
    pub left: i64,
    pub right: i64,
    pub level: i64,
    pub root: Option<NodeId>,
    pub payload: Vec<u8>,
}

impl NodeDraft {
    pub fn into_node(self, id: NodeId) -> Node {
        Node {
            id,
            left: self.left,
            right: self.right,
            level: self.level,
            root: self.root,
            payload: self.payload,
        }
    }
}

/// Partial field set handed to `NodeStore::update`. Unset fields are left untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NodePatch {
    pub left: Option<i64>,
    pub right: Option<i64>,
    pub level: Option<i64>,
    pub root: Option<NodeId>,
    pub payload: Option<Vec<u8>>,
}

impl NodePatch {
    pub fn left(mut self, value: i64) -> Self {
        self.left = Some(value);
        self
    }

    pub fn right(mut self, value: i64) -> Self {
        self.right = Some(value);
        self
    }

    pub fn level(mut self, value: i64) -> Self {
        self.level = Some(value);
        self
    }

    pub fn root(mut self, value: NodeId) -> Self {
        self.root = Some(value);
        self
    }

    pub fn payload(mut self, value: impl Into<Vec<u8>>) -> Self {
        self.payload = Some(value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_none()
            && self.right.is_none()
            && self.level.is_none()
            && self.root.is_none()
            && self.payload.is_none()
    }

    pub(crate) fn touches_structure(&self) -> bool {
        self.left.is_some() || self.right.is_some() || self.level.is_some() || self.root.is_some()
    }
}
