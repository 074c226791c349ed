#![forbid(unsafe_code)]
//! Nested-set tree maintenance with pluggable row storage.
//! Each node stores a `[left, right]` interval that strictly contains the intervals of all its
//! descendants, so subtree and ancestor reads are single range predicates. This crate stays
//! independent of concrete storage engines: anything that satisfies `NodeStore` (begin/commit/
//! rollback, range query, per-row create/update/delete) can host a tree or a forest of trees.

pub mod config;
pub mod error;
pub mod ids;
pub mod materialization;
pub mod node;
pub mod query;
mod shift;
pub mod traits;
pub mod tree;

pub use config::{ColumnNames, NestedSetConfig};
pub use error::{Error, Result};
pub use ids::NodeId;
pub use materialization::{build_tree, flatten, Descendants, TreeNode};
pub use node::{NewNode, Node, NodeDraft, NodePatch};
pub use query::{CmpOp, Column, Filter, Order, Query, QueryContext, Relation};
pub use traits::{
    MemoryStore, MutationContext, MutationKind, NodeStore, NoopObserver, QueryObserver,
};
pub use tree::NestedSet;
