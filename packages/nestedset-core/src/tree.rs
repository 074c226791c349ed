use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::config::NestedSetConfig;
use crate::error::{Error, Result};
use crate::ids::NodeId;
use crate::materialization::Descendants;
use crate::node::{NewNode, Node, NodeDraft, NodePatch};
use crate::query::{self, Order, Query, QueryContext, Relation};
use crate::shift::{shift, shift_between};
use crate::traits::{MutationContext, MutationKind, NodeStore, NoopObserver, QueryObserver};

/// Where a node lands relative to its target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Placement {
    Before,
    After,
    FirstChild,
    LastChild,
}

impl Placement {
    fn key(self, target: &Node) -> i64 {
        match self {
            Placement::Before => target.left,
            Placement::After => target.right + 1,
            Placement::FirstChild => target.left + 1,
            Placement::LastChild => target.right,
        }
    }

    fn level_up(self) -> i64 {
        match self {
            Placement::FirstChild | Placement::LastChild => 1,
            Placement::Before | Placement::After => 0,
        }
    }
}

enum Tx<T> {
    Commit(T),
    Rollback(T),
}

/// Run `f` inside one store transaction. Errors roll back and are returned unchanged.
fn transact<S, T>(
    store: &mut S,
    op: &'static str,
    f: impl FnOnce(&mut S) -> Result<Tx<T>>,
) -> Result<T>
where
    S: NodeStore,
{
    store.begin()?;
    let outcome = f(store).and_then(|tx| match tx {
        Tx::Commit(value) => store.commit().map(|_| value),
        Tx::Rollback(value) => store.rollback().map(|_| value),
    });
    if let Err(err) = &outcome {
        warn!(op, error = %err, "rolling back");
        if let Err(rollback_err) = store.rollback() {
            warn!(op, error = %rollback_err, "rollback failed");
        }
    }
    outcome
}

/// Nested-set engine over a transactional row store.
pub struct NestedSet<S, O = NoopObserver>
where
    S: NodeStore,
    O: QueryObserver,
{
    store: S,
    observer: O,
    config: NestedSetConfig,
}

impl<S> NestedSet<S, NoopObserver>
where
    S: NodeStore,
{
    pub fn new(store: S, config: NestedSetConfig) -> Self {
        Self::with_observer(store, config, NoopObserver)
    }
}

impl<S, O> NestedSet<S, O>
where
    S: NodeStore,
    O: QueryObserver,
{
    pub fn with_observer(store: S, config: NestedSetConfig, observer: O) -> Self {
        Self {
            store,
            observer,
            config,
        }
    }

    pub fn config(&self) -> &NestedSetConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn get(&self, id: NodeId) -> Result<Option<Node>> {
        self.store.get(id)
    }

    /// Reload a node, failing when it was deleted.
    pub fn refresh(&self, node: &Node) -> Result<Node> {
        self.store.get(node.id)?.ok_or(Error::NotFound(node.id))
    }

    /// Descendants in pre-order. `depth` limits how many generations below the node are
    /// returned; `include_self` adds the node itself as the first row.
    pub fn descendants(
        &self,
        node: &Node,
        depth: Option<i64>,
        include_self: bool,
    ) -> Result<Descendants> {
        self.relation(
            Relation::Descendants {
                depth,
                include_self,
            },
            node,
        )
        .map(Descendants::new)
    }

    /// Direct children, left to right.
    pub fn children(&self, node: &Node) -> Result<Vec<Node>> {
        self.descendants(node, Some(1), false).map(Descendants::into_flat)
    }

    /// Ancestors from the root down. `depth` limits how many generations up are returned.
    pub fn ancestors(&self, node: &Node, depth: Option<i64>) -> Result<Vec<Node>> {
        self.relation(Relation::Ancestors { depth }, node)
    }

    pub fn parent(&self, node: &Node) -> Result<Option<Node>> {
        Ok(self.relation(Relation::Parent, node)?.into_iter().next())
    }

    pub fn prev_sibling(&self, node: &Node) -> Result<Option<Node>> {
        Ok(self.relation(Relation::PrevSibling, node)?.into_iter().next())
    }

    pub fn next_sibling(&self, node: &Node) -> Result<Option<Node>> {
        Ok(self.relation(Relation::NextSibling, node)?.into_iter().next())
    }

    /// Every root, across all trees in forest mode.
    pub fn roots(&self) -> Result<Vec<Node>> {
        let mut query = query::roots();
        let ctx = QueryContext {
            relation: Relation::Roots,
            owner: None,
        };
        self.observer.before_query(&ctx, &mut query)?;
        self.store.query(&query)
    }

    fn relation(&self, relation: Relation, node: &Node) -> Result<Vec<Node>> {
        let owner = self.refresh(node)?;
        self.scope_of(&owner)?;
        let mut query = query::translate(relation, &owner);
        let ctx = QueryContext {
            relation,
            owner: Some(&owner),
        };
        self.observer.before_query(&ctx, &mut query)?;
        self.store.query(&query)
    }

    fn scope_of(&self, node: &Node) -> Result<Option<NodeId>> {
        if !self.config.forest {
            return Ok(None);
        }
        node.root.map(Some).ok_or(Error::MissingTreeScope(node.id))
    }

    fn ensure_new(&self, node: &NewNode) -> Result<()> {
        match node.id {
            Some(id) if self.store.get(id)?.is_some() => Err(Error::NotNew(id)),
            _ => Ok(()),
        }
    }

    /// Persist a new root at `[1, 2]`.
    ///
    /// In single-tree mode this fails when a root already exists. In forest mode the node opens
    /// a new tree whose scope is its own id.
    pub fn create_root(&mut self, node: NewNode) -> Result<Node> {
        self.ensure_new(&node)?;
        self.observer.before_mutation(&MutationContext {
            kind: MutationKind::CreateRoot,
            node: None,
            target: None,
        })?;

        let mut draft = NodeDraft {
            id: node.id,
            left: 1,
            right: 2,
            level: 1,
            root: None,
            payload: node.payload,
        };

        let id = if self.config.forest {
            draft.root = node.id;
            let id = transact(&mut self.store, "create_root", |store| {
                let id = store.create(&draft)?;
                if draft.root != Some(id) {
                    store.update(id, &NodePatch::default().root(id))?;
                }
                Ok(Tx::Commit(id))
            })?;
            draft.root = Some(id);
            id
        } else {
            if !self.store.query(&query::roots().limit(1))?.is_empty() {
                return Err(Error::RootExists);
            }
            self.store.create(&draft)?
        };

        debug!(node = %id, forest = self.config.forest, "created root");
        Ok(draft.into_node(id))
    }

    /// Insert `node` as the first child of `target`.
    pub fn prepend_to(&mut self, target: &Node, node: NewNode) -> Result<Node> {
        self.add_node(MutationKind::PrependTo, target, node, Placement::FirstChild)
    }

    /// Insert `node` as the last child of `target`.
    pub fn append_to(&mut self, target: &Node, node: NewNode) -> Result<Node> {
        self.add_node(MutationKind::AppendTo, target, node, Placement::LastChild)
    }

    /// Insert `node` as the sibling right before `target`.
    pub fn insert_before(&mut self, target: &Node, node: NewNode) -> Result<Node> {
        self.add_node(MutationKind::InsertBefore, target, node, Placement::Before)
    }

    /// Insert `node` as the sibling right after `target`.
    pub fn insert_after(&mut self, target: &Node, node: NewNode) -> Result<Node> {
        self.add_node(MutationKind::InsertAfter, target, node, Placement::After)
    }

    fn add_node(
        &mut self,
        kind: MutationKind,
        target: &Node,
        node: NewNode,
        placement: Placement,
    ) -> Result<Node> {
        self.ensure_new(&node)?;
        let target = self.refresh(target)?;
        let level_up = placement.level_up();
        if level_up == 0 && target.is_root() {
            return Err(Error::TargetIsRoot(target.id));
        }
        let scope = self.scope_of(&target)?;
        self.observer.before_mutation(&MutationContext {
            kind,
            node: None,
            target: Some(&target),
        })?;

        let key = placement.key(&target);
        let draft = NodeDraft {
            id: node.id,
            left: key,
            right: key + 1,
            level: target.level + level_up,
            root: scope,
            payload: node.payload,
        };
        let id = transact(&mut self.store, "insert", |store| {
            shift(store, scope, key, 2)?;
            store.create(&draft).map(Tx::Commit)
        })?;

        debug!(node = %id, target = %target.id, ?kind, key, "inserted node");
        Ok(draft.into_node(id))
    }

    /// Move `node` (with its subtree) to become the sibling right before `target`.
    pub fn move_before(&mut self, node: &Node, target: &Node) -> Result<Node> {
        self.move_node(MutationKind::MoveBefore, node, target, Placement::Before)
    }

    /// Move `node` (with its subtree) to become the sibling right after `target`.
    pub fn move_after(&mut self, node: &Node, target: &Node) -> Result<Node> {
        self.move_node(MutationKind::MoveAfter, node, target, Placement::After)
    }

    /// Move `node` (with its subtree) to become the first child of `target`.
    pub fn move_as_first(&mut self, node: &Node, target: &Node) -> Result<Node> {
        self.move_node(MutationKind::MoveAsFirst, node, target, Placement::FirstChild)
    }

    /// Move `node` (with its subtree) to become the last child of `target`.
    pub fn move_as_last(&mut self, node: &Node, target: &Node) -> Result<Node> {
        self.move_node(MutationKind::MoveAsLast, node, target, Placement::LastChild)
    }

    fn move_node(
        &mut self,
        kind: MutationKind,
        node: &Node,
        target: &Node,
        placement: Placement,
    ) -> Result<Node> {
        let node = self.refresh(node)?;
        let target = self.refresh(target)?;
        if node.id == target.id {
            return Err(Error::TargetIsSelf);
        }
        let source_scope = self.scope_of(&node)?;
        let target_scope = self.scope_of(&target)?;
        if target.is_descendant_of(&node) {
            return Err(Error::TargetIsDescendant(target.id));
        }
        let level_up = placement.level_up();
        if level_up == 0 && target.is_root() {
            return Err(Error::TargetIsRoot(target.id));
        }
        self.observer.before_mutation(&MutationContext {
            kind,
            node: Some(&node),
            target: Some(&target),
        })?;

        let key = placement.key(&target);
        let width = node.width();
        let level_delta = target.level + level_up - node.level;

        let moved = transact(&mut self.store, "move", |store| {
            if source_scope == target_scope {
                // Shift for the subtree itself, and the half-open range the rest of the tree
                // slides through in the opposite direction.
                let (offset, from, to, delta) = if key > node.right {
                    (key - node.right - 1, node.right + 1, key, -width)
                } else if key < node.left {
                    (key - node.left, key, node.left, width)
                } else {
                    return Ok(Tx::Rollback(false));
                };
                if offset == 0 && level_delta == 0 {
                    return Ok(Tx::Rollback(false));
                }

                let subtree = store.query(&Query::subtree(&node))?;
                shift_between(store, target_scope, from, to, delta)?;
                for row in &subtree {
                    let patch = NodePatch::default()
                        .left(row.left + offset)
                        .right(row.right + offset)
                        .level(row.level + level_delta);
                    store.update(row.id, &patch)?;
                }
            } else {
                let root = target_scope.ok_or(Error::MissingTreeScope(target.id))?;
                let subtree = store.query(&Query::subtree(&node))?;
                shift(store, target_scope, key, width)?;
                shift(store, source_scope, node.right + 1, -width)?;
                let offset = key - node.left;
                for row in &subtree {
                    let patch = NodePatch::default()
                        .left(row.left + offset)
                        .right(row.right + offset)
                        .level(row.level + level_delta)
                        .root(root);
                    store.update(row.id, &patch)?;
                }
            }
            Ok(Tx::Commit(true))
        })?;

        if !moved {
            debug!(node = %node.id, target = %target.id, ?kind, "move is a no-op");
            return Ok(node);
        }
        debug!(
            node = %node.id,
            target = %target.id,
            ?kind,
            key,
            width,
            level_delta,
            "moved subtree"
        );
        self.refresh(&node)
    }

    /// Detach `node` with its subtree into a tree of its own. Forest mode only.
    pub fn move_as_root(&mut self, node: &Node) -> Result<Node> {
        if !self.config.forest {
            return Err(Error::ForestModeDisabled);
        }
        let node = self.refresh(node)?;
        let scope = self.scope_of(&node)?;
        if node.is_root() {
            return Err(Error::AlreadyRoot(node.id));
        }
        self.observer.before_mutation(&MutationContext {
            kind: MutationKind::MoveAsRoot,
            node: Some(&node),
            target: None,
        })?;

        let offset = 1 - node.left;
        let level_delta = 1 - node.level;
        transact(&mut self.store, "move_as_root", |store| {
            for row in store.query(&Query::subtree(&node))? {
                let patch = NodePatch::default()
                    .left(row.left + offset)
                    .right(row.right + offset)
                    .level(row.level + level_delta)
                    .root(node.id);
                store.update(row.id, &patch)?;
            }
            shift(store, scope, node.right + 1, -node.width())?;
            Ok(Tx::Commit(()))
        })?;

        debug!(node = %node.id, "moved subtree into its own tree");
        self.refresh(&node)
    }

    /// Delete `node` and its whole subtree, closing the gap it leaves behind.
    ///
    /// Returns the number of removed rows.
    pub fn delete(&mut self, node: Node) -> Result<usize> {
        let node = self.refresh(&node)?;
        let scope = self.scope_of(&node)?;
        self.observer.before_mutation(&MutationContext {
            kind: MutationKind::Delete,
            node: Some(&node),
            target: None,
        })?;

        let removed = transact(&mut self.store, "delete", |store| {
            let removed = if node.is_leaf() {
                store.delete(node.id)?;
                1
            } else {
                let subtree = store.query(&Query::subtree(&node))?;
                for row in &subtree {
                    store.delete(row.id)?;
                }
                subtree.len()
            };
            shift(store, scope, node.right + 1, node.left - node.right - 1)?;
            Ok(Tx::Commit(removed))
        })?;

        debug!(node = %node.id, removed, "deleted subtree");
        Ok(removed)
    }

    /// Replace the payload of a persisted node. Structural fields are never touched.
    pub fn update_payload(&mut self, node: &Node, payload: impl Into<Vec<u8>>) -> Result<Node> {
        let mut node = self.refresh(node)?;
        self.observer.before_mutation(&MutationContext {
            kind: MutationKind::UpdatePayload,
            node: Some(&node),
            target: None,
        })?;
        let patch = NodePatch::default().payload(payload);
        debug_assert!(!patch.touches_structure());
        self.store.update(node.id, &patch)?;
        node.apply(&patch);
        Ok(node)
    }

    /// Check every structural invariant over the whole store. Intended for tests and debugging.
    pub fn validate_invariants(&self) -> Result<()> {
        let rows = self.store.query(&Query::new().order_by(Order::LeftAsc))?;
        let mut scopes: BTreeMap<Option<NodeId>, Vec<Node>> = BTreeMap::new();
        for row in rows {
            let scope = if self.config.forest {
                Some(row.root.ok_or_else(|| {
                    Error::InconsistentState(format!("node {} has no tree scope", row.id))
                })?)
            } else {
                None
            };
            scopes.entry(scope).or_default().push(row);
        }
        for (scope, rows) in &scopes {
            validate_scope(*scope, rows)?;
        }
        Ok(())
    }
}

/// `rows` must be one tree scope sorted by `left`.
fn validate_scope(scope: Option<NodeId>, rows: &[Node]) -> Result<()> {
    let inconsistent = |msg: String| Error::InconsistentState(msg);

    let mut bounds: Vec<i64> = rows.iter().flat_map(|n| [n.left, n.right]).collect();
    bounds.sort_unstable();
    if bounds.iter().zip(1i64..).any(|(b, expected)| *b != expected) {
        return Err(inconsistent(format!(
            "tree {scope:?}: boundaries are not exactly 1..={}",
            bounds.len()
        )));
    }

    let mut stack: Vec<&Node> = Vec::new();
    for (idx, node) in rows.iter().enumerate() {
        if node.left >= node.right {
            return Err(inconsistent(format!(
                "node {}: left {} is not below right {}",
                node.id, node.left, node.right
            )));
        }
        let inside = rows.partition_point(|n| n.left < node.right) - idx - 1;
        if node.right != node.left + 1 + 2 * inside as i64 {
            return Err(inconsistent(format!(
                "node {}: [{}, {}] does not match {} descendants",
                node.id, node.left, node.right, inside
            )));
        }

        while stack.last().is_some_and(|top| top.right < node.left) {
            stack.pop();
        }
        match stack.last() {
            Some(parent) => {
                if node.right > parent.right {
                    return Err(inconsistent(format!(
                        "node {} partially overlaps node {}",
                        node.id, parent.id
                    )));
                }
                if node.level != parent.level + 1 {
                    return Err(inconsistent(format!(
                        "node {} has level {} under parent level {}",
                        node.id, node.level, parent.level
                    )));
                }
            }
            None => {
                if node.left != 1 || node.level != 1 {
                    return Err(inconsistent(format!(
                        "tree {scope:?}: node {} is not enclosed by the root",
                        node.id
                    )));
                }
                if scope.is_some_and(|scope| scope != node.id) {
                    return Err(inconsistent(format!(
                        "root {} does not match tree scope {scope:?}",
                        node.id
                    )));
                }
            }
        }
        stack.push(node);
    }
    Ok(())
}
