use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::ids::NodeId;
use crate::node::{Node, NodeDraft, NodePatch};
use crate::query::{Query, QueryContext};

/// Transactional row store the engine runs on.
///
/// The engine issues every structural mutation between `begin` and `commit`/`rollback`; stores
/// are expected to make the writes in between atomic. A missing row on `update`/`delete` must be
/// reported as an error so the engine can roll back.
pub trait NodeStore {
    fn begin(&mut self) -> Result<()>;
    fn commit(&mut self) -> Result<()>;
    fn rollback(&mut self) -> Result<()>;
    fn query(&self, query: &Query) -> Result<Vec<Node>>;
    fn get(&self, id: NodeId) -> Result<Option<Node>>;
    fn create(&mut self, draft: &NodeDraft) -> Result<NodeId>;
    fn update(&mut self, id: NodeId, patch: &NodePatch) -> Result<()>;
    fn delete(&mut self, id: NodeId) -> Result<()>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MutationKind {
    CreateRoot,
    PrependTo,
    AppendTo,
    InsertBefore,
    InsertAfter,
    MoveBefore,
    MoveAfter,
    MoveAsFirst,
    MoveAsLast,
    MoveAsRoot,
    Delete,
    UpdatePayload,
}

/// Read-only view handed to a `QueryObserver` before a mutation opens its transaction.
#[derive(Clone, Copy, Debug)]
pub struct MutationContext<'a> {
    pub kind: MutationKind,
    /// The persisted node being mutated; `None` while inserting a new node.
    pub node: Option<&'a Node>,
    pub target: Option<&'a Node>,
}

/// Hook that observes relations and mutations. It may reject them or narrow a query, but never
/// owns tree state.
pub trait QueryObserver {
    fn before_query(&self, _ctx: &QueryContext<'_>, _query: &mut Query) -> Result<()> {
        Ok(())
    }

    fn before_mutation(&self, _ctx: &MutationContext<'_>) -> Result<()> {
        Ok(())
    }
}

/// Accepts everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl QueryObserver for NoopObserver {}

/// In-memory row store with snapshot transactions, for tests and embedding.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    rows: BTreeMap<NodeId, Node>,
    next_id: u64,
    snapshot: Option<(BTreeMap<NodeId, Node>, u64)>,
}

impl MemoryStore {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn in_transaction(&self) -> bool {
        self.snapshot.is_some()
    }

    pub fn rows(&self) -> impl Iterator<Item = &Node> {
        self.rows.values()
    }
}

impl NodeStore for MemoryStore {
    fn begin(&mut self) -> Result<()> {
        if self.snapshot.is_some() {
            return Err(Error::Storage("transaction already open".into()));
        }
        self.snapshot = Some((self.rows.clone(), self.next_id));
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.snapshot
            .take()
            .map(|_| ())
            .ok_or_else(|| Error::Storage("commit without open transaction".into()))
    }

    fn rollback(&mut self) -> Result<()> {
        let (rows, next_id) = self
            .snapshot
            .take()
            .ok_or_else(|| Error::Storage("rollback without open transaction".into()))?;
        self.rows = rows;
        self.next_id = next_id;
        Ok(())
    }

    fn query(&self, query: &Query) -> Result<Vec<Node>> {
        let rows = self.rows.values().filter(|n| query.matches(n)).cloned().collect();
        Ok(query.finish(rows))
    }

    fn get(&self, id: NodeId) -> Result<Option<Node>> {
        Ok(self.rows.get(&id).cloned())
    }

    fn create(&mut self, draft: &NodeDraft) -> Result<NodeId> {
        let id = match draft.id {
            Some(id) => {
                if self.rows.contains_key(&id) {
                    return Err(Error::Storage(format!("duplicate node id {id}")));
                }
                id
            }
            None => {
                let mut candidate = self.next_id.max(1);
                while self.rows.contains_key(&NodeId(candidate)) {
                    candidate += 1;
                }
                NodeId(candidate)
            }
        };
        self.next_id = self.next_id.max(id.0 + 1);
        self.rows.insert(id, draft.clone().into_node(id));
        Ok(id)
    }

    fn update(&mut self, id: NodeId, patch: &NodePatch) -> Result<()> {
        let row = self
            .rows
            .get_mut(&id)
            .ok_or_else(|| Error::Storage(format!("update of missing node {id}")))?;
        row.apply(patch);
        Ok(())
    }

    fn delete(&mut self, id: NodeId) -> Result<()> {
        self.rows
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| Error::Storage(format!("delete of missing node {id}")))
    }
}
