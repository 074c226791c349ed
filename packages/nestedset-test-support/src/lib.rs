//! Shared scenarios every `NodeStore` backend must pass.
//!
//! Each scenario takes a factory that builds an empty store for a given configuration, drives a
//! `NestedSet` over it and asserts the resulting boundaries. Backends instantiate the whole set
//! with [`conformance_suite!`].

use std::cell::Cell;

use nestedset_core::{
    Error, NestedSet, NestedSetConfig, NewNode, Node, NodeDraft, NodeId, NodePatch, NodeStore,
    Query, QueryObserver, Result,
};

/// Wraps a store and fails the N-th write (create, update or delete) after being armed.
pub struct FailingStore<S> {
    inner: S,
    fail_at: Cell<Option<usize>>,
    writes: usize,
    open: bool,
}

impl<S: NodeStore> FailingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            fail_at: Cell::new(None),
            writes: 0,
            open: false,
        }
    }

    /// Fail the `n`-th write from now on (1-based). Every write counts, committed or not.
    pub fn fail_on_write(&self, n: usize) {
        self.fail_at.set(Some(self.writes + n));
    }

    pub fn disarm(&self) {
        self.fail_at.set(None);
    }

    pub fn writes(&self) -> usize {
        self.writes
    }

    pub fn in_transaction(&self) -> bool {
        self.open
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    fn count_write(&mut self) -> Result<()> {
        self.writes += 1;
        if self.fail_at.get() == Some(self.writes) {
            self.fail_at.set(None);
            return Err(Error::Storage(format!("injected failure on write {}", self.writes)));
        }
        Ok(())
    }
}

impl<S: NodeStore> NodeStore for FailingStore<S> {
    fn begin(&mut self) -> Result<()> {
        self.inner.begin()?;
        self.open = true;
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.inner.commit()?;
        self.open = false;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.inner.rollback()?;
        self.open = false;
        Ok(())
    }

    fn query(&self, query: &Query) -> Result<Vec<Node>> {
        self.inner.query(query)
    }

    fn get(&self, id: NodeId) -> Result<Option<Node>> {
        self.inner.get(id)
    }

    fn create(&mut self, draft: &NodeDraft) -> Result<NodeId> {
        self.count_write()?;
        self.inner.create(draft)
    }

    fn update(&mut self, id: NodeId, patch: &NodePatch) -> Result<()> {
        self.count_write()?;
        self.inner.update(id, patch)
    }

    fn delete(&mut self, id: NodeId) -> Result<()> {
        self.count_write()?;
        self.inner.delete(id)
    }
}

/// Every row in the store, ordered by id.
pub fn snapshot<S: NodeStore, O: QueryObserver>(tree: &NestedSet<S, O>) -> Vec<Node> {
    tree.store().query(&Query::new()).unwrap()
}

pub fn shape<S, O>(tree: &NestedSet<S, O>, node: &Node) -> (i64, i64, i64)
where
    S: NodeStore,
    O: QueryObserver,
{
    let node = tree.refresh(node).unwrap();
    (node.left, node.right, node.level)
}

fn new(payload: &str) -> NewNode {
    NewNode::new(payload.as_bytes().to_vec())
}

/// Handles into the tree built by [`build_move_fixture`].
pub struct MoveFixture {
    pub root: Node,
    pub a: Node,
    pub z: Node,
    pub s: Node,
    pub s1: Node,
    pub t: Node,
    pub u: Node,
}

/// R[1,14]: A[2,3], Z[4,13] with S[5,8](S1[6,7]), T[9,10], U[11,12].
pub fn build_move_fixture<S: NodeStore>(tree: &mut NestedSet<S>) -> MoveFixture {
    let root = tree.create_root(new("R")).unwrap();
    let a = tree.append_to(&root, new("A")).unwrap();
    let z = tree.append_to(&root, new("Z")).unwrap();
    let s = tree.append_to(&z, new("S")).unwrap();
    let s1 = tree.append_to(&s, new("S1")).unwrap();
    let t = tree.append_to(&z, new("T")).unwrap();
    let u = tree.append_to(&z, new("U")).unwrap();
    MoveFixture {
        root: tree.refresh(&root).unwrap(),
        a,
        z: tree.refresh(&z).unwrap(),
        s: tree.refresh(&s).unwrap(),
        s1,
        t,
        u,
    }
}

pub fn single_root_append<S, F>(make: F)
where
    S: NodeStore,
    F: Fn(&NestedSetConfig) -> S,
{
    let config = NestedSetConfig::single_tree();
    let mut tree = NestedSet::new(make(&config), config);
    let root = tree.create_root(new("R")).unwrap();
    assert_eq!((root.left, root.right, root.level), (1, 2, 1));
    let child = tree.append_to(&root, new("C")).unwrap();
    assert_eq!((child.left, child.right, child.level), (2, 3, 2));
    assert_eq!(shape(&tree, &root), (1, 4, 1));
    assert!(matches!(tree.create_root(new("R2")), Err(Error::RootExists)));
    tree.validate_invariants().unwrap();
}

pub fn relations_and_payloads<S, F>(make: F)
where
    S: NodeStore,
    F: Fn(&NestedSetConfig) -> S,
{
    let config = NestedSetConfig::single_tree();
    let mut tree = NestedSet::new(make(&config), config);
    let fx = build_move_fixture(&mut tree);

    let ids = |nodes: Vec<Node>| nodes.into_iter().map(|n| n.id).collect::<Vec<_>>();
    assert_eq!(ids(tree.children(&fx.z).unwrap()), vec![fx.s.id, fx.t.id, fx.u.id]);
    assert_eq!(ids(tree.ancestors(&fx.s1, None).unwrap()), vec![fx.root.id, fx.z.id, fx.s.id]);
    assert_eq!(tree.parent(&fx.t).unwrap().map(|n| n.id), Some(fx.z.id));
    assert_eq!(tree.prev_sibling(&fx.t).unwrap().map(|n| n.id), Some(fx.s.id));
    assert_eq!(tree.next_sibling(&fx.t).unwrap().map(|n| n.id), Some(fx.u.id));
    assert_eq!(tree.next_sibling(&fx.u).unwrap(), None);
    assert_eq!(tree.descendants(&fx.root, None, true).unwrap().len(), 7);
    assert_eq!(tree.descendants(&fx.root, Some(1), false).unwrap().len(), 2);

    let renamed = tree.update_payload(&fx.a, b"renamed".to_vec()).unwrap();
    assert_eq!(tree.refresh(&fx.a).unwrap(), renamed);
    assert_eq!(shape(&tree, &fx.a), (2, 3, 2));
}

pub fn width_four_move<S, F>(make: F)
where
    S: NodeStore,
    F: Fn(&NestedSetConfig) -> S,
{
    let config = NestedSetConfig::single_tree();
    let mut tree = NestedSet::new(make(&config), config);
    let fx = build_move_fixture(&mut tree);

    let moved = tree.move_after(&fx.s, &fx.t).unwrap();
    assert_eq!((moved.left, moved.right, moved.level), (7, 10, 3));
    assert_eq!(shape(&tree, &fx.s1), (8, 9, 4));
    assert_eq!(shape(&tree, &fx.t), (5, 6, 3));
    assert_eq!(shape(&tree, &fx.u), (11, 12, 3));
    tree.validate_invariants().unwrap();

    let moved = tree.move_as_first(&fx.s, &fx.root).unwrap();
    assert_eq!((moved.left, moved.right, moved.level), (2, 5, 2));
    assert_eq!(shape(&tree, &fx.s1), (3, 4, 3));
    tree.validate_invariants().unwrap();
}

pub fn no_op_move<S, F>(make: F)
where
    S: NodeStore,
    F: Fn(&NestedSetConfig) -> S,
{
    let config = NestedSetConfig::single_tree();
    let mut tree = NestedSet::new(make(&config), config);
    let fx = build_move_fixture(&mut tree);
    let before = snapshot(&tree);
    tree.move_before(&fx.s, &fx.t).unwrap();
    tree.move_as_last(&fx.u, &fx.z).unwrap();
    assert_eq!(snapshot(&tree), before);
}

pub fn delete_closes_gap<S, F>(make: F)
where
    S: NodeStore,
    F: Fn(&NestedSetConfig) -> S,
{
    let config = NestedSetConfig::single_tree();
    let mut tree = NestedSet::new(make(&config), config);
    let fx = build_move_fixture(&mut tree);

    assert_eq!(tree.delete(fx.s.clone()).unwrap(), 2);
    assert!(matches!(tree.refresh(&fx.s1), Err(Error::NotFound(_))));
    assert_eq!(shape(&tree, &fx.t), (5, 6, 3));
    assert_eq!(shape(&tree, &fx.z), (4, 9, 2));
    assert_eq!(shape(&tree, &fx.root), (1, 10, 1));
    tree.validate_invariants().unwrap();
}

pub fn forest_moves<S, F>(make: F)
where
    S: NodeStore,
    F: Fn(&NestedSetConfig) -> S,
{
    let config = NestedSetConfig::forest();
    let mut tree = NestedSet::new(make(&config), config);
    let a = tree.create_root(new("A")).unwrap();
    let b = tree.create_root(new("B")).unwrap();
    let c = tree.create_root(new("C")).unwrap();
    let c1 = tree.append_to(&c, new("c1")).unwrap();

    let moved = tree.move_as_last(&a, &b).unwrap();
    assert_eq!(moved.root, Some(b.id));
    assert_eq!((moved.left, moved.right, moved.level), (2, 3, 2));
    assert_eq!(shape(&tree, &b), (1, 4, 1));
    assert_eq!(shape(&tree, &c1), (2, 3, 2));
    assert_eq!(tree.roots().unwrap().len(), 2);

    let detached = tree.move_as_root(&c1).unwrap();
    assert_eq!(detached.root, Some(c1.id));
    assert_eq!((detached.left, detached.right, detached.level), (1, 2, 1));
    assert_eq!(shape(&tree, &c), (1, 2, 1));
    assert_eq!(tree.roots().unwrap().len(), 3);
    tree.validate_invariants().unwrap();
}

/// Fails every write of a move in turn and checks that each failure leaves the store untouched.
pub fn failed_writes_roll_back<S, F>(make: F)
where
    S: NodeStore,
    F: Fn(&NestedSetConfig) -> S,
{
    let config = NestedSetConfig::single_tree();
    let mut tree = NestedSet::new(FailingStore::new(make(&config)), config);
    let fx = build_move_fixture(&mut tree);
    let before = snapshot(&tree);

    // Count the writes of one successful move, then move back.
    let start = tree.store().writes();
    tree.move_after(&fx.s, &fx.t).unwrap();
    let writes = tree.store().writes() - start;
    assert!(writes >= 4, "a width-4 move touches at least four rows");
    tree.move_before(&fx.s, &fx.t).unwrap();
    assert_eq!(snapshot(&tree), before);

    for n in 1..=writes {
        tree.store().fail_on_write(n);
        let err = tree.move_after(&fx.s, &fx.t).unwrap_err();
        assert!(matches!(err, Error::Storage(_)), "write {n}: {err}");
        assert!(!tree.store().in_transaction());
        assert_eq!(snapshot(&tree), before, "failed write {n} leaked");
    }

    tree.store().fail_on_write(1);
    assert!(tree.append_to(&fx.z, new("x")).is_err());
    tree.store().fail_on_write(2);
    assert!(tree.delete(fx.s.clone()).is_err());
    assert_eq!(snapshot(&tree), before);

    tree.store().disarm();
    tree.move_after(&fx.s, &fx.t).unwrap();
    tree.validate_invariants().unwrap();
}

/// Handles into the forest built by [`build_forest_fixture`].
pub struct ForestFixture {
    pub a: Node,
    pub a1: Node,
    pub a11: Node,
    pub a2: Node,
    pub b: Node,
    pub b1: Node,
}

/// A[1,8]: a1[2,5](a11[3,4]), a2[6,7] and B[1,4]: b1[2,3], each its own tree.
pub fn build_forest_fixture<S: NodeStore>(tree: &mut NestedSet<S>) -> ForestFixture {
    let a = tree.create_root(new("A")).unwrap();
    let a1 = tree.append_to(&a, new("a1")).unwrap();
    let a11 = tree.append_to(&a1, new("a11")).unwrap();
    let a2 = tree.append_to(&a, new("a2")).unwrap();
    let b = tree.create_root(new("B")).unwrap();
    let b1 = tree.append_to(&b, new("b1")).unwrap();
    ForestFixture {
        a: tree.refresh(&a).unwrap(),
        a1: tree.refresh(&a1).unwrap(),
        a11,
        a2,
        b: tree.refresh(&b).unwrap(),
        b1,
    }
}

/// Writes issued by `op` when it runs unarmed on a freshly built forest fixture.
fn forest_write_count<S, F, Op>(make: &F, op: Op) -> usize
where
    S: NodeStore,
    F: Fn(&NestedSetConfig) -> S,
    Op: Fn(&mut NestedSet<FailingStore<S>>, &ForestFixture) -> Result<Node>,
{
    let config = NestedSetConfig::forest();
    let mut tree = NestedSet::new(FailingStore::new(make(&config)), config);
    let fx = build_forest_fixture(&mut tree);
    let start = tree.store().writes();
    op(&mut tree, &fx).unwrap();
    tree.validate_invariants().unwrap();
    tree.store().writes() - start
}

/// Cross-tree moves and detaching a subtree as a new root rewrite two trees at once; a failure on
/// any single write must leave both trees as they were.
pub fn forest_failed_writes_roll_back<S, F>(make: F)
where
    S: NodeStore,
    F: Fn(&NestedSetConfig) -> S,
{
    let cross = |tree: &mut NestedSet<FailingStore<S>>, fx: &ForestFixture| {
        tree.move_as_last(&fx.a1, &fx.b1)
    };
    let detach =
        |tree: &mut NestedSet<FailingStore<S>>, fx: &ForestFixture| tree.move_as_root(&fx.a1);
    let cross_writes = forest_write_count(&make, cross);
    let detach_writes = forest_write_count(&make, detach);
    // Both trees shift and both rows of the subtree are rewritten.
    assert!(cross_writes >= 6, "cross-tree move issued {cross_writes} writes");
    assert!(detach_writes >= 4, "move_as_root issued {detach_writes} writes");

    let config = NestedSetConfig::forest();
    let mut tree = NestedSet::new(FailingStore::new(make(&config)), config);
    let fx = build_forest_fixture(&mut tree);
    let before = snapshot(&tree);

    for n in 1..=cross_writes {
        tree.store().fail_on_write(n);
        let err = cross(&mut tree, &fx).unwrap_err();
        assert!(matches!(err, Error::Storage(_)), "cross write {n}: {err}");
        assert!(!tree.store().in_transaction());
        assert_eq!(snapshot(&tree), before, "failed cross write {n} leaked");
    }
    for n in 1..=detach_writes {
        tree.store().fail_on_write(n);
        let err = detach(&mut tree, &fx).unwrap_err();
        assert!(matches!(err, Error::Storage(_)), "detach write {n}: {err}");
        assert!(!tree.store().in_transaction());
        assert_eq!(snapshot(&tree), before, "failed detach write {n} leaked");
    }
    tree.validate_invariants().unwrap();

    tree.store().disarm();
    let moved = cross(&mut tree, &fx).unwrap();
    assert_eq!(moved.root, Some(fx.b.id));
    assert_eq!((moved.left, moved.right, moved.level), (3, 6, 3));
    assert_eq!(shape(&tree, &fx.a11), (4, 5, 4));
    assert_eq!(shape(&tree, &fx.b), (1, 8, 1));
    assert_eq!(shape(&tree, &fx.a), (1, 4, 1));
    assert_eq!(shape(&tree, &fx.a2), (2, 3, 2));
    tree.validate_invariants().unwrap();
}

/// Instantiate every conformance scenario as a `#[test]` for one store factory.
#[macro_export]
macro_rules! conformance_suite {
    ($make:expr) => {
        #[test]
        fn single_root_append() {
            $crate::single_root_append($make);
        }

        #[test]
        fn relations_and_payloads() {
            $crate::relations_and_payloads($make);
        }

        #[test]
        fn width_four_move() {
            $crate::width_four_move($make);
        }

        #[test]
        fn no_op_move() {
            $crate::no_op_move($make);
        }

        #[test]
        fn delete_closes_gap() {
            $crate::delete_closes_gap($make);
        }

        #[test]
        fn forest_moves() {
            $crate::forest_moves($make);
        }

        #[test]
        fn failed_writes_roll_back() {
            $crate::failed_writes_roll_back($make);
        }

        #[test]
        fn forest_failed_writes_roll_back() {
            $crate::forest_failed_writes_roll_back($make);
        }
    };
}
