use nestedset_core::{
    Error, MemoryStore, NestedSet, NestedSetConfig, NewNode, Node, NodeId,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn single_tree() -> NestedSet<MemoryStore> {
    init_tracing();
    NestedSet::new(MemoryStore::default(), NestedSetConfig::single_tree())
}

fn node(payload: &str) -> NewNode {
    NewNode::new(payload.as_bytes().to_vec())
}

fn shape(tree: &NestedSet<MemoryStore>, n: &Node) -> (i64, i64, i64) {
    let n = tree.refresh(n).unwrap();
    (n.left, n.right, n.level)
}

fn ids(nodes: &[Node]) -> Vec<NodeId> {
    nodes.iter().map(|n| n.id).collect()
}

#[test]
fn append_child_to_single_root() {
    let mut tree = single_tree();
    let root = tree.create_root(node("R")).unwrap();
    assert_eq!((root.left, root.right, root.level), (1, 2, 1));
    assert_eq!(root.root, None);

    let child = tree.append_to(&root, node("C")).unwrap();
    assert_eq!((child.left, child.right, child.level), (2, 3, 2));
    assert_eq!(shape(&tree, &root), (1, 4, 1));
    tree.validate_invariants().unwrap();
}

#[test]
fn single_tree_mode_allows_one_root() {
    let mut tree = single_tree();
    tree.create_root(node("R")).unwrap();
    let err = tree.create_root(node("R2")).unwrap_err();
    assert!(matches!(err, Error::RootExists));
    assert!(err.is_precondition());
    assert_eq!(tree.roots().unwrap().len(), 1);
}

#[test]
fn sibling_inserts_land_next_to_target() {
    let mut tree = single_tree();
    let root = tree.create_root(node("R")).unwrap();
    let a = tree.append_to(&root, node("a")).unwrap();
    let b = tree.insert_after(&a, node("b")).unwrap();
    let c = tree.insert_before(&a, node("c")).unwrap();

    assert_eq!(ids(&tree.children(&root).unwrap()), vec![c.id, a.id, b.id]);
    assert_eq!(shape(&tree, &root), (1, 8, 1));
    assert_eq!(shape(&tree, &c), (2, 3, 2));
    assert_eq!(shape(&tree, &a), (4, 5, 2));
    assert_eq!(shape(&tree, &b), (6, 7, 2));
    tree.validate_invariants().unwrap();
}

#[test]
fn sibling_of_root_is_rejected() {
    let mut tree = single_tree();
    let root = tree.create_root(node("R")).unwrap();
    assert!(matches!(
        tree.insert_after(&root, node("x")),
        Err(Error::TargetIsRoot(id)) if id == root.id
    ));
    assert!(matches!(
        tree.insert_before(&root, node("x")),
        Err(Error::TargetIsRoot(_))
    ));
    assert_eq!(tree.store().len(), 1);
}

#[test]
fn caller_assigned_ids_must_be_new() {
    let mut tree = single_tree();
    let root = tree
        .create_root(NewNode::with_id(NodeId(10), b"R".to_vec()))
        .unwrap();
    assert_eq!(root.id, NodeId(10));
    let child = tree
        .append_to(&root, NewNode::with_id(NodeId(20), b"C".to_vec()))
        .unwrap();
    assert_eq!(child.id, NodeId(20));

    let err = tree
        .prepend_to(&root, NewNode::with_id(NodeId(20), b"dup".to_vec()))
        .unwrap_err();
    assert!(matches!(err, Error::NotNew(NodeId(20))));
    tree.validate_invariants().unwrap();
}

#[test]
fn delete_removes_subtree_and_closes_gap() {
    let mut tree = single_tree();
    let root = tree.create_root(node("R")).unwrap();
    let a = tree.append_to(&root, node("a")).unwrap();
    let b = tree.append_to(&root, node("b")).unwrap();
    let a1 = tree.append_to(&a, node("a1")).unwrap();
    tree.append_to(&a, node("a2")).unwrap();

    assert_eq!(shape(&tree, &a), (2, 7, 2));
    assert_eq!(shape(&tree, &b), (8, 9, 2));

    let a = tree.refresh(&a).unwrap();
    let expected = (a.width() / 2) as usize;
    let removed = tree.delete(a).unwrap();
    assert_eq!(removed, 3);
    assert_eq!(removed, expected);

    assert_eq!(tree.store().len(), 2);
    assert_eq!(shape(&tree, &b), (2, 3, 2));
    assert_eq!(shape(&tree, &root), (1, 4, 1));
    tree.validate_invariants().unwrap();

    // Handles to deleted rows are rejected.
    assert!(matches!(
        tree.append_to(&a1, node("orphan")),
        Err(Error::NotFound(id)) if id == a1.id
    ));
    assert!(matches!(tree.delete(a1), Err(Error::NotFound(_))));
}

#[test]
fn delete_leaf_only_removes_that_row() {
    let mut tree = single_tree();
    let root = tree.create_root(node("R")).unwrap();
    let a = tree.append_to(&root, node("a")).unwrap();
    let b = tree.append_to(&root, node("b")).unwrap();

    assert_eq!(tree.delete(a).unwrap(), 1);
    assert_eq!(shape(&tree, &b), (2, 3, 2));
    assert_eq!(shape(&tree, &root), (1, 4, 1));
    tree.validate_invariants().unwrap();
}

#[test]
fn deleting_the_root_empties_the_tree() {
    let mut tree = single_tree();
    let root = tree.create_root(node("R")).unwrap();
    tree.append_to(&root, node("a")).unwrap();
    assert_eq!(tree.delete(root).unwrap(), 2);
    assert!(tree.store().is_empty());
    tree.create_root(node("R2")).unwrap();
    tree.validate_invariants().unwrap();
}

#[test]
fn relations_follow_intervals() {
    let mut tree = single_tree();
    let root = tree.create_root(node("R")).unwrap();
    let a = tree.append_to(&root, node("a")).unwrap();
    let b = tree.append_to(&root, node("b")).unwrap();
    let c = tree.append_to(&root, node("c")).unwrap();
    let b1 = tree.append_to(&b, node("b1")).unwrap();
    let b11 = tree.append_to(&b1, node("b11")).unwrap();

    assert_eq!(tree.parent(&b11).unwrap().map(|n| n.id), Some(b1.id));
    assert_eq!(tree.parent(&b).unwrap().map(|n| n.id), Some(root.id));
    assert_eq!(tree.parent(&root).unwrap(), None);

    assert_eq!(ids(&tree.ancestors(&b11, None).unwrap()), vec![root.id, b.id, b1.id]);
    assert_eq!(ids(&tree.ancestors(&b11, Some(1)).unwrap()), vec![b1.id]);

    assert_eq!(tree.prev_sibling(&b).unwrap().map(|n| n.id), Some(a.id));
    assert_eq!(tree.next_sibling(&b).unwrap().map(|n| n.id), Some(c.id));
    assert_eq!(tree.prev_sibling(&a).unwrap(), None);
    assert_eq!(tree.next_sibling(&c).unwrap(), None);

    let all = tree.descendants(&root, None, false).unwrap();
    assert_eq!(ids(all.as_flat()), vec![a.id, b.id, b1.id, b11.id, c.id]);
    let two_levels = tree.descendants(&root, Some(2), true).unwrap();
    assert_eq!(ids(two_levels.as_flat()), vec![root.id, a.id, b.id, b1.id, c.id]);
    assert_eq!(ids(&tree.children(&b).unwrap()), vec![b1.id]);

    assert!(tree.refresh(&b11).unwrap().is_descendant_of(&root));
    assert!(!root.is_descendant_of(&b11));
}

#[test]
fn descendant_count_matches_interval_width() {
    let mut tree = single_tree();
    let root = tree.create_root(node("R")).unwrap();
    let a = tree.append_to(&root, node("a")).unwrap();
    tree.append_to(&a, node("a1")).unwrap();
    tree.prepend_to(&a, node("a0")).unwrap();
    tree.insert_after(&a, node("b")).unwrap();

    for n in tree.descendants(&root, None, true).unwrap().into_flat() {
        let count = tree.descendants(&n, None, false).unwrap().len() as i64;
        assert_eq!((n.right - n.left) % 2, 1);
        assert_eq!(n.descendant_count(), count);
    }
}

#[test]
fn payload_updates_leave_structure_alone() {
    let mut tree = single_tree();
    let root = tree.create_root(node("R")).unwrap();
    let a = tree.append_to(&root, node("a")).unwrap();

    let updated = tree.update_payload(&a, b"renamed".to_vec()).unwrap();
    assert_eq!(updated.payload, b"renamed");
    let reloaded = tree.refresh(&a).unwrap();
    assert_eq!(reloaded, updated);
    assert_eq!((reloaded.left, reloaded.right, reloaded.level), (2, 3, 2));
}

#[test]
fn leaf_and_root_accessors() {
    let mut tree = single_tree();
    let root = tree.create_root(node("R")).unwrap();
    assert!(root.is_root());
    assert!(root.is_leaf());
    let a = tree.append_to(&root, node("a")).unwrap();
    let root = tree.refresh(&root).unwrap();
    assert!(root.is_root());
    assert!(!root.is_leaf());
    assert!(a.is_leaf());
    assert!(!a.is_root());
}
