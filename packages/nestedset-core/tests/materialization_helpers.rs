use nestedset_core::{
    build_tree, flatten, MemoryStore, NestedSet, NestedSetConfig, NewNode, Node, TreeNode,
};

fn node(payload: &str) -> NewNode {
    NewNode::new(payload.as_bytes().to_vec())
}

fn labels(forest: &[TreeNode]) -> Vec<String> {
    forest
        .iter()
        .map(|t| {
            let name = String::from_utf8_lossy(&t.node.payload).into_owned();
            if t.children.is_empty() {
                name
            } else {
                format!("{name}({})", labels(&t.children).join(","))
            }
        })
        .collect()
}

/// R
/// ├── a
/// │   ├── a1
/// │   └── a2
/// │       └── a21
/// └── b
fn sample(tree: &mut NestedSet<MemoryStore>) -> (Node, Node) {
    let root = tree.create_root(node("R")).unwrap();
    let a = tree.append_to(&root, node("a")).unwrap();
    tree.append_to(&root, node("b")).unwrap();
    tree.append_to(&a, node("a1")).unwrap();
    let a2 = tree.append_to(&a, node("a2")).unwrap();
    tree.append_to(&a2, node("a21")).unwrap();
    (root, a)
}

#[test]
fn descendants_materialize_into_nested_tree() {
    let mut tree = NestedSet::new(MemoryStore::default(), NestedSetConfig::single_tree());
    let (root, _) = sample(&mut tree);

    let all = tree.descendants(&root, None, true).unwrap();
    assert_eq!(labels(&all.to_tree()), vec!["R(a(a1,a2(a21)),b)"]);

    let below = tree.descendants(&root, None, false).unwrap();
    assert_eq!(labels(&below.to_tree()), vec!["a(a1,a2(a21))", "b"]);
}

#[test]
fn depth_limited_descendants_drop_deeper_levels() {
    let mut tree = NestedSet::new(MemoryStore::default(), NestedSetConfig::single_tree());
    let (root, a) = sample(&mut tree);

    let shallow = tree.descendants(&root, Some(1), true).unwrap();
    assert_eq!(labels(&shallow.to_tree()), vec!["R(a,b)"]);

    let under_a = tree.descendants(&a, Some(1), false).unwrap();
    assert_eq!(labels(&under_a.to_tree()), vec!["a1", "a2"]);
}

#[test]
fn flatten_restores_pre_order_rows() {
    let mut tree = NestedSet::new(MemoryStore::default(), NestedSetConfig::single_tree());
    let (root, _) = sample(&mut tree);

    let rows = tree.descendants(&root, None, true).unwrap();
    let nested = rows.to_tree();
    assert_eq!(flatten(&nested), rows.as_flat());
    assert_eq!(build_tree(&flatten(&nested)), nested);
}

#[test]
fn materialized_tree_follows_moves() {
    let mut tree = NestedSet::new(MemoryStore::default(), NestedSetConfig::single_tree());
    let (root, a) = sample(&mut tree);
    let b = tree.next_sibling(&a).unwrap().unwrap();
    tree.move_as_first(&b, &a).unwrap();

    let all = tree.descendants(&root, None, true).unwrap();
    assert_eq!(labels(&all.to_tree()), vec!["R(a(b,a1,a2(a21)))"]);
}

#[test]
fn forest_rows_never_nest_across_trees() {
    let mut tree = NestedSet::new(MemoryStore::default(), NestedSetConfig::forest());
    let a = tree.create_root(node("A")).unwrap();
    tree.append_to(&a, node("a1")).unwrap();
    let b = tree.create_root(node("B")).unwrap();
    tree.append_to(&b, node("b1")).unwrap();

    // Interleave two trees whose intervals overlap: grouping by scope must win.
    let mut rows: Vec<Node> = tree.store().rows().cloned().collect();
    rows.sort_by_key(|n| (n.root, n.left));
    assert_eq!(labels(&build_tree(&rows)), vec!["A(a1)", "B(b1)"]);
}
