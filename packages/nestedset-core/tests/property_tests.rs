use proptest::prelude::*;
use nestedset_core::{flatten, MemoryStore, NestedSet, NestedSetConfig, NewNode, Node};

#[derive(Clone, Debug)]
enum Step {
    Append(usize),
    Prepend(usize),
    InsertBefore(usize),
    InsertAfter(usize),
    MoveBefore(usize, usize),
    MoveAfter(usize, usize),
    MoveAsFirst(usize, usize),
    MoveAsLast(usize, usize),
    MoveAsRoot(usize),
    NewRoot,
    Delete(usize),
}

fn step() -> impl Strategy<Value = Step> {
    let idx = 0usize..32;
    prop_oneof![
        3 => idx.clone().prop_map(Step::Append),
        2 => idx.clone().prop_map(Step::Prepend),
        2 => idx.clone().prop_map(Step::InsertBefore),
        2 => idx.clone().prop_map(Step::InsertAfter),
        2 => (idx.clone(), idx.clone()).prop_map(|(a, b)| Step::MoveBefore(a, b)),
        2 => (idx.clone(), idx.clone()).prop_map(|(a, b)| Step::MoveAfter(a, b)),
        2 => (idx.clone(), idx.clone()).prop_map(|(a, b)| Step::MoveAsFirst(a, b)),
        2 => (idx.clone(), idx.clone()).prop_map(|(a, b)| Step::MoveAsLast(a, b)),
        1 => idx.clone().prop_map(Step::MoveAsRoot),
        1 => Just(Step::NewRoot),
        1 => idx.prop_map(Step::Delete),
    ]
}

fn pick(rows: &[Node], i: usize) -> Option<Node> {
    if rows.is_empty() {
        None
    } else {
        Some(rows[i % rows.len()].clone())
    }
}

fn run(tree: &mut NestedSet<MemoryStore>, step: &Step) -> Result<(), TestCaseError> {
    let rows: Vec<Node> = tree.store().rows().cloned().collect();
    let new = || NewNode::new(b"n".to_vec());
    let outcome = match step {
        Step::NewRoot => tree.create_root(new()).map(drop),
        Step::Append(t) | Step::Prepend(t) | Step::InsertBefore(t) | Step::InsertAfter(t) => {
            let Some(target) = pick(&rows, *t) else {
                return Ok(());
            };
            match step {
                Step::Append(_) => tree.append_to(&target, new()),
                Step::Prepend(_) => tree.prepend_to(&target, new()),
                Step::InsertBefore(_) => tree.insert_before(&target, new()),
                _ => tree.insert_after(&target, new()),
            }
            .map(drop)
        }
        Step::MoveBefore(n, t)
        | Step::MoveAfter(n, t)
        | Step::MoveAsFirst(n, t)
        | Step::MoveAsLast(n, t) => {
            let (Some(node), Some(target)) = (pick(&rows, *n), pick(&rows, *t)) else {
                return Ok(());
            };
            match step {
                Step::MoveBefore(..) => tree.move_before(&node, &target),
                Step::MoveAfter(..) => tree.move_after(&node, &target),
                Step::MoveAsFirst(..) => tree.move_as_first(&node, &target),
                _ => tree.move_as_last(&node, &target),
            }
            .map(drop)
        }
        Step::MoveAsRoot(n) => {
            let Some(node) = pick(&rows, *n) else {
                return Ok(());
            };
            tree.move_as_root(&node).map(drop)
        }
        Step::Delete(n) => {
            let Some(node) = pick(&rows, *n) else {
                return Ok(());
            };
            tree.delete(node).map(drop)
        }
    };

    match outcome {
        Ok(()) => {}
        Err(err) => {
            prop_assert!(err.is_precondition(), "unexpected error: {err}");
            let after: Vec<Node> = tree.store().rows().cloned().collect();
            prop_assert_eq!(after, rows, "rejected {:?} changed the store", step);
        }
    }
    prop_assert!(!tree.store().in_transaction());
    Ok(())
}

fn check_shape(tree: &NestedSet<MemoryStore>) -> Result<(), TestCaseError> {
    if let Err(err) = tree.validate_invariants() {
        return Err(TestCaseError::fail(err.to_string()));
    }
    let rows: Vec<Node> = tree.store().rows().cloned().collect();
    for a in &rows {
        prop_assert!(a.left < a.right);
        for b in &rows {
            if a.id == b.id || a.root != b.root {
                continue;
            }
            let disjoint = a.right < b.left || b.right < a.left;
            let nested = a.is_descendant_of(b) || b.is_descendant_of(a);
            prop_assert!(disjoint || nested, "{:?} and {:?} overlap", a, b);
        }
    }
    for root in tree.roots().map_err(|e| TestCaseError::fail(e.to_string()))? {
        let all = tree
            .descendants(&root, None, true)
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(all.len() as i64, root.descendant_count() + 1);
        prop_assert_eq!(flatten(&all.to_tree()), all.into_flat());
    }
    Ok(())
}

proptest! {
    #[test]
    fn random_sequences_keep_single_tree_well_formed(steps in prop::collection::vec(step(), 1..40)) {
        let mut tree = NestedSet::new(MemoryStore::default(), NestedSetConfig::single_tree());
        tree.create_root(NewNode::new(b"root".to_vec())).unwrap();
        for step in &steps {
            run(&mut tree, step)?;
            check_shape(&tree)?;
        }
    }

    #[test]
    fn random_sequences_keep_forest_well_formed(steps in prop::collection::vec(step(), 1..40)) {
        let mut tree = NestedSet::new(MemoryStore::default(), NestedSetConfig::forest());
        tree.create_root(NewNode::new(b"a".to_vec())).unwrap();
        tree.create_root(NewNode::new(b"b".to_vec())).unwrap();
        for step in &steps {
            run(&mut tree, step)?;
            check_shape(&tree)?;
        }
    }
}
