use nestedset_core::MemoryStore;

nestedset_test_support::conformance_suite!(|_| MemoryStore::default());

#[test]
fn failing_store_counts_every_write() {
    use nestedset_core::{NestedSet, NestedSetConfig, NewNode};
    use nestedset_test_support::FailingStore;

    let store = FailingStore::new(MemoryStore::default());
    let mut tree = NestedSet::new(store, NestedSetConfig::single_tree());
    let root = tree.create_root(NewNode::new(b"R".to_vec())).unwrap();
    assert_eq!(tree.store().writes(), 1);

    // One shifted right boundary plus the new row.
    tree.append_to(&root, NewNode::new(b"C".to_vec())).unwrap();
    assert_eq!(tree.store().writes(), 3);

    tree.store().fail_on_write(1);
    assert!(tree.append_to(&root, NewNode::new(b"D".to_vec())).is_err());
    assert_eq!(tree.store().inner().len(), 2);
    assert!(!tree.store().inner().in_transaction());
}
