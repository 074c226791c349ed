#![forbid(unsafe_code)]
//! SQLite storage for the nested-set engine.
//! `SqliteStore` keeps every node of a tree (or of a forest) in one table and maps the engine's
//! transaction primitive onto `BEGIN IMMEDIATE` / `COMMIT` / `ROLLBACK`, so concurrent writers on
//! the same database file are serialized by SQLite itself.

mod storage;
pub use storage::SqliteStore;

use std::path::Path;

use nestedset_core::{NestedSet, NestedSetConfig};

/// Open (or create) a database file and build an engine over it.
pub fn open_tree(
    path: impl AsRef<Path>,
    config: NestedSetConfig,
) -> nestedset_core::Result<NestedSet<SqliteStore>> {
    let store = SqliteStore::new(path, &config)?;
    Ok(NestedSet::new(store, config))
}

/// Engine over a private in-memory database.
pub fn in_memory_tree(config: NestedSetConfig) -> nestedset_core::Result<NestedSet<SqliteStore>> {
    let store = SqliteStore::new_in_memory(&config)?;
    Ok(NestedSet::new(store, config))
}
