//! Boundary shifting: opening and closing gaps on a tree's integer line.
//!
//! Left and right boundaries are shifted in two separate passes. A node can have its right
//! boundary past the pivot while its left is not (every ancestor of the gap), so each pass
//! selects and rewrites exactly one column.

use tracing::trace;

use crate::error::Result;
use crate::ids::NodeId;
use crate::node::NodePatch;
use crate::query::{Column, Query};
use crate::traits::NodeStore;

/// Add `delta` to every boundary `>= key` in `scope`. Returns the number of row writes.
pub(crate) fn shift<S: NodeStore>(
    store: &mut S,
    scope: Option<NodeId>,
    key: i64,
    delta: i64,
) -> Result<usize> {
    let mut writes = 0;
    for column in [Column::Left, Column::Right] {
        writes += shift_column(store, column, &Query::at_or_past(column, key, scope), delta)?;
    }
    trace!(?scope, key, delta, writes, "shifted boundaries");
    Ok(writes)
}

/// Add `delta` to every boundary in `[from, to)` in `scope`.
pub(crate) fn shift_between<S: NodeStore>(
    store: &mut S,
    scope: Option<NodeId>,
    from: i64,
    to: i64,
    delta: i64,
) -> Result<usize> {
    let mut writes = 0;
    for column in [Column::Left, Column::Right] {
        writes += shift_column(store, column, &Query::between(column, from, to, scope), delta)?;
    }
    trace!(?scope, from, to, delta, writes, "shifted boundary range");
    Ok(writes)
}

fn shift_column<S: NodeStore>(
    store: &mut S,
    column: Column,
    query: &Query,
    delta: i64,
) -> Result<usize> {
    if delta == 0 {
        return Ok(0);
    }
    let rows = store.query(query)?;
    for row in &rows {
        let patch = match column {
            Column::Left => NodePatch::default().left(row.left + delta),
            Column::Right => NodePatch::default().right(row.right + delta),
            Column::Level => NodePatch::default().level(row.level + delta),
        };
        store.update(row.id, &patch)?;
    }
    Ok(rows.len())
}
