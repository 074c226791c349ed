#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Column bindings for the structural fields of a node row.
///
/// The engine itself never looks at these names; they are handed to backing stores once at
/// construction so they can render their own statements.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ColumnNames {
    pub id: String,
    pub left: String,
    pub right: String,
    pub level: String,
    pub root: String,
    pub payload: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            id: "id".into(),
            left: "lft".into(),
            right: "rgt".into(),
            level: "level".into(),
            root: "root".into(),
            payload: "payload".into(),
        }
    }
}

/// Engine configuration, resolved once when a `NestedSet` or a store is built.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct NestedSetConfig {
    /// Multiple independent trees, distinguished by the `root` column.
    pub forest: bool,
    pub table: String,
    pub columns: ColumnNames,
}

impl Default for NestedSetConfig {
    fn default() -> Self {
        Self::single_tree()
    }
}

impl NestedSetConfig {
    pub fn single_tree() -> Self {
        Self {
            forest: false,
            table: "nested_set".into(),
            columns: ColumnNames::default(),
        }
    }

    pub fn forest() -> Self {
        Self {
            forest: true,
            ..Self::single_tree()
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn with_columns(mut self, columns: ColumnNames) -> Self {
        self.columns = columns;
        self
    }
}
