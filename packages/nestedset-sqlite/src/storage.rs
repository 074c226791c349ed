use std::path::Path;

use nestedset_core::{
    error::Error, Column, NestedSetConfig, Node, NodeDraft, NodeId, NodePatch, NodeStore, Query,
};
use rusqlite::{params_from_iter, types::Value, Connection, OptionalExtension, Row};
use tracing::{debug, trace};

/// SQLite-backed `NodeStore` keeping one row per node in a single table.
///
/// Table and column names come from `NestedSetConfig` and are rendered into SQL once, when the
/// store is built.
pub struct SqliteStore {
    conn: Connection,
    sql: Statements,
}

/// Quoted identifiers and the fixed statements derived from them.
struct Statements {
    table: String,
    id: String,
    left: String,
    right: String,
    level: String,
    root: String,
    payload: String,
    select: String,
    forest: bool,
}

impl Statements {
    fn new(config: &NestedSetConfig) -> Self {
        let cols = &config.columns;
        let id = quote(&cols.id);
        let left = quote(&cols.left);
        let right = quote(&cols.right);
        let level = quote(&cols.level);
        let root = quote(&cols.root);
        let payload = quote(&cols.payload);
        let table = quote(&config.table);
        let select =
            format!("SELECT {id}, {left}, {right}, {level}, {root}, {payload} FROM {table}");
        Self {
            table,
            id,
            left,
            right,
            level,
            root,
            payload,
            select,
            forest: config.forest,
        }
    }

    fn column(&self, column: Column) -> &str {
        match column {
            Column::Left => &self.left,
            Column::Right => &self.right,
            Column::Level => &self.level,
        }
    }

    /// Render `query` into a statement plus its positional parameters.
    fn render(&self, query: &Query) -> (String, Vec<Value>) {
        let mut clauses = Vec::with_capacity(query.filters.len() + 1);
        let mut params = Vec::with_capacity(query.filters.len() + 1);
        for filter in &query.filters {
            clauses.push(format!("{} {} ?", self.column(filter.column), filter.op.as_sql()));
            params.push(Value::Integer(filter.value));
        }
        if let Some(scope) = query.scope {
            clauses.push(format!("{} = ?", self.root));
            // Ids above i64::MAX are never stored, so such a scope simply matches nothing.
            params.push(i64::try_from(scope.0).map_or(Value::Null, Value::Integer));
        }

        let mut sql = self.select.clone();
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        match query.order {
            Some(order) => {
                let column = self.column(order.column());
                sql.push_str(&format!(" ORDER BY {column} ASC, {} ASC", self.id));
            }
            None => sql.push_str(&format!(" ORDER BY {} ASC", self.id)),
        }
        if let Some(limit) = query.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        (sql, params)
    }
}

fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn storage_err(e: rusqlite::Error) -> Error {
    Error::Storage(e.to_string())
}

fn id_to_sql(id: NodeId) -> nestedset_core::Result<i64> {
    i64::try_from(id.0).map_err(|_| Error::Storage(format!("node id {id} overflows INTEGER")))
}

fn id_from_sql(idx: usize, value: i64) -> rusqlite::Result<NodeId> {
    u64::try_from(value)
        .map(NodeId)
        .map_err(|_| rusqlite::Error::IntegralValueOutOfRange(idx, value))
}

fn row_to_node(row: &Row<'_>) -> rusqlite::Result<Node> {
    let root: Option<i64> = row.get(4)?;
    Ok(Node {
        id: id_from_sql(0, row.get(0)?)?,
        left: row.get(1)?,
        right: row.get(2)?,
        level: row.get(3)?,
        root: root.map(|r| id_from_sql(4, r)).transpose()?,
        payload: row.get(5)?,
    })
}

impl SqliteStore {
    pub fn new_in_memory(config: &NestedSetConfig) -> nestedset_core::Result<Self> {
        let conn = Connection::open_in_memory().map_err(storage_err)?;
        Self::from_connection(conn, config)
    }

    pub fn new(path: impl AsRef<Path>, config: &NestedSetConfig) -> nestedset_core::Result<Self> {
        let conn = Connection::open(path).map_err(storage_err)?;
        Self::from_connection(conn, config)
    }

    /// Wrap an open connection, creating the node table if it does not exist yet.
    pub fn from_connection(
        conn: Connection,
        config: &NestedSetConfig,
    ) -> nestedset_core::Result<Self> {
        let store = Self {
            conn,
            sql: Statements::new(config),
        };
        store.ensure_schema()?;
        Ok(store)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn into_inner(self) -> Connection {
        self.conn
    }

    pub fn in_transaction(&self) -> bool {
        !self.conn.is_autocommit()
    }

    fn ensure_schema(&self) -> nestedset_core::Result<()> {
        let Statements {
            table,
            id,
            left,
            right,
            level,
            root,
            payload,
            forest,
            ..
        } = &self.sql;
        let base = table.trim_matches('"');
        // Boundary lookups are scoped by tree in a forest; otherwise the boundary leads.
        let (left_index, right_index, scope) = if *forest {
            (
                quote(&format!("idx_{base}_root_left")),
                quote(&format!("idx_{base}_root_right")),
                format!("{root}, "),
            )
        } else {
            (
                quote(&format!("idx_{base}_left")),
                quote(&format!("idx_{base}_right")),
                String::new(),
            )
        };
        self.conn
            .execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    {id} INTEGER PRIMARY KEY,
                    {left} INTEGER NOT NULL,
                    {right} INTEGER NOT NULL,
                    {level} INTEGER NOT NULL,
                    {root} INTEGER,
                    {payload} BLOB NOT NULL DEFAULT x''
                );
                CREATE INDEX IF NOT EXISTS {left_index} ON {table}({scope}{left});
                CREATE INDEX IF NOT EXISTS {right_index} ON {table}({scope}{right});"
            ))
            .map_err(storage_err)?;
        debug!(table = %table, "node table ready");
        Ok(())
    }

    fn execute(&self, sql: &str, params: Vec<Value>) -> nestedset_core::Result<usize> {
        trace!(sql, "execute");
        self.conn
            .execute(sql, params_from_iter(params))
            .map_err(storage_err)
    }
}

impl NodeStore for SqliteStore {
    fn begin(&mut self) -> nestedset_core::Result<()> {
        self.conn.execute_batch("BEGIN IMMEDIATE").map_err(storage_err)
    }

    fn commit(&mut self) -> nestedset_core::Result<()> {
        self.conn.execute_batch("COMMIT").map_err(storage_err)
    }

    fn rollback(&mut self) -> nestedset_core::Result<()> {
        self.conn.execute_batch("ROLLBACK").map_err(storage_err)
    }

    fn query(&self, query: &Query) -> nestedset_core::Result<Vec<Node>> {
        let (sql, params) = self.sql.render(query);
        trace!(sql = %sql, "query");
        let mut stmt = self.conn.prepare(&sql).map_err(storage_err)?;
        let rows = stmt
            .query_map(params_from_iter(params), row_to_node)
            .map_err(storage_err)?;

        let mut nodes = Vec::new();
        for node in rows {
            nodes.push(node.map_err(storage_err)?);
        }
        Ok(nodes)
    }

    fn get(&self, id: NodeId) -> nestedset_core::Result<Option<Node>> {
        let Ok(key) = i64::try_from(id.0) else {
            return Ok(None);
        };
        let sql = format!("{} WHERE {} = ?1", self.sql.select, self.sql.id);
        self.conn
            .query_row(&sql, [key], row_to_node)
            .optional()
            .map_err(storage_err)
    }

    fn create(&mut self, draft: &NodeDraft) -> nestedset_core::Result<NodeId> {
        let Statements {
            table,
            id,
            left,
            right,
            level,
            root,
            payload,
            ..
        } = &self.sql;
        let root_value = match draft.root {
            Some(r) => Value::Integer(id_to_sql(r)?),
            None => Value::Null,
        };
        let mut params = vec![
            Value::Integer(draft.left),
            Value::Integer(draft.right),
            Value::Integer(draft.level),
            root_value,
            Value::Blob(draft.payload.clone()),
        ];
        let sql = match draft.id {
            Some(node) => {
                params.push(Value::Integer(id_to_sql(node)?));
                format!(
                    "INSERT INTO {table} ({left}, {right}, {level}, {root}, {payload}, {id})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
                )
            }
            None => format!(
                "INSERT INTO {table} ({left}, {right}, {level}, {root}, {payload})
                 VALUES (?1, ?2, ?3, ?4, ?5)"
            ),
        };
        self.execute(&sql, params)?;
        match draft.id {
            Some(node) => Ok(node),
            None => id_from_sql(0, self.conn.last_insert_rowid()).map_err(storage_err),
        }
    }

    fn update(&mut self, id: NodeId, patch: &NodePatch) -> nestedset_core::Result<()> {
        let mut sets = Vec::new();
        let mut params = Vec::new();
        let integers = [
            (&self.sql.left, patch.left),
            (&self.sql.right, patch.right),
            (&self.sql.level, patch.level),
        ];
        for (column, value) in integers {
            if let Some(value) = value {
                sets.push(format!("{column} = ?"));
                params.push(Value::Integer(value));
            }
        }
        if let Some(root) = patch.root {
            sets.push(format!("{} = ?", self.sql.root));
            params.push(Value::Integer(id_to_sql(root)?));
        }
        if let Some(payload) = &patch.payload {
            sets.push(format!("{} = ?", self.sql.payload));
            params.push(Value::Blob(payload.clone()));
        }
        if sets.is_empty() {
            return match self.get(id)? {
                Some(_) => Ok(()),
                None => Err(Error::Storage(format!("update of missing node {id}"))),
            };
        }

        params.push(Value::Integer(id_to_sql(id)?));
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?",
            self.sql.table,
            sets.join(", "),
            self.sql.id
        );
        match self.execute(&sql, params)? {
            0 => Err(Error::Storage(format!("update of missing node {id}"))),
            _ => Ok(()),
        }
    }

    fn delete(&mut self, id: NodeId) -> nestedset_core::Result<()> {
        let sql = format!("DELETE FROM {} WHERE {} = ?1", self.sql.table, self.sql.id);
        match self.execute(&sql, vec![Value::Integer(id_to_sql(id)?)])? {
            0 => Err(Error::Storage(format!("delete of missing node {id}"))),
            _ => Ok(()),
        }
    }
}
