//! Range predicates over node boundaries.
//!
//! Every tree relation is answered by a single `Query`: a conjunction of integer comparisons on
//! `left`/`right`/`level`, an optional tree scope, an ordering and a limit. Queries are plain
//! values built fresh per call, so nothing leaks between two relations evaluated back to back.

use std::cmp::Ordering;

use crate::ids::NodeId;
use crate::node::Node;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Column {
    Left,
    Right,
    Level,
}

impl Column {
    pub fn value_of(self, node: &Node) -> i64 {
        match self {
            Column::Left => node.left,
            Column::Right => node.right,
            Column::Level => node.level,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    pub fn eval(self, lhs: i64, rhs: i64) -> bool {
        match self {
            CmpOp::Eq => lhs == rhs,
            CmpOp::Lt => lhs < rhs,
            CmpOp::Le => lhs <= rhs,
            CmpOp::Gt => lhs > rhs,
            CmpOp::Ge => lhs >= rhs,
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Filter {
    pub column: Column,
    pub op: CmpOp,
    pub value: i64,
}

impl Filter {
    pub fn matches(&self, node: &Node) -> bool {
        self.op.eval(self.column.value_of(node), self.value)
    }
}

/// Result ordering. Ties are broken by id so every store returns the same sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Order {
    LeftAsc,
    RightAsc,
}

impl Order {
    pub fn column(self) -> Column {
        match self {
            Order::LeftAsc => Column::Left,
            Order::RightAsc => Column::Right,
        }
    }

    pub fn compare(self, a: &Node, b: &Node) -> Ordering {
        let column = self.column();
        column
            .value_of(a)
            .cmp(&column.value_of(b))
            .then_with(|| a.id.cmp(&b.id))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Query {
    pub filters: Vec<Filter>,
    /// Restrict to one tree (`root = scope`).
    pub scope: Option<NodeId>,
    pub order: Option<Order>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, column: Column, op: CmpOp, value: i64) -> Self {
        self.filters.push(Filter { column, op, value });
        self
    }

    pub fn scoped(mut self, scope: Option<NodeId>) -> Self {
        self.scope = scope;
        self
    }

    pub fn order_by(mut self, order: Order) -> Self {
        self.order = Some(order);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, node: &Node) -> bool {
        if let Some(scope) = self.scope {
            if node.root != Some(scope) {
                return false;
            }
        }
        self.filters.iter().all(|f| f.matches(node))
    }

    /// Apply ordering and limit to rows that already satisfy `matches`.
    pub fn finish(&self, mut rows: Vec<Node>) -> Vec<Node> {
        if let Some(order) = self.order {
            rows.sort_by(|a, b| order.compare(a, b));
        } else {
            rows.sort_by_key(|n| n.id);
        }
        if let Some(limit) = self.limit {
            rows.truncate(limit);
        }
        rows
    }

    /// Every node of one subtree, the owner included.
    pub(crate) fn subtree(node: &Node) -> Self {
        Query::new()
            .filter(Column::Left, CmpOp::Ge, node.left)
            .filter(Column::Right, CmpOp::Le, node.right)
            .scoped(node.root)
            .order_by(Order::LeftAsc)
    }

    /// Rows with `column >= key`, used by the boundary shifter.
    pub(crate) fn at_or_past(column: Column, key: i64, scope: Option<NodeId>) -> Self {
        Query::new().filter(column, CmpOp::Ge, key).scoped(scope)
    }

    /// Rows with `column` in the half-open range `[from, to)`.
    pub(crate) fn between(column: Column, from: i64, to: i64, scope: Option<NodeId>) -> Self {
        Query::new()
            .filter(column, CmpOp::Ge, from)
            .filter(column, CmpOp::Lt, to)
            .scoped(scope)
    }
}

/// Named tree relations understood by the translator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Relation {
    Descendants {
        depth: Option<i64>,
        include_self: bool,
    },
    Ancestors {
        depth: Option<i64>,
    },
    Parent,
    PrevSibling,
    NextSibling,
    Roots,
}

/// Read-only view handed to a `QueryObserver` before a relation executes.
#[derive(Clone, Copy, Debug)]
pub struct QueryContext<'a> {
    pub relation: Relation,
    /// `None` for relations that do not need an owner, such as `Roots`.
    pub owner: Option<&'a Node>,
}

/// Translate a relation into its range predicate.
///
/// `owner` scopes the result to the owner's tree whenever it carries a root.
pub fn translate(relation: Relation, owner: &Node) -> Query {
    let scope = owner.root;
    match relation {
        Relation::Descendants {
            depth,
            include_self,
        } => {
            let (left_op, right_op) = if include_self {
                (CmpOp::Ge, CmpOp::Le)
            } else {
                (CmpOp::Gt, CmpOp::Lt)
            };
            let mut query = Query::new()
                .filter(Column::Left, left_op, owner.left)
                .filter(Column::Right, right_op, owner.right)
                .order_by(Order::LeftAsc);
            if let Some(depth) = depth {
                query = query.filter(Column::Level, CmpOp::Le, owner.level + depth);
            }
            query.scoped(scope)
        }
        Relation::Ancestors { depth } => {
            let mut query = ancestors(owner).order_by(Order::LeftAsc);
            if let Some(depth) = depth {
                query = query.filter(Column::Level, CmpOp::Ge, owner.level - depth);
            }
            query.scoped(scope)
        }
        Relation::Parent => ancestors(owner)
            .order_by(Order::RightAsc)
            .limit(1)
            .scoped(scope),
        Relation::PrevSibling => Query::new()
            .filter(Column::Right, CmpOp::Eq, owner.left - 1)
            .limit(1)
            .scoped(scope),
        Relation::NextSibling => Query::new()
            .filter(Column::Left, CmpOp::Eq, owner.right + 1)
            .limit(1)
            .scoped(scope),
        Relation::Roots => roots(),
    }
}

/// Every root, across all trees.
pub fn roots() -> Query {
    Query::new()
        .filter(Column::Left, CmpOp::Eq, 1)
        .order_by(Order::LeftAsc)
}

fn ancestors(owner: &Node) -> Query {
    Query::new()
        .filter(Column::Left, CmpOp::Lt, owner.left)
        .filter(Column::Right, CmpOp::Gt, owner.right)
}
