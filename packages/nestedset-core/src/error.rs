use thiserror::Error;

use crate::ids::NodeId;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("storage error: {0}")]
    Storage(String),
    #[error("node {0} is already persisted")]
    NotNew(NodeId),
    #[error("node {0} does not exist or was deleted")]
    NotFound(NodeId),
    #[error("the target node should not be the node itself")]
    TargetIsSelf,
    #[error("the target node {0} is a descendant of the node being moved")]
    TargetIsDescendant(NodeId),
    #[error("the target node {0} is a root and cannot receive siblings")]
    TargetIsRoot(NodeId),
    #[error("node {0} already is a root node")]
    AlreadyRoot(NodeId),
    #[error("cannot create more than one root in single-root mode")]
    RootExists,
    #[error("operation requires forest mode")]
    ForestModeDisabled,
    #[error("node {0} has no tree scope but forest mode requires one")]
    MissingTreeScope(NodeId),
    #[error("query rejected: {0}")]
    QueryRejected(String),
    #[error("mutation rejected: {0}")]
    MutationRejected(String),
    #[error("inconsistent state: {0}")]
    InconsistentState(String),
}

impl Error {
    /// True for errors raised before any transaction was opened.
    pub fn is_precondition(&self) -> bool {
        !matches!(self, Error::Storage(_) | Error::InconsistentState(_))
    }
}
