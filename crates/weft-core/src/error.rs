//! Error types for relation mutations and queries.
//!
//! Every validation failure aborts the enclosing store transaction; no
//! partial closure state is ever committed. [`RelationError::UnrecoverableCycle`]
//! is the one error that aborts an entire bulk reconstruction rather than a
//! single edge mutation.

use thiserror::Error;

use crate::relation::{NodeId, RelationId};

#[derive(Debug, Error)]
pub enum RelationError {
    /// `from == to` on a candidate edge. Rejected for every kind.
    #[error("a node cannot relate to itself (node {0})")]
    SelfRelation(NodeId),

    /// Endpoints belong to different projects and cross-project relations
    /// are disabled in the engine config.
    #[error("nodes {from} and {to} belong to different projects and cross-project relations are disabled")]
    CrossProjectNotAllowed { from: NodeId, to: NodeId },

    /// Endpoints are already connected through the hierarchy closure; a node
    /// may not be directly related to its own ancestor or descendant.
    #[error("nodes {from} and {to} already share a hierarchy")]
    SharedHierarchyConflict { from: NodeId, to: NodeId },

    /// The target node already has a direct hierarchy parent; a node has at
    /// most one.
    #[error("node {node} already has hierarchy parent {parent}")]
    ParentExists { node: NodeId, parent: NodeId },

    /// The candidate edge would close a cycle: `to` already reaches `from`.
    #[error("relating {from} to {to} would close a cycle")]
    CycleDetected { from: NodeId, to: NodeId },

    /// Malformed delay on a `precedes` edge.
    #[error("invalid delay {delay} on a precedes relation (must be non-negative)")]
    InvalidDelay { delay: i64 },

    /// A direct edge between these endpoints already exists.
    #[error("nodes {from} and {to} are already directly related")]
    DuplicateRelation { from: NodeId, to: NodeId },

    /// Delay was set on a relation whose kind is not `precedes`.
    #[error("relation {0} is not a precedes relation and carries no delay")]
    DelayNotApplicable(RelationId),

    /// Clients may only destroy direct edges; closure rows are derived.
    #[error("relation {0} is a derived closure row, not a direct edge")]
    NotDirect(RelationId),

    #[error("relation not found: {0}")]
    RelationNotFound(RelationId),

    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    /// Bulk reconstruction found a cycle that persists after every removable
    /// non-hierarchy edge among the offending pairs was removed. Requires
    /// manual intervention; never silently resolved.
    #[error("cycle persists after removing all removable non-hierarchy edges: {pairs:?}")]
    UnrecoverableCycle { pairs: Vec<(NodeId, NodeId)> },

    #[error("relation store error: {0}")]
    Store(#[from] rusqlite::Error),
}
