use thiserror::Error;
use crate::oracle::LpStatus;
use crate::tree_node::{NodeId, NodeStatus};

/// Broken invariant of the node state machine or the branching subsystem.
///
/// Expected outcomes (infeasible relaxations, cutoffs, limits) are never reported
/// through this type, they are status values. A `FatalError` aborts the search.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FatalError {
    #[error("node {node} cannot be processed in status {status:?}")]
    InvalidNodeState { node: NodeId, status: NodeStatus },

    #[error("branch direction {0} is neither -1 nor +1")]
    InvalidBranchDirection(i32),

    #[error("bounding oracle returned unexpected status {status:?} at node {node}")]
    UnexpectedOracleStatus { node: NodeId, status: LpStatus },

    #[error("node {0} is not part of the tree")]
    UnknownNode(NodeId),

    #[error("node {0} must be pregnant to branch")]
    NodeNotPregnant(NodeId),

    #[error("node {0} has no installed branch object")]
    MissingBranchObject(NodeId),

    #[error("pseudocost weight {0} is outside [0, 1]")]
    InvalidWeight(f64),

    #[error("description of node {node} is inconsistent: {reason}")]
    InconsistentDescription { node: NodeId, reason: &'static str },
}
