use std::fmt::{Display, Formatter};
use crate::branching::BranchCandidate;
use crate::error::FatalError;

pub mod constraint_pool;
pub mod node_desc;
mod lifecycle;

pub use constraint_pool::{ConstraintId, ConstraintPool, CutFilter, CutGeneratorSlot, CutRejection};
pub use lifecycle::*;
pub use node_desc::{BoundPatch, BoundPatches, ConstraintDelta, NodeDescription, SubProblem};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
/// Stable index of a node in the [`NodeArena`]
pub struct NodeId(pub u32);

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeStatus {
    Candidate,
    Evaluated,
    Pregnant,
    Branched,
    Fathomed,
    Discarded,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FathomReason {
    Infeasible,
    Cutoff,
    Gap,
    IntegerFeasible,
}

impl Display for FathomReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FathomReason::Infeasible => write!(f, "infeasible"),
            FathomReason::Cutoff => write!(f, "cutoff"),
            FathomReason::Gap => write!(f, "gap"),
            FathomReason::IntegerFeasible => write!(f, "integer"),
        }
    }
}

#[derive(Clone, Debug)]
/// Node of the search tree
/// Holds all information about its state
pub struct TreeNode {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub depth: u32,
    pub status: NodeStatus,
    /// relaxation bound, the parent's until the node is bounded
    pub quality: f64,
    pub solution_estimate: f64,
    pub description: NodeDescription,
    /// committed branching decision of a pregnant or branched node
    pub branch_object: Option<BranchCandidate>,
    pub diving: bool,
    num_live_children: usize,
}

impl TreeNode {
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn num_live_children(&self) -> usize {
        self.num_live_children
    }

    pub(crate) fn fathom(&mut self) {
        self.status = NodeStatus::Fathomed;
    }
}

/// Owns all nodes of the search tree.
///
/// Parents are referenced by id only. A node is removed once it is a leaf, and a
/// branched parent follows as soon as its last child is gone, so every live
/// node can always walk to its explicit ancestor.
#[derive(Clone, Debug, Default)]
pub struct NodeArena {
    nodes: Vec<Option<TreeNode>>,
    live: usize,
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the root in `Candidate` status with an unknown bound
    pub fn insert_root(&mut self, description: NodeDescription) -> NodeId {
        self.insert(None, 0, f64::NEG_INFINITY, description)
    }

    /// Creates a `Candidate` below `parent`, inheriting its bound
    pub fn insert_child(&mut self, parent: NodeId, description: NodeDescription) -> Result<NodeId, FatalError> {
        let parent_node = self.get_mut(parent)?;
        parent_node.num_live_children += 1;
        let (depth, quality) = (parent_node.depth + 1, parent_node.quality);
        Ok(self.insert(Some(parent), depth, quality, description))
    }

    fn insert(&mut self, parent: Option<NodeId>, depth: u32, quality: f64, description: NodeDescription) -> NodeId {
        #[allow(clippy::cast_possible_truncation)]
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Some(TreeNode {
            id,
            parent,
            depth,
            status: NodeStatus::Candidate,
            quality,
            solution_estimate: quality,
            description,
            branch_object: None,
            diving: false,
            num_live_children: 0,
        }));
        self.live += 1;
        id
    }

    pub fn get(&self, id: NodeId) -> Result<&TreeNode, FatalError> {
        self.nodes.get(id.0 as usize)
            .and_then(Option::as_ref)
            .ok_or(FatalError::UnknownNode(id))
    }

    pub fn get_mut(&mut self, id: NodeId) -> Result<&mut TreeNode, FatalError> {
        self.nodes.get_mut(id.0 as usize)
            .and_then(Option::as_mut)
            .ok_or(FatalError::UnknownNode(id))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_ok()
    }

    /// Number of nodes still held
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Ids from the nearest explicit ancestor down to `id`
    pub fn path_to_explicit(&self, id: NodeId) -> Result<Vec<NodeId>, FatalError> {
        let mut path = vec![id];
        let mut current = self.get(id)?;

        while !current.description.explicit {
            let Some(parent) = current.parent else {
                return Err(FatalError::InconsistentDescription { node: id, reason: "no explicit ancestor" });
            };
            path.push(parent);
            current = self.get(parent)?;
        }

        path.reverse();
        Ok(path)
    }

    /// Full subproblem of `id`, folding the descriptions along its path.
    /// The warm start is the node's own.
    pub fn reconstruct(&self, id: NodeId, num_cols: usize, num_rows: usize) -> Result<SubProblem, FatalError> {
        let path = self.path_to_explicit(id)?;
        let descriptions = path.iter()
            .map(|p| self.get(*p).map(|n| &n.description))
            .collect::<Result<Vec<_>, _>>()?;

        let mut sub = SubProblem::fold(num_cols, num_rows, descriptions);
        sub.basis = self.get(id)?.description.basis.clone();
        Ok(sub)
    }

    /// Replaces the description of `id` by its full reconstruction
    pub fn convert_to_explicit(&mut self, id: NodeId, num_cols: usize, num_rows: usize) -> Result<(), FatalError> {
        if self.get(id)?.description.explicit {
            return Ok(());
        }
        let full = self.reconstruct(id, num_cols, num_rows)?;
        let node = self.get_mut(id)?;

        let mut description = NodeDescription::explicit_from(&full);
        description.branched_direction = node.description.branched_direction;
        description.branched_object = node.description.branched_object;
        description.branched_column = node.description.branched_column;
        description.branched_value = node.description.branched_value;
        node.description = description;
        Ok(())
    }

    /// Removes a leaf, then every branched ancestor left without children
    pub fn remove(&mut self, id: NodeId) -> Result<(), FatalError> {
        let node = self.get(id)?;
        if node.num_live_children > 0 {
            return Err(FatalError::InvalidNodeState { node: id, status: node.status });
        }

        let mut next = Some(id);
        while let Some(current) = next {
            let node = self.nodes[current.0 as usize].take().ok_or(FatalError::UnknownNode(current))?;
            self.live -= 1;
            next = None;

            if let Some(parent_id) = node.parent {
                let parent = self.get_mut(parent_id)?;
                parent.num_live_children -= 1;
                if parent.num_live_children == 0 && parent.status == NodeStatus::Branched {
                    next = Some(parent_id);
                }
            }
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &TreeNode> {
        self.nodes.iter().flatten()
    }
}
