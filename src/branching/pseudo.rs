use crate::branching::pseudocost::FRACTION_EPSILON;
use crate::branching::{BranchCandidate, BranchDirection, BranchingNodeInfo, InfeasibleObject, RelaxationSnapshot, SelectionContext, SelectionStatus};
use crate::error::FatalError;
use crate::misc::HashMap;
use crate::model::MilpModel;
use crate::oracle::BoundingOracle;
use crate::tree_node::NodeId;

#[derive(Clone, Debug)]
/// Pseudocost branching on its own derivative table.
///
/// The derivatives are objective change per unit of fractional distance, learned
/// from `quality - parent quality` once a child finished bounding. They are kept
/// apart from the persistent [`PseudocostTable`](crate::branching::PseudocostTable).
pub struct PseudocostBranching {
    up_derivative: Vec<f64>,
    down_derivative: Vec<f64>,
    up_num: Vec<u32>,
    down_num: Vec<u32>,
    /// column -> position in the derivative arrays
    rev_relaxed: HashMap<usize, usize>,
    score_factor: f64,
    last_updated: Option<NodeId>,
}

impl PseudocostBranching {
    pub fn new(model: &MilpModel, score_factor: f64) -> Self {
        let num_objects = model.integer_objects().len();
        let rev_relaxed = model.integer_objects().iter()
            .enumerate()
            .map(|(position, object)| (object.column, position))
            .collect();

        PseudocostBranching {
            up_derivative: vec![0.0; num_objects],
            down_derivative: vec![0.0; num_objects],
            up_num: vec![0; num_objects],
            down_num: vec![0; num_objects],
            rev_relaxed,
            score_factor,
            last_updated: None,
        }
    }

    /// Folds the bound change observed at `node` into the derivative of the
    /// variable branched on to create it. Only the first call per node counts.
    pub fn update_statistics(&mut self, node: &BranchingNodeInfo) -> Result<(), FatalError> {
        let Some(parent_quality) = node.parent_quality else {
            return Ok(());
        };
        if self.last_updated == Some(node.node_id) {
            return Ok(());
        }

        let direction = BranchDirection::try_from(node.branched_direction)?;
        let Some(&position) = self.rev_relaxed.get(&node.branched_column) else {
            return Err(FatalError::InconsistentDescription { node: node.node_id, reason: "branched column is not an integer column" });
        };

        let value = node.branched_value;
        let distance = match direction {
            BranchDirection::Up => value.ceil() - value,
            BranchDirection::Down => value - value.floor(),
        };
        let derivative = (node.quality - parent_quality) / (distance + FRACTION_EPSILON);

        let (average, count) = match direction {
            BranchDirection::Up => (&mut self.up_derivative[position], &mut self.up_num[position]),
            BranchDirection::Down => (&mut self.down_derivative[position], &mut self.down_num[position]),
        };
        *average = (*average * f64::from(*count) + derivative) / f64::from(*count + 1);
        *count += 1;

        self.last_updated = Some(node.node_id);
        Ok(())
    }

    /// `(down, up)` derivative of `column` and how often each was observed
    pub fn derivative(&self, column: usize) -> Option<((f64, u32), (f64, u32))> {
        self.rev_relaxed.get(&column).map(|&p| ((self.down_derivative[p], self.down_num[p]), (self.up_derivative[p], self.up_num[p])))
    }

    /// `score_factor * max + (1 - score_factor) * min` of both derivatives
    pub fn score(&self, column: usize) -> f64 {
        self.derivative(column).map_or(0.0, |((down, _), (up, _))| {
            self.score_factor * up.max(down) + (1.0 - self.score_factor) * up.min(down)
        })
    }

    pub(crate) fn create_candidates<O: BoundingOracle>(
        &self,
        ctx: &SelectionContext<'_, O>,
        snapshot: &RelaxationSnapshot,
        infeasible: &[InfeasibleObject],
        candidates: &mut Vec<BranchCandidate>,
    ) -> SelectionStatus {
        for object in infeasible {
            let column = ctx.model.integer_objects()[object.object_index].column;
            let ((down, _), (up, _)) = self.derivative(column).unwrap_or(((0.0, 0), (0.0, 0)));

            let value = snapshot.solution[column];
            let up_estimate = up * (value.ceil() - value);
            let down_estimate = down * (value - value.floor());
            let direction = if up_estimate > down_estimate { BranchDirection::Up } else { BranchDirection::Down };

            let mut candidate = snapshot.candidate(ctx.model, object, direction, self.score(column));
            candidate.up_estimate = up_estimate;
            candidate.down_estimate = down_estimate;
            candidates.push(candidate);
        }

        if candidates.is_empty() { SelectionStatus::NoCandidates } else { SelectionStatus::Candidates }
    }
}
