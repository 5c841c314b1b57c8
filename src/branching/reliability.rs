use crate::branching::strong::{evaluate_in_order, StrongCandidateSlots};
use crate::branching::{BranchCandidate, BranchDirection, InfeasibleObject, RelaxationSnapshot, SelectionContext, SelectionStatus};
use crate::oracle::BoundingOracle;

/// Pseudocost branching that warms up unreliable variables with strong branching.
///
/// A variable is reliable once both of its sides were observed at least
/// `reliability` times. Unreliable variables are evaluated with trial re-solves,
/// which feed the pseudocost table, then every infeasible variable is scored
/// by its pseudocost.
pub(crate) fn create_candidates<O: BoundingOracle>(
    ctx: &mut SelectionContext<'_, O>,
    snapshot: &RelaxationSnapshot,
    infeasible: &[InfeasibleObject],
    candidates: &mut Vec<BranchCandidate>,
) -> SelectionStatus {
    let mut unreliable = StrongCandidateSlots::new(ctx.settings.strong_candidate_size);
    for object in infeasible {
        let column = ctx.model.integer_objects()[object.object_index].column;
        if ctx.pseudocosts.min_count(column) < ctx.settings.reliability {
            unreliable.offer(object.infeasibility, *object);
        }
    }

    if !unreliable.is_empty() {
        // trial candidates are only used to warm up the table
        let look_ahead = ctx.settings.look_ahead;
        let mut warm_up = Vec::new();
        let status = evaluate_in_order(ctx, snapshot, unreliable.into_items(), infeasible.len(), Some(look_ahead), &mut warm_up);
        if status != SelectionStatus::Candidates {
            return status;
        }
    }

    for object in infeasible {
        let column = ctx.model.integer_objects()[object.object_index].column;
        let record = ctx.pseudocosts.record_mut(column);
        let direction = if record.up_cost() > record.down_cost() { BranchDirection::Up } else { BranchDirection::Down };

        let value = snapshot.solution[column];
        let up_estimate = record.up_cost() * (value.ceil() - value);
        let down_estimate = record.down_cost() * (value - value.floor());

        let mut candidate = snapshot.candidate(ctx.model, object, direction, record.score());
        candidate.up_estimate = up_estimate;
        candidate.down_estimate = down_estimate;
        candidates.push(candidate);
    }

    SelectionStatus::Candidates
}
