use crate::branching::{BranchCandidate, InfeasibleObject, RelaxationSnapshot, SelectionContext, SelectionStatus};
use crate::oracle::BoundingOracle;

/// Every infeasible object becomes a candidate scored by its infeasibility.
/// No re-solves.
pub(crate) fn create_candidates<O: BoundingOracle>(
    ctx: &SelectionContext<'_, O>,
    snapshot: &RelaxationSnapshot,
    infeasible: &[InfeasibleObject],
    candidates: &mut Vec<BranchCandidate>,
) -> SelectionStatus {
    candidates.extend(infeasible.iter()
        .map(|object| snapshot.candidate(ctx.model, object, object.direction, object.infeasibility)));

    if candidates.is_empty() {
        SelectionStatus::NoCandidates
    } else {
        SelectionStatus::Candidates
    }
}
