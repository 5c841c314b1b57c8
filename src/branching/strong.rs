use itertools::Itertools;
use crate::branching::{BranchCandidate, BranchDirection, InfeasibleObject, RelaxationSnapshot, SelectionContext, SelectionStatus};
use crate::oracle::{BoundingOracle, LpStatus, WarmStartBasis};
use crate::ui::{StrongBranchingUIState, UIUserMessage};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Classification of one trial re-solve
pub enum TrialStatus {
    Optimal,
    /// primal infeasible or stopped at the dual objective limit
    Infeasible,
    /// iteration limit without reaching the dual objective limit
    Unknown,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrialResult {
    pub status: TrialStatus,
    /// objective change, `f64::INFINITY` if the side is closed, always finite for `Unknown`
    pub degradation: f64,
    pub num_integer_infeasible: usize,
    pub found_solution: bool,
}

impl TrialResult {
    /// The side needs no child: infeasible, cut off or solved integrally.
    /// An unresolved trial never closes its side.
    pub fn closes_side(&self) -> bool {
        match self.status {
            TrialStatus::Infeasible => true,
            TrialStatus::Optimal => self.degradation == f64::INFINITY,
            TrialStatus::Unknown => false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// What both trials of one candidate imply
pub enum StrongVerdict {
    /// both sides open
    Branchable,
    /// up side closed, the variable is restricted to the down pair
    FixedDown,
    /// down side closed, the variable is restricted to the up pair
    FixedUp,
    /// both sides closed
    NodeInfeasible,
}

/// Trial re-solves around a relaxation in optimal state.
///
/// `begin` saves bounds, primal solution, warm start and the hot-start iteration
/// limit and marks the hot start. Every trial perturbs one bound and restores the
/// saved bounds afterwards. `finish` unmarks the hot start and restores the rest.
pub struct StrongBranchingEvaluator {
    snapshot: RelaxationSnapshot,
    saved_basis: Option<WarmStartBasis>,
    saved_iteration_limit: usize,
    num_trials: usize,
}

impl StrongBranchingEvaluator {
    /// `iteration_limit` replaces the hot-start limit until `finish`
    pub fn begin<O: BoundingOracle>(oracle: &mut O, iteration_limit: Option<usize>) -> Self {
        let snapshot = RelaxationSnapshot::take(oracle);
        let saved_basis = oracle.warm_start();
        let saved_iteration_limit = oracle.hot_start_iteration_limit();

        if let Some(limit) = iteration_limit {
            oracle.set_hot_start_iteration_limit(limit);
        }
        oracle.mark_hot_start();

        StrongBranchingEvaluator {
            snapshot,
            saved_basis,
            saved_iteration_limit,
            num_trials: 0,
        }
    }

    /// Objective of the relaxation the trials are compared against
    pub fn objective_value(&self) -> f64 {
        self.snapshot.objective
    }

    pub fn num_trials(&self) -> usize {
        self.num_trials
    }

    /// Runs the down and the up trial of `candidate`.
    ///
    /// Each trial writes only its own side of the candidate.
    pub fn evaluate<O: BoundingOracle>(&mut self, ctx: &mut SelectionContext<'_, O>, candidate: &mut BranchCandidate) -> StrongVerdict {
        let down = self.trial(ctx, candidate, BranchDirection::Down);
        candidate.down_estimate = down.degradation;
        candidate.num_inf_down = down.num_integer_infeasible;
        candidate.finished_down = down.status == TrialStatus::Optimal;

        let up = self.trial(ctx, candidate, BranchDirection::Up);
        candidate.up_estimate = up.degradation;
        candidate.num_inf_up = up.num_integer_infeasible;
        candidate.finished_up = up.status == TrialStatus::Optimal;

        // cheaper side first
        candidate.direction = if candidate.up_estimate <= candidate.down_estimate { BranchDirection::Up } else { BranchDirection::Down };

        match (down.closes_side(), up.closes_side()) {
            (false, false) => StrongVerdict::Branchable,
            (false, true) => StrongVerdict::FixedDown,
            (true, false) => StrongVerdict::FixedUp,
            (true, true) => StrongVerdict::NodeInfeasible,
        }
    }

    /// Single trial: tighten one bound, solve from hot start, classify, restore.
    pub fn trial<O: BoundingOracle>(&mut self, ctx: &mut SelectionContext<'_, O>, candidate: &BranchCandidate, direction: BranchDirection) -> TrialResult {
        let column = candidate.variable_index;
        let (lower, upper) = candidate.bounds(direction);
        let saved = (self.snapshot.lower[column], self.snapshot.upper[column]);

        ctx.oracle.set_column_bounds(column, lower, upper);
        let lp_status = ctx.oracle.solve_from_hot_start();
        self.num_trials += 1;

        let new_objective = ctx.oracle.objective_value();
        let mut result = TrialResult {
            status: TrialStatus::Infeasible,
            degradation: f64::INFINITY,
            num_integer_infeasible: match direction {
                BranchDirection::Down => candidate.num_inf_down,
                BranchDirection::Up => candidate.num_inf_up,
            },
            found_solution: false,
        };

        match lp_status {
            LpStatus::Optimal => {
                result.status = TrialStatus::Optimal;

                let solution = ctx.oracle.column_solution();
                result.num_integer_infeasible = ctx.model.num_integer_infeasible(
                    solution, ctx.oracle.column_lower(), ctx.oracle.column_upper(), ctx.integer_tolerance, ctx.settings.break_even);

                if result.num_integer_infeasible == 0 {
                    // the side is solved, nothing left to branch on there
                    let solution = solution.to_vec();
                    result.found_solution = ctx.incumbent.register_solution(&solution, new_objective);
                    if result.found_solution {
                        ctx.oracle.set_cutoff(new_objective);
                        ctx.ui.send(UIUserMessage::Log(format!("strong branching found solution {new_objective}")));
                    }
                } else if new_objective < ctx.incumbent.incumbent_value() {
                    result.degradation = new_objective - self.snapshot.objective;
                    ctx.pseudocosts.update(column, direction, result.degradation, candidate.value);
                }
            }
            // iteration limit without dual objective limit
            LpStatus::IterationLimit => {
                result.status = TrialStatus::Unknown;
                // the objective at the limit may be undefined
                let change = new_objective - self.snapshot.objective;
                result.degradation = if change.is_finite() { change } else { 0.0 };
            }
            LpStatus::PrimalInfeasible | LpStatus::DualInfeasible | LpStatus::DualObjectiveLimit | LpStatus::Abandoned => {}
        }

        ctx.oracle.set_column_bounds(column, saved.0, saved.1);
        result
    }

    pub fn finish<O: BoundingOracle>(self, oracle: &mut O) {
        oracle.unmark_hot_start();
        oracle.set_column_solution(&self.snapshot.solution);
        oracle.set_hot_start_iteration_limit(self.saved_iteration_limit);
        if let Some(basis) = &self.saved_basis {
            oracle.set_warm_start(basis);
        }
    }
}

/// Keeps the `k` highest scores seen so far.
///
/// A new entry fills an empty slot if there is one, otherwise it replaces the
/// lowest held score when it is strictly higher.
#[derive(Clone, Debug)]
pub struct StrongCandidateSlots<T> {
    slots: Vec<Option<(f64, T)>>,
    least: usize,
    min_score: f64,
}

impl<T> StrongCandidateSlots<T> {
    pub fn new(k: usize) -> Self {
        StrongCandidateSlots {
            slots: (0..k).map(|_| None).collect(),
            least: 0,
            min_score: 0.0,
        }
    }

    /// Returns true if `item` was retained
    pub fn offer(&mut self, score: f64, item: T) -> bool {
        if self.slots.is_empty() || score <= self.min_score {
            return false;
        }

        self.slots[self.least] = Some((score, item));

        if let Some(empty) = self.slots.iter().position(Option::is_none) {
            self.least = empty;
            self.min_score = 0.0;
        } else if let Some((position, min)) = self.slots.iter()
            .filter_map(|s| s.as_ref().map(|(score, _)| *score))
            .enumerate()
            .min_by(|(_, a), (_, b)| a.total_cmp(b))
        {
            self.least = position;
            self.min_score = min;
        }
        true
    }

    pub fn scores(&self) -> Vec<f64> {
        self.slots.iter().flatten().map(|(score, _)| *score).collect()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_items(self) -> Vec<(f64, T)> {
        self.slots.into_iter().flatten().collect()
    }
}

/// Two-phase comparison.
///
/// Before the search knows any solution the candidate leaving fewer integer
/// infeasibilities on its better side wins. Afterwards the candidate whose
/// smaller degradation is larger wins.
pub(crate) fn better(this: &BranchCandidate, best: &BranchCandidate, incumbent_known: bool) -> bool {
    if incumbent_known {
        this.up_estimate.min(this.down_estimate) > best.up_estimate.min(best.down_estimate)
    } else {
        this.num_inf_up.min(this.num_inf_down) < best.num_inf_up.min(best.num_inf_down)
    }
}

/// Runs `evaluator` over `selected` in object index order.
/// One-sided results are installed in the oracle after the hot start is released.
pub(crate) fn evaluate_in_order<O: BoundingOracle>(
    ctx: &mut SelectionContext<'_, O>,
    snapshot: &RelaxationSnapshot,
    selected: Vec<(f64, InfeasibleObject)>,
    num_infeasible: usize,
    look_ahead: Option<usize>,
    candidates: &mut Vec<BranchCandidate>,
) -> SelectionStatus {
    let limit = (!ctx.incumbent.has_solution()).then_some(ctx.settings.strong_iteration_limit);
    let mut evaluator = StrongBranchingEvaluator::begin(ctx.oracle, limit);

    let mut status = SelectionStatus::Candidates;
    let mut fixes: Vec<(usize, (f64, f64))> = Vec::new();
    let mut best_degradation = f64::NEG_INFINITY;
    let mut since_improvement = 0;

    for (score, object) in selected.into_iter().sorted_by_key(|(_, o)| o.object_index) {
        let mut candidate = snapshot.candidate(ctx.model, &object, object.direction, score);
        candidate.num_inf_up = num_infeasible;
        candidate.num_inf_down = num_infeasible;

        match evaluator.evaluate(ctx, &mut candidate) {
            StrongVerdict::Branchable => {
                let degradation = candidate.up_estimate.min(candidate.down_estimate);
                candidates.push(candidate);

                if degradation > best_degradation {
                    best_degradation = degradation;
                    since_improvement = 0;
                } else {
                    since_improvement += 1;
                }
                if look_ahead.is_some_and(|l| since_improvement >= l) {
                    break;
                }
            }
            verdict @ (StrongVerdict::FixedDown | StrongVerdict::FixedUp) => {
                let direction = if verdict == StrongVerdict::FixedDown { BranchDirection::Down } else { BranchDirection::Up };
                fixes.push((candidate.variable_index, candidate.bounds(direction)));
                status = SelectionStatus::BoundsTightened;
                if !ctx.settings.solve_all {
                    break;
                }
            }
            StrongVerdict::NodeInfeasible => {
                status = SelectionStatus::NodeInfeasible;
                break;
            }
        }
    }

    let num_trials = evaluator.num_trials();
    evaluator.finish(ctx.oracle);

    if status == SelectionStatus::BoundsTightened {
        for (column, (lower, upper)) in &fixes {
            ctx.oracle.set_column_bounds(*column, *lower, *upper);
        }
    }

    ctx.ui.send(UIUserMessage::StrongBranching(StrongBranchingUIState {
        num_trials,
        num_candidates: candidates.len(),
        num_fixes: fixes.len(),
        outcome: status,
    }));

    status
}

/// Strong branching on the most fractional objects
pub(crate) fn create_candidates<O: BoundingOracle>(
    ctx: &mut SelectionContext<'_, O>,
    snapshot: &RelaxationSnapshot,
    infeasible: &[InfeasibleObject],
    candidates: &mut Vec<BranchCandidate>,
) -> SelectionStatus {
    let mut slots = StrongCandidateSlots::new(ctx.settings.strong_candidate_size);
    for object in infeasible {
        slots.offer(object.infeasibility, *object);
    }

    if slots.is_empty() {
        return crate::branching::max_infeasibility::create_candidates(ctx, snapshot, infeasible, candidates);
    }

    evaluate_in_order(ctx, snapshot, slots.into_items(), infeasible.len(), None, candidates)
}
