use std::time::Instant;
use crate::branching::{BranchDirection, BranchingNodeInfo, BranchingStrategy, PseudocostTable, SelectionContext, SelectionStatus};
use crate::error::FatalError;
use crate::model::{LinearConstraint, MilpModel};
use crate::oracle::{BoundingOracle, Heuristic, IncumbentRegistry, LpStatus};
use crate::settings::{BranchAndCutSettings, GeneralSettings};
use crate::tree_node::constraint_pool::{ConstraintId, ConstraintPool, CutFilter, CutGeneratorSlot};
use crate::tree_node::node_desc::{NodeDescription, SubProblem};
use crate::tree_node::{FathomReason, NodeArena, NodeId, NodeStatus, TreeNode};
use crate::ui::{CutRoundUIState, LpSolveUIState, SearchStatistics, UISender, UIUserMessage};

/// A parent bound must exceed the cutoff by this much to fathom before solving
const UPFRONT_CUTOFF_TOLERANCE: f64 = 1e-6;

/// Everything a node needs while it is processed
pub struct NodeContext<'a, O: BoundingOracle> {
    pub model: &'a MilpModel,
    pub oracle: &'a mut O,
    pub strategy: &'a mut BranchingStrategy,
    pub pseudocosts: &'a mut PseudocostTable,
    pub incumbent: &'a mut dyn IncumbentRegistry,
    pub cut_pool: &'a mut ConstraintPool,
    pub cut_generators: &'a mut [CutGeneratorSlot],
    pub cut_filter: &'a CutFilter,
    pub heuristics: &'a mut [Box<dyn Heuristic>],
    pub settings: &'a BranchAndCutSettings,
    pub ui: &'a UISender,
    pub deadline: Option<Instant>,
    /// processed nodes, the current one included
    pub num_processed: usize,
    pub statistics: &'a mut SearchStatistics,
}

impl<O: BoundingOracle> NodeContext<'_, O> {
    fn time_limit_reached(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    fn cutoff(&self) -> f64 {
        self.incumbent.incumbent_value()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
/// What the bounding loop does after one pass
pub struct BoundingDecision {
    pub keep_bounding: bool,
    pub branch: bool,
    pub generate_constraints: bool,
    /// never set, columns are static
    pub generate_variables: bool,
    pub unbounded: bool,
    pub fathomed: Option<FathomReason>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Result of processing one node
pub enum NodeOutcome {
    Fathomed(FathomReason),
    /// branch object installed, ready for `branch_node`
    Pregnant,
    /// relaxation is unbounded, so is the MILP if feasible
    Unbounded,
}

/// True if the node cannot improve on `cutoff` by more than the gap tolerances
pub fn gap_closed(quality: f64, cutoff: f64, settings: &GeneralSettings) -> bool {
    if !cutoff.is_finite() {
        return false;
    }
    let absolute_gap = cutoff - quality;
    if absolute_gap <= settings.optimal_abs_gap {
        return true;
    }
    cutoff != 0.0 && absolute_gap / cutoff.abs() <= settings.optimal_rel_gap
}

/// Rebuilds the subproblem of `id` and installs it into the oracle.
///
/// Non-core rows of the previous node are dropped, then bounds, the pooled
/// constraints of the node and its warm start are applied.
pub fn install_sub_problem<O: BoundingOracle>(arena: &NodeArena, id: NodeId, model: &MilpModel, oracle: &mut O, pool: &ConstraintPool) -> Result<SubProblem, FatalError> {
    let num_core_rows = model.num_core_rows();
    let sub = arena.reconstruct(id, model.num_cols(), num_core_rows)?;

    if sub.constraints.iter().any(|c| c.0 as usize >= pool.count()) {
        return Err(FatalError::InconsistentDescription { node: id, reason: "constraint id not in pool" });
    }

    if oracle.num_rows() > num_core_rows {
        let non_core: Vec<usize> = (num_core_rows..oracle.num_rows()).collect();
        oracle.delete_rows(&non_core);
    }

    for (column, (lower, upper)) in sub.col_lower.iter().zip(&sub.col_upper).enumerate() {
        oracle.set_column_bounds(column, *lower, *upper);
    }
    for (row, (lower, upper)) in sub.row_lower.iter().zip(&sub.row_upper).enumerate() {
        oracle.set_row_bounds(row, *lower, *upper);
    }

    let rows: Vec<LinearConstraint> = sub.constraints.iter()
        .map(|c| pool.get_constraint(*c).data.clone())
        .collect();
    if !rows.is_empty() {
        oracle.add_rows(&rows);
    }

    if let Some(basis) = &sub.basis {
        oracle.set_warm_start(basis);
    }

    Ok(sub)
}

/// Relaxation solution with integer columns snapped to their nearest integer
fn integer_solution(model: &MilpModel, solution: &[f64]) -> Vec<f64> {
    let mut rounded = solution.to_vec();
    for object in model.integer_objects() {
        rounded[object.column] = rounded[object.column].round();
    }
    rounded
}

/// Registers the integer feasible relaxation of `node` and tightens the cutoff
fn register_relaxation<O: BoundingOracle>(node: &TreeNode, ctx: &mut NodeContext<'_, O>) {
    let solution = integer_solution(ctx.model, ctx.oracle.column_solution());
    let objective = ctx.model.objective_value(&solution);

    if ctx.incumbent.register_solution(&solution, objective) {
        ctx.oracle.set_cutoff(objective);
        ctx.statistics.solutions_found += 1;
        ctx.ui.send(UIUserMessage::NewIncumbent { obj: objective, node_id: node.id });
    }
}

/// Decision after one bounding pass, given the status of the last solve.
///
/// Fathoms `node` on infeasibility, integer feasibility or a closed gap.
pub fn decide<O: BoundingOracle>(node: &mut TreeNode, status: LpStatus, ctx: &mut NodeContext<'_, O>) -> Result<BoundingDecision, FatalError> {
    let mut decision = BoundingDecision::default();

    match status {
        LpStatus::PrimalInfeasible => {
            node.fathom();
            decision.fathomed = Some(FathomReason::Infeasible);
            return Ok(decision);
        }
        // stopped above the cutoff
        LpStatus::DualObjectiveLimit => {
            node.fathom();
            decision.fathomed = Some(FathomReason::Cutoff);
            return Ok(decision);
        }
        LpStatus::DualInfeasible => {
            decision.unbounded = true;
            return Ok(decision);
        }
        LpStatus::IterationLimit | LpStatus::Abandoned => {
            return Err(FatalError::UnexpectedOracleStatus { node: node.id, status });
        }
        LpStatus::Optimal => {}
    }

    node.quality = ctx.oracle.objective_value();

    let num_infeasible = ctx.model.num_integer_infeasible(
        ctx.oracle.column_solution(), ctx.oracle.column_lower(), ctx.oracle.column_upper(),
        ctx.settings.general.integer_tolerance, ctx.settings.branching.break_even);

    if num_infeasible == 0 {
        register_relaxation(node, ctx);
        node.fathom();
        decision.fathomed = Some(FathomReason::IntegerFeasible);
        return Ok(decision);
    }

    let cutoff = ctx.cutoff();
    if node.quality >= cutoff {
        node.fathom();
        decision.fathomed = Some(FathomReason::Cutoff);
        return Ok(decision);
    }
    if gap_closed(node.quality, cutoff, &ctx.settings.general) {
        node.fathom();
        decision.fathomed = Some(FathomReason::Gap);
        return Ok(decision);
    }

    decision.branch = true;
    decision.generate_constraints = ctx.cut_generators.iter()
        .any(|slot| slot.should_call(node.is_root(), node.diving, ctx.num_processed));
    decision.keep_bounding = decision.generate_constraints;

    Ok(decision)
}

/// Tightens integer columns whose reduced cost proves they cannot move far
/// without passing the cutoff. Returns the number of tightened bounds.
fn reduced_cost_fixing<O: BoundingOracle>(ctx: &mut NodeContext<'_, O>) -> usize {
    if !ctx.settings.general.reduced_cost_fixing || !ctx.incumbent.has_solution() {
        return 0;
    }
    let Some(reduced_costs) = ctx.oracle.reduced_costs() else {
        return 0;
    };

    let tolerance = ctx.settings.general.integer_tolerance;
    let gap = ctx.cutoff() - ctx.oracle.objective_value();
    if gap < 0.0 {
        return 0;
    }

    let mut fixes = Vec::new();
    for object in ctx.model.integer_objects() {
        let column = object.column;
        let value = ctx.oracle.column_solution()[column];
        let lower = ctx.oracle.column_lower()[column];
        let upper = ctx.oracle.column_upper()[column];
        let reduced_cost = reduced_costs[column];

        if reduced_cost > tolerance && value <= lower + tolerance {
            let new_upper = lower + (gap / reduced_cost).floor();
            if new_upper < upper {
                fixes.push((column, lower, new_upper));
            }
        } else if reduced_cost < -tolerance && value >= upper - tolerance {
            let new_lower = upper - (gap / -reduced_cost).floor();
            if new_lower > lower {
                fixes.push((column, new_lower, upper));
            }
        }
    }

    for (column, lower, upper) in &fixes {
        ctx.oracle.set_column_bounds(*column, *lower, *upper);
    }
    fixes.len()
}

/// Runs every heuristic on the current relaxation, returns true if one improved the incumbent
fn run_heuristics<O: BoundingOracle>(node_id: NodeId, ctx: &mut NodeContext<'_, O>) -> bool {
    if !ctx.settings.general.heuristics_enabled {
        return false;
    }

    let mut improved = false;
    for heuristic in ctx.heuristics.iter_mut() {
        let found = heuristic.search_solution(
            ctx.model, ctx.oracle.column_solution(), ctx.oracle.column_lower(), ctx.oracle.column_upper(), ctx.incumbent.incumbent_value());

        if let Some((objective, solution)) = found {
            if ctx.incumbent.register_solution(&solution, objective) {
                ctx.oracle.set_cutoff(objective);
                ctx.statistics.solutions_found += 1;
                ctx.ui.send(UIUserMessage::NewIncumbent { obj: objective, node_id });
                ctx.ui.send(UIUserMessage::Log(format!("heuristic {} found {objective}", heuristic.name())));
                improved = true;
            }
        }
    }
    improved
}

/// One round of cut generation. Accepted cuts are pooled, appended to `active`
/// and added to the oracle. Returns true if the relaxation must be re-solved.
fn generate_cuts<O: BoundingOracle>(node: &TreeNode, pass: usize, active: &mut Vec<ConstraintId>, added: &mut Vec<ConstraintId>, ctx: &mut NodeContext<'_, O>) -> bool {
    let solution = ctx.oracle.column_solution().to_vec();
    let lower = ctx.oracle.column_lower().to_vec();
    let upper = ctx.oracle.column_upper().to_vec();

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let max_non_core = (((ctx.settings.cuts.cut_factor - 1.0) * ctx.model.num_core_rows() as f64) as usize).max(10);

    let mut new_rows = Vec::new();
    let mut must_resolve = false;

    for slot in ctx.cut_generators.iter_mut() {
        if !slot.should_call(node.is_root(), node.diving, ctx.num_processed) {
            continue;
        }

        let generation = slot.generate(ctx.model, &solution, &lower, &upper, ctx.settings.cuts.auto_disable_after);
        let found = generation.cuts.len();

        for (column, new_lower, new_upper) in generation.bound_changes {
            let tightened_lower = ctx.oracle.column_lower()[column].max(new_lower);
            let tightened_upper = ctx.oracle.column_upper()[column].min(new_upper);
            ctx.oracle.set_column_bounds(column, tightened_lower, tightened_upper);
            must_resolve = true;
        }
        must_resolve |= generation.must_resolve;

        let (accepted, _) = {
            let active_rows: Vec<&LinearConstraint> = active.iter().map(|c| &ctx.cut_pool.get_constraint(*c).data).collect();
            ctx.cut_filter.filter(generation.cuts, &solution, &active_rows)
        };

        let mut kept = 0;
        for cut in accepted {
            if active.len() >= max_non_core {
                break;
            }
            let (id, _) = ctx.cut_pool.add_constraint(cut);
            if active.contains(&id) {
                continue;
            }
            new_rows.push(ctx.cut_pool.get_constraint(id).data.clone());
            active.push(id);
            added.push(id);
            kept += 1;
        }

        ctx.ui.send(UIUserMessage::CutRound(CutRoundUIState {
            node_id: node.id,
            pass,
            generator: slot.generator.name().to_string(),
            found,
            kept,
        }));
    }

    if !new_rows.is_empty() {
        ctx.statistics.cuts_added += new_rows.len();
        ctx.oracle.add_rows(&new_rows);
        must_resolve = true;
    }

    must_resolve
}

fn fathomed(arena: &mut NodeArena, id: NodeId, reason: FathomReason) -> Result<NodeOutcome, FatalError> {
    arena.get_mut(id)?.fathom();
    Ok(NodeOutcome::Fathomed(reason))
}

/// Runs the bounding loop of `id` and either fathoms it or makes it pregnant.
///
/// Only `Candidate` and `Evaluated` nodes may be processed, anything else is a
/// broken caller invariant.
pub fn process_node<O: BoundingOracle>(arena: &mut NodeArena, id: NodeId, ctx: &mut NodeContext<'_, O>) -> Result<NodeOutcome, FatalError> {
    let node = arena.get(id)?;
    if !matches!(node.status, NodeStatus::Candidate | NodeStatus::Evaluated) {
        return Err(FatalError::InvalidNodeState { node: id, status: node.status });
    }

    let is_root = node.is_root();
    let quality = node.quality;
    let parent_quality = (!is_root).then_some(quality);
    let branched_direction = node.description.branched_direction;
    let branched_column = node.description.branched_column;
    let branched_value = node.description.branched_value;

    let cutoff = ctx.cutoff();
    if quality - UPFRONT_CUTOFF_TOLERANCE > cutoff {
        return fathomed(arena, id, FathomReason::Cutoff);
    }
    if gap_closed(quality, cutoff, &ctx.settings.general) {
        return fathomed(arena, id, FathomReason::Gap);
    }

    let installed = install_sub_problem(arena, id, ctx.model, ctx.oracle, ctx.cut_pool)?;
    let mut active = installed.constraints.clone();
    let mut added = Vec::new();

    let mut status = if is_root { ctx.oracle.solve() } else { ctx.oracle.resolve() };
    let mut previous_objective = f64::NEG_INFINITY;
    let mut time_limit_reached = false;
    let mut pass = 0;

    loop {
        pass += 1;
        ctx.statistics.lp_solves += 1;
        ctx.ui.send(UIUserMessage::LpSolveFinish(LpSolveUIState {
            node_id: id,
            pass,
            status,
            objective: ctx.oracle.objective_value(),
            num_rows: ctx.oracle.num_rows(),
        }));

        // learn from the first bound of a child
        if pass == 1 && status == LpStatus::Optimal {
            if let Some(parent_quality) = parent_quality {
                let direction = BranchDirection::try_from(branched_direction)?;
                ctx.pseudocosts.record_mut(branched_column)
                    .update_from_parent(direction, parent_quality, ctx.oracle.objective_value(), branched_value);
            }
        }

        let decision = decide(arena.get_mut(id)?, status, ctx)?;
        if let Some(reason) = decision.fathomed {
            return Ok(NodeOutcome::Fathomed(reason));
        }
        if decision.unbounded {
            return Ok(NodeOutcome::Unbounded);
        }

        ctx.statistics.reduced_cost_fixes += reduced_cost_fixing(ctx);

        if run_heuristics(id, ctx) {
            let quality = arena.get(id)?.quality;
            if gap_closed(quality, ctx.cutoff(), &ctx.settings.general) {
                return fathomed(arena, id, FathomReason::Gap);
            }
        }

        if ctx.time_limit_reached() {
            time_limit_reached = true;
            break;
        }

        let objective = ctx.oracle.objective_value();
        let tailing_off = pass > 1 && objective - previous_objective <= ctx.settings.general.tail_off_tolerance;
        if !decision.keep_bounding || tailing_off || pass >= ctx.settings.general.max_bounding_passes {
            break;
        }
        previous_objective = objective;

        let node = arena.get(id)?.clone();
        if !generate_cuts(&node, pass, &mut active, &mut added, ctx) {
            break;
        }
        status = ctx.oracle.resolve();
    }

    let mut branching_passes = 0;
    loop {
        let node = arena.get(id)?;
        let info = BranchingNodeInfo {
            node_id: id,
            quality: node.quality,
            parent_quality,
            branched_direction,
            branched_column,
            branched_value,
        };

        let mut selection = SelectionContext {
            model: ctx.model,
            oracle: &mut *ctx.oracle,
            pseudocosts: &mut *ctx.pseudocosts,
            incumbent: &mut *ctx.incumbent,
            settings: &ctx.settings.branching,
            integer_tolerance: ctx.settings.general.integer_tolerance,
            time_limit_reached: time_limit_reached || branching_passes >= ctx.settings.general.max_branching_passes,
            ui: ctx.ui,
        };

        match ctx.strategy.create_candidates(&mut selection, &info)? {
            SelectionStatus::Candidates => break,
            SelectionStatus::NoCandidates => {
                let node = arena.get_mut(id)?;
                register_relaxation(node, ctx);
                node.fathom();
                return Ok(NodeOutcome::Fathomed(FathomReason::IntegerFeasible));
            }
            SelectionStatus::NodeInfeasible => return fathomed(arena, id, FathomReason::Infeasible),
            SelectionStatus::BoundsTightened => {
                branching_passes += 1;
                let status = ctx.oracle.resolve();
                ctx.statistics.lp_solves += 1;

                let decision = decide(arena.get_mut(id)?, status, ctx)?;
                if let Some(reason) = decision.fathomed {
                    return Ok(NodeOutcome::Fathomed(reason));
                }
                if decision.unbounded {
                    return Ok(NodeOutcome::Unbounded);
                }
            }
        }
    }

    let solution_estimate = ctx.strategy.solution_estimate();
    let best = ctx.strategy.take_best().ok_or(FatalError::MissingBranchObject(id))?;

    let mut description = arena.get(id)?.description.clone();

    // bound changes made while bounding are soft
    for (column, (lower, upper)) in ctx.oracle.column_lower().iter().zip(ctx.oracle.column_upper()).enumerate() {
        if *lower > installed.col_lower[column] {
            description.vars.lower_soft.set(column, *lower);
        }
        if *upper < installed.col_upper[column] {
            description.vars.upper_soft.set(column, *upper);
        }
    }

    description.constraints.added.extend(added.iter().copied());

    if ctx.settings.general.remove_slack_constraints {
        let solution = ctx.oracle.column_solution();
        let tolerance = ctx.settings.general.integer_tolerance;
        for constraint in &active {
            let row = &ctx.cut_pool.get_constraint(*constraint).data;
            let activity = row.activity(solution);
            if activity > row.lower + tolerance && activity < row.upper - tolerance {
                description.constraints.removed.push(*constraint);
            }
        }
        description.constraints.added.retain(|c| !description.constraints.removed.contains(c));
    }

    description.basis = ctx.oracle.warm_start();

    let node = arena.get_mut(id)?;
    node.quality = ctx.oracle.objective_value();
    node.solution_estimate = solution_estimate.unwrap_or(node.quality);
    node.description = description;
    node.branch_object = Some(best);
    node.status = NodeStatus::Pregnant;

    let depth = node.depth;
    let interval = ctx.settings.general.explicit_interval;
    if interval > 0 && depth % interval == 0 {
        arena.convert_to_explicit(id, ctx.model.num_cols(), ctx.model.num_core_rows())?;
    }

    Ok(NodeOutcome::Pregnant)
}

/// Creates both children of a pregnant node, preferred direction first.
///
/// With `ramp_up` the children store full bound vectors of the parent with the
/// branched bound overridden, otherwise only the single bound change.
pub fn branch_node(arena: &mut NodeArena, id: NodeId, ramp_up: bool, model: &MilpModel) -> Result<[NodeId; 2], FatalError> {
    let node = arena.get(id)?;
    if node.status != NodeStatus::Pregnant {
        return Err(FatalError::NodeNotPregnant(id));
    }
    let candidate = node.branch_object.clone().ok_or(FatalError::MissingBranchObject(id))?;
    let quality = node.quality;
    let basis = node.description.basis.clone();

    let parent_full = if ramp_up {
        Some(arena.reconstruct(id, model.num_cols(), model.num_core_rows())?)
    } else {
        None
    };

    let column = candidate.variable_index;
    let mut children = [id; 2];

    for (child, direction) in children.iter_mut().zip([candidate.direction, candidate.direction.opposite()]) {
        let (lower, upper) = candidate.bounds(direction);

        let mut description = match &parent_full {
            Some(full) => {
                let mut description = NodeDescription::explicit_from(full);
                description.vars.lower_hard.set(column, lower);
                description.vars.upper_hard.set(column, upper);
                description
            }
            None => NodeDescription::with_bound_change(column, lower, upper),
        };
        description.basis = basis.clone();
        description.branched_direction = direction.sign();
        description.branched_object = candidate.object_index;
        description.branched_column = column;
        description.branched_value = candidate.value;

        *child = arena.insert_child(id, description)?;

        let estimate = candidate.estimate(direction);
        if estimate.is_finite() {
            arena.get_mut(*child)?.solution_estimate = quality + estimate;
        }
    }

    arena.get_mut(id)?.status = NodeStatus::Branched;
    Ok(children)
}
