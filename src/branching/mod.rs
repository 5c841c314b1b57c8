use std::fmt::{Display, Formatter};
use crate::error::FatalError;
use crate::model::MilpModel;
use crate::oracle::{BoundingOracle, IncumbentRegistry};
use crate::settings::{BranchStrategyKind, BranchingSettings};
use crate::tree_node::NodeId;
use crate::ui::UISender;

pub mod pseudocost;
pub mod strong;
mod max_infeasibility;
mod pseudo;
mod reliability;

pub use pseudo::PseudocostBranching;
pub use pseudocost::{PseudocostRecord, PseudocostTable};
pub use strong::{StrongBranchingEvaluator, StrongCandidateSlots, StrongVerdict, TrialResult, TrialStatus};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BranchDirection {
    Down,
    Up,
}

impl BranchDirection {
    /// `-1` for down, `+1` for up
    pub fn sign(self) -> i32 {
        match self {
            BranchDirection::Down => -1,
            BranchDirection::Up => 1,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            BranchDirection::Down => BranchDirection::Up,
            BranchDirection::Up => BranchDirection::Down,
        }
    }
}

impl TryFrom<i32> for BranchDirection {
    type Error = FatalError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(BranchDirection::Down),
            1 => Ok(BranchDirection::Up),
            other => Err(FatalError::InvalidBranchDirection(other)),
        }
    }
}

impl Display for BranchDirection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            BranchDirection::Down => write!(f, "down"),
            BranchDirection::Up => write!(f, "up"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
/// One candidate variable branch.
///
/// `down` and `up` are the `(lower, upper)` bound pairs of the two children.
/// The estimates hold the objective degradation of each side, `f64::INFINITY`
/// marks a side that is infeasible or cannot beat the cutoff.
pub struct BranchCandidate {
    pub object_index: usize,
    pub variable_index: usize,
    pub value: f64,
    /// child explored first
    pub direction: BranchDirection,
    pub down: (f64, f64),
    pub up: (f64, f64),
    pub score: f64,
    pub up_estimate: f64,
    pub down_estimate: f64,
    pub num_inf_up: usize,
    pub num_inf_down: usize,
    pub finished_up: bool,
    pub finished_down: bool,
}

impl BranchCandidate {
    /// Bound pair of the child in `direction`
    pub fn bounds(&self, direction: BranchDirection) -> (f64, f64) {
        match direction {
            BranchDirection::Down => self.down,
            BranchDirection::Up => self.up,
        }
    }

    pub fn estimate(&self, direction: BranchDirection) -> f64 {
        match direction {
            BranchDirection::Down => self.down_estimate,
            BranchDirection::Up => self.up_estimate,
        }
    }
}

impl Display for BranchCandidate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "x{}={:.4} {} score=<{:.4}> est=<{:.4}/{:.4}>",
               self.variable_index, self.value, self.direction, self.score, self.down_estimate, self.up_estimate)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Outcome of a candidate selection round
pub enum SelectionStatus {
    /// at least one candidate was produced
    Candidates,
    /// the relaxation solution is integer feasible
    NoCandidates,
    /// strong branching fixed bounds in the oracle, re-solve and select again
    BoundsTightened,
    /// every child of the node is infeasible
    NodeInfeasible,
}

/// Branching history of the node that asks for candidates
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BranchingNodeInfo {
    pub node_id: NodeId,
    pub quality: f64,
    pub parent_quality: Option<f64>,
    /// `-1` down, `+1` up, `0` for the root
    pub branched_direction: i32,
    pub branched_column: usize,
    pub branched_value: f64,
}

/// Everything a strategy may read or touch while creating candidates
pub struct SelectionContext<'a, O: BoundingOracle> {
    pub model: &'a MilpModel,
    pub oracle: &'a mut O,
    pub pseudocosts: &'a mut PseudocostTable,
    pub incumbent: &'a mut dyn IncumbentRegistry,
    pub settings: &'a BranchingSettings,
    pub integer_tolerance: f64,
    pub time_limit_reached: bool,
    pub ui: &'a UISender,
}

/// Infeasible integer object found while scanning the relaxation
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct InfeasibleObject {
    pub object_index: usize,
    pub infeasibility: f64,
    pub direction: BranchDirection,
}

/// Copy of the relaxation the candidates are created from
pub(crate) struct RelaxationSnapshot {
    pub objective: f64,
    pub solution: Vec<f64>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl RelaxationSnapshot {
    pub fn take<O: BoundingOracle>(oracle: &O) -> Self {
        RelaxationSnapshot {
            objective: oracle.objective_value(),
            solution: oracle.column_solution().to_vec(),
            lower: oracle.column_lower().to_vec(),
            upper: oracle.column_upper().to_vec(),
        }
    }

    pub fn infeasible_objects(&self, model: &MilpModel, tolerance: f64, break_even: f64) -> Vec<InfeasibleObject> {
        model.integer_objects().iter().enumerate()
            .filter_map(|(object_index, object)| {
                let (infeasibility, direction) = object.infeasibility(&self.solution, &self.lower, &self.upper, tolerance, break_even);
                (infeasibility > 0.0).then_some(InfeasibleObject { object_index, infeasibility, direction })
            })
            .collect()
    }

    pub fn candidate(&self, model: &MilpModel, object: &InfeasibleObject, direction: BranchDirection, score: f64) -> BranchCandidate {
        model.integer_objects()[object.object_index]
            .create_branch_candidate(object.object_index, &self.solution, &self.lower, &self.upper, direction, score)
    }
}

#[derive(Clone, Debug)]
/// Per-kind state of the branching strategy
pub enum StrategyVariant {
    MaxInfeasibility,
    Pseudocost(PseudocostBranching),
    Strong,
    Reliability,
}

/// Branching variable selection.
///
/// Candidates are cached until `clear()`, the best candidate is computed once per round.
#[derive(Clone, Debug)]
pub struct BranchingStrategy {
    variant: StrategyVariant,
    candidates: Vec<BranchCandidate>,
    best: Option<usize>,
    incumbent_known: bool,
    solution_estimate: Option<f64>,
}

impl BranchingStrategy {
    pub fn new(kind: BranchStrategyKind, model: &MilpModel, settings: &BranchingSettings) -> Self {
        let variant = match kind {
            BranchStrategyKind::MaxInfeasibility => StrategyVariant::MaxInfeasibility,
            BranchStrategyKind::Pseudocost => StrategyVariant::Pseudocost(PseudocostBranching::new(model, settings.pseudo_score_factor)),
            BranchStrategyKind::Strong => StrategyVariant::Strong,
            BranchStrategyKind::Reliability => StrategyVariant::Reliability,
        };
        BranchingStrategy {
            variant,
            candidates: Vec::new(),
            best: None,
            incumbent_known: false,
            solution_estimate: None,
        }
    }

    pub fn kind(&self) -> BranchStrategyKind {
        match self.variant {
            StrategyVariant::MaxInfeasibility => BranchStrategyKind::MaxInfeasibility,
            StrategyVariant::Pseudocost(_) => BranchStrategyKind::Pseudocost,
            StrategyVariant::Strong => BranchStrategyKind::Strong,
            StrategyVariant::Reliability => BranchStrategyKind::Reliability,
        }
    }

    pub fn variant(&self) -> &StrategyVariant {
        &self.variant
    }

    /// Search-wide "has any solution been found" flag used by `better()`.
    /// Sampled once at the start of every selection round.
    pub fn set_incumbent_known(&mut self, known: bool) {
        self.incumbent_known = known;
    }

    pub fn incumbent_known(&self) -> bool {
        self.incumbent_known
    }

    /// Scans the relaxation installed in the oracle and fills the candidate set
    pub fn create_candidates<O: BoundingOracle>(&mut self, ctx: &mut SelectionContext<'_, O>, node: &BranchingNodeInfo) -> Result<SelectionStatus, FatalError> {
        self.clear();
        self.incumbent_known = ctx.incumbent.has_solution();

        let snapshot = RelaxationSnapshot::take(ctx.oracle);
        let infeasible = snapshot.infeasible_objects(ctx.model, ctx.integer_tolerance, ctx.settings.break_even);

        // pseudocost statistics are folded in even if the node turns out feasible
        if let StrategyVariant::Pseudocost(ref mut pseudo) = self.variant {
            pseudo.update_statistics(node)?;
        }

        if infeasible.is_empty() {
            return Ok(SelectionStatus::NoCandidates);
        }

        self.solution_estimate = Some(snapshot.objective
            + infeasible.iter()
                .map(|o| ctx.pseudocosts.score(ctx.model.integer_objects()[o.object_index].column))
                .sum::<f64>());

        let status = match self.variant {
            StrategyVariant::MaxInfeasibility => max_infeasibility::create_candidates(ctx, &snapshot, &infeasible, &mut self.candidates),
            // out of time, no trial re-solves
            StrategyVariant::Strong | StrategyVariant::Reliability if ctx.time_limit_reached => {
                max_infeasibility::create_candidates(ctx, &snapshot, &infeasible, &mut self.candidates)
            }
            StrategyVariant::Pseudocost(ref pseudo) => pseudo.create_candidates(ctx, &snapshot, &infeasible, &mut self.candidates),
            StrategyVariant::Strong => strong::create_candidates(ctx, &snapshot, &infeasible, &mut self.candidates),
            StrategyVariant::Reliability => reliability::create_candidates(ctx, &snapshot, &infeasible, &mut self.candidates),
        };

        if status != SelectionStatus::Candidates {
            self.candidates.clear();
        }

        Ok(status)
    }

    /// Strict ordering: true if `this` should replace `best`
    pub fn better(&self, this: &BranchCandidate, best: &BranchCandidate) -> bool {
        match self.variant {
            StrategyVariant::Strong => strong::better(this, best, self.incumbent_known),
            StrategyVariant::MaxInfeasibility | StrategyVariant::Pseudocost(_) | StrategyVariant::Reliability => this.score > best.score,
        }
    }

    /// Best of the current candidates, first processed wins ties
    pub fn best_candidate(&mut self) -> Option<&BranchCandidate> {
        if self.best.is_none() {
            let mut best: Option<usize> = None;
            for (i, candidate) in self.candidates.iter().enumerate() {
                match best {
                    Some(b) if !self.better(candidate, &self.candidates[b]) => {}
                    _ => best = Some(i),
                }
            }
            self.best = best;
        }
        self.best.map(|b| &self.candidates[b])
    }

    /// Removes the best candidate from the set, clearing the round
    pub fn take_best(&mut self) -> Option<BranchCandidate> {
        self.best_candidate()?;
        let best = self.best.map(|b| self.candidates.swap_remove(b));
        self.clear();
        best
    }

    pub fn candidates(&self) -> &[BranchCandidate] {
        &self.candidates
    }

    /// Set directly, used when candidates come from elsewhere
    pub fn set_candidates(&mut self, candidates: Vec<BranchCandidate>) {
        self.candidates = candidates;
        self.best = None;
    }

    /// Objective plus the pseudocost scores of all infeasible objects
    pub fn solution_estimate(&self) -> Option<f64> {
        self.solution_estimate
    }

    pub fn clear(&mut self) {
        self.candidates.clear();
        self.best = None;
        self.solution_estimate = None;
    }
}
