use crate::model::{LinearConstraint, MilpModel};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Outcome of a relaxation solve
pub enum LpStatus {
    Optimal,
    PrimalInfeasible,
    DualInfeasible,
    DualObjectiveLimit,
    IterationLimit,
    Abandoned,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BasisStatus {
    Basic,
    AtLower,
    AtUpper,
    Free,
}

#[derive(Clone, Debug, PartialEq, Default)]
/// Basis snapshot used to warm start a re-solve
pub struct WarmStartBasis {
    pub columns: Vec<BasisStatus>,
    pub rows: Vec<BasisStatus>,
}

/// Trait for the LP relaxation solver.
///
/// The oracle is a serially reused resource, exactly one subproblem is installed
/// at a time. Rows `0..num_core_rows` are the core rows of the model, every row
/// behind them is a non-core row (cut) added through `add_rows`.
pub trait BoundingOracle {
    // Solve from scratch
    fn solve(&mut self) -> LpStatus;
    // Re-solve after bound or row changes
    fn resolve(&mut self) -> LpStatus;

    fn objective_value(&self) -> f64;
    fn column_solution(&self) -> &[f64];
    // Overwrite the stored primal solution, used when restoring after trials
    fn set_column_solution(&mut self, solution: &[f64]);

    fn num_cols(&self) -> usize;
    fn column_lower(&self) -> &[f64];
    fn column_upper(&self) -> &[f64];
    fn set_column_bounds(&mut self, index: usize, lower: f64, upper: f64);

    fn num_rows(&self) -> usize;
    fn add_rows(&mut self, rows: &[LinearConstraint]);
    // Indices refer to the current row numbering
    fn delete_rows(&mut self, rows: &[usize]);
    fn set_row_bounds(&mut self, index: usize, lower: f64, upper: f64);

    fn is_proven_optimal(&self) -> bool;
    fn is_primal_infeasible(&self) -> bool;
    fn is_dual_infeasible(&self) -> bool;
    fn is_iteration_limit_reached(&self) -> bool;
    fn is_dual_objective_limit_reached(&self) -> bool;

    /// Saves the state of the last solve, trials re-solve from it
    fn mark_hot_start(&mut self);
    /// Re-solve limited by `hot_start_iteration_limit`
    fn solve_from_hot_start(&mut self) -> LpStatus;
    /// Must restore the objective value, primal solution and status saved by
    /// `mark_hot_start`, so the marked relaxation can be read again right after
    fn unmark_hot_start(&mut self);
    fn hot_start_iteration_limit(&self) -> usize;
    fn set_hot_start_iteration_limit(&mut self, limit: usize);

    fn warm_start(&self) -> Option<WarmStartBasis>;
    // Returns false if the basis was rejected
    fn set_warm_start(&mut self, basis: &WarmStartBasis) -> bool;

    /// Objective value above which the solver may stop early.
    /// Oracles without a dual objective limit ignore it.
    fn set_cutoff(&mut self, _cutoff: f64) {}

    /// Reduced costs of the last optimal solve, if the oracle exposes them
    fn reduced_costs(&self) -> Option<Vec<f64>> {
        None
    }

    /// Folds the status predicates of the last solve into one value
    fn lp_status(&self) -> LpStatus {
        if self.is_proven_optimal() {
            LpStatus::Optimal
        } else if self.is_primal_infeasible() {
            LpStatus::PrimalInfeasible
        } else if self.is_dual_infeasible() {
            LpStatus::DualInfeasible
        } else if self.is_dual_objective_limit_reached() {
            LpStatus::DualObjectiveLimit
        } else if self.is_iteration_limit_reached() {
            LpStatus::IterationLimit
        } else {
            LpStatus::Abandoned
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// When a cut generator is called
pub enum CutStrategy {
    Never,
    RootOnly,
    /// every node that is not diving, switched off after repeated empty calls
    Auto,
    /// every k-th processed node
    Periodic(u32),
}

#[derive(Clone, Debug, Default)]
/// Result of one cut generator call
pub struct CutGeneration {
    pub cuts: Vec<LinearConstraint>,
    /// probing-style bound tightenings `(column, lower, upper)`
    pub bound_changes: Vec<(usize, f64, f64)>,
    pub must_resolve: bool,
}

/// Produces linear inequalities violated by a relaxation solution
pub trait CutGenerator {
    fn name(&self) -> &str;
    fn strategy(&self) -> CutStrategy;
    fn generate(&mut self, model: &MilpModel, solution: &[f64], lower: &[f64], upper: &[f64]) -> CutGeneration;
}

/// Receives integer feasible solutions found anywhere in the search
pub trait IncumbentRegistry {
    /// Returns true if the solution became the new incumbent
    fn register_solution(&mut self, solution: &[f64], objective: f64) -> bool;
    /// `f64::INFINITY` until a solution is known
    fn incumbent_value(&self) -> f64;
    fn num_solutions(&self) -> usize;

    fn has_solution(&self) -> bool {
        self.num_solutions() > 0
    }
}

#[derive(Clone, Debug)]
/// Best solution found so far
pub struct Incumbent {
    pub objective: f64,
    pub solution: Option<Vec<f64>>,
    num_solutions: usize,
}

impl Incumbent {
    pub fn new() -> Self {
        Incumbent {
            objective: f64::INFINITY,
            solution: None,
            num_solutions: 0,
        }
    }
}

impl Default for Incumbent {
    fn default() -> Self {
        Self::new()
    }
}

impl IncumbentRegistry for Incumbent {
    fn register_solution(&mut self, solution: &[f64], objective: f64) -> bool {
        // only strictly better solutions are kept
        if objective >= self.objective {
            return false;
        }
        self.objective = objective;
        self.solution = Some(solution.to_vec());
        self.num_solutions += 1;
        true
    }

    fn incumbent_value(&self) -> f64 {
        self.objective
    }

    fn num_solutions(&self) -> usize {
        self.num_solutions
    }
}

/// Primal heuristic.
/// Produces a candidate solution from the current bounds and relaxation, or nothing.
pub trait Heuristic {
    fn name(&self) -> &str;
    /// Returns `(objective, solution)` of a feasible solution better than `cutoff`
    fn search_solution(&mut self, model: &MilpModel, relaxation: &[f64], lower: &[f64], upper: &[f64], cutoff: f64) -> Option<(f64, Vec<f64>)>;
}
