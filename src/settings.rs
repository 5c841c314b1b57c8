use std::time::Duration;

/// Integer tolerance. Same as gurobi
pub const INT_FEAS_TOL: f64 = 1e-5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Selects the branching strategy used by every node
pub enum BranchStrategyKind {
    MaxInfeasibility,
    Pseudocost,
    Strong,
    Reliability,
}

#[derive(Clone, Debug)]
/// Tolerances and limits of the search and of the node lifecycle
pub struct GeneralSettings {
    pub integer_tolerance: f64,
    pub optimal_abs_gap: f64,
    pub optimal_rel_gap: f64,
    pub time_limit: Option<Duration>,
    pub node_limit: Option<usize>,
    pub solution_limit: Option<usize>,
    /// bound / heuristic / cut passes per node
    pub max_bounding_passes: usize,
    /// re-selections after strong branching tightened bounds
    pub max_branching_passes: usize,
    pub tail_off_tolerance: f64,
    /// nodes at a depth divisible by this store a full description
    pub explicit_interval: u32,
    /// number of processed nodes whose children get full descriptions
    pub ramp_up_nodes: usize,
    pub reduced_cost_fixing: bool,
    pub remove_slack_constraints: bool,
    pub heuristics_enabled: bool,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            integer_tolerance: INT_FEAS_TOL,
            optimal_abs_gap: 1e-4,
            optimal_rel_gap: 1e-6,
            time_limit: None,
            node_limit: None,
            solution_limit: None,
            max_bounding_passes: 20,
            max_branching_passes: 20,
            tail_off_tolerance: 1e-7,
            explicit_interval: 30,
            ramp_up_nodes: 1,
            reduced_cost_fixing: true,
            remove_slack_constraints: false,
            heuristics_enabled: true,
        }
    }
}

#[derive(Clone, Debug)]
/// Settings for branching variable selection
pub struct BranchingSettings {
    pub strategy: BranchStrategyKind,
    /// number of candidates evaluated by strong branching
    pub strong_candidate_size: usize,
    /// observations per side after which pseudocosts are trusted
    pub reliability: u32,
    /// `score = w * min + (1 - w) * max`
    pub pseudocost_weight: f64,
    /// `score = f * max + (1 - f) * min` of the per-round derivative table
    pub pseudo_score_factor: f64,
    pub break_even: f64,
    /// keep evaluating after a one-sided infeasible trial
    pub solve_all: bool,
    /// hot-start iteration limit used before any incumbent exists
    pub strong_iteration_limit: usize,
    /// reliability branching stops warming up after this many trials without a new best
    pub look_ahead: usize,
}

impl Default for BranchingSettings {
    fn default() -> Self {
        Self {
            strategy: BranchStrategyKind::Reliability,
            strong_candidate_size: 10,
            reliability: 8,
            pseudocost_weight: 0.5,
            pseudo_score_factor: 1.0 / 6.0,
            break_even: 0.5,
            solve_all: false,
            strong_iteration_limit: 10_000,
            look_ahead: 4,
        }
    }
}

#[derive(Clone, Debug)]
/// Settings for cut filtering and cut limits
pub struct CutSettings {
    pub dense_con_factor: f64,
    pub scale_con_factor: f64,
    /// non-core rows are capped at `(cut_factor - 1) * core rows`
    pub cut_factor: f64,
    pub parallel_threshold: f64,
    pub min_violation: f64,
    /// automatic generators are disabled after this many calls without cuts
    pub auto_disable_after: u32,
}

impl Default for CutSettings {
    fn default() -> Self {
        Self {
            dense_con_factor: 5.0,
            scale_con_factor: 1e6,
            cut_factor: 4.0,
            parallel_threshold: 0.999,
            min_violation: 1e-6,
            auto_disable_after: 30,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct BranchAndCutSettings {
    pub general: GeneralSettings,
    pub branching: BranchingSettings,
    pub cuts: CutSettings,
}
