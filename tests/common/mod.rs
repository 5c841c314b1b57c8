#![allow(dead_code)]

use generic_bnc::branching::{PseudocostTable, SelectionContext};
use generic_bnc::BranchingSettings;
use generic_bnc::model::{LinearConstraint, MilpModel};
use generic_bnc::oracle::{BasisStatus, BoundingOracle, Incumbent, LpStatus, WarmStartBasis};
use generic_bnc::UISender;

/// Answer of the scripted oracle for the current bounds: status, objective, solution
pub type Response = (LpStatus, f64, Vec<f64>);

/// In-memory oracle whose solves are answered by a closure over the column bounds
pub struct ScriptedOracle {
    pub col_lower: Vec<f64>,
    pub col_upper: Vec<f64>,
    pub rows: Vec<LinearConstraint>,
    pub solution: Vec<f64>,
    pub objective: f64,
    pub status: LpStatus,
    pub iteration_limit: usize,
    pub solves: usize,
    pub hot_start_marked: bool,
    pub cutoff: Option<f64>,
    pub installed_bases: usize,
    /// returned after optimal solves
    pub reduced_costs: Option<Vec<f64>>,
    respond: Box<dyn FnMut(&[f64], &[f64]) -> Response>,
    saved: Option<(Vec<f64>, f64, LpStatus)>,
}

impl ScriptedOracle {
    pub fn new(model: &MilpModel, respond: impl FnMut(&[f64], &[f64]) -> Response + 'static) -> Self {
        ScriptedOracle {
            col_lower: model.col_lower(),
            col_upper: model.col_upper(),
            rows: model.constraints().to_vec(),
            solution: vec![0.0; model.num_cols()],
            objective: 0.0,
            status: LpStatus::Abandoned,
            iteration_limit: usize::MAX,
            solves: 0,
            hot_start_marked: false,
            cutoff: None,
            installed_bases: 0,
            reduced_costs: None,
            respond: Box::new(respond),
            saved: None,
        }
    }

    /// Oracle that always returns the same answer
    pub fn fixed(model: &MilpModel, status: LpStatus, objective: f64, solution: Vec<f64>) -> Self {
        Self::new(model, move |_, _| (status, objective, solution.clone()))
    }

    fn answer(&mut self) -> LpStatus {
        self.solves += 1;
        let (status, objective, solution) = (self.respond)(&self.col_lower, &self.col_upper);
        self.status = status;
        self.objective = objective;
        if !solution.is_empty() {
            self.solution = solution;
        }
        status
    }
}

impl BoundingOracle for ScriptedOracle {
    fn solve(&mut self) -> LpStatus {
        self.answer()
    }

    fn resolve(&mut self) -> LpStatus {
        self.answer()
    }

    fn objective_value(&self) -> f64 {
        self.objective
    }

    fn column_solution(&self) -> &[f64] {
        &self.solution
    }

    fn set_column_solution(&mut self, solution: &[f64]) {
        self.solution = solution.to_vec();
    }

    fn num_cols(&self) -> usize {
        self.col_lower.len()
    }

    fn column_lower(&self) -> &[f64] {
        &self.col_lower
    }

    fn column_upper(&self) -> &[f64] {
        &self.col_upper
    }

    fn set_column_bounds(&mut self, index: usize, lower: f64, upper: f64) {
        self.col_lower[index] = lower;
        self.col_upper[index] = upper;
    }

    fn num_rows(&self) -> usize {
        self.rows.len()
    }

    fn add_rows(&mut self, rows: &[LinearConstraint]) {
        self.rows.extend_from_slice(rows);
    }

    fn delete_rows(&mut self, rows: &[usize]) {
        let mut sorted = rows.to_vec();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        for row in sorted {
            self.rows.remove(row);
        }
    }

    fn set_row_bounds(&mut self, index: usize, lower: f64, upper: f64) {
        self.rows[index].lower = lower;
        self.rows[index].upper = upper;
    }

    fn is_proven_optimal(&self) -> bool {
        self.status == LpStatus::Optimal
    }

    fn is_primal_infeasible(&self) -> bool {
        self.status == LpStatus::PrimalInfeasible
    }

    fn is_dual_infeasible(&self) -> bool {
        self.status == LpStatus::DualInfeasible
    }

    fn is_iteration_limit_reached(&self) -> bool {
        self.status == LpStatus::IterationLimit
    }

    fn is_dual_objective_limit_reached(&self) -> bool {
        self.status == LpStatus::DualObjectiveLimit
    }

    fn mark_hot_start(&mut self) {
        self.hot_start_marked = true;
        self.saved = Some((self.solution.clone(), self.objective, self.status));
    }

    fn solve_from_hot_start(&mut self) -> LpStatus {
        self.answer()
    }

    fn unmark_hot_start(&mut self) {
        self.hot_start_marked = false;
        if let Some((solution, objective, status)) = self.saved.take() {
            self.solution = solution;
            self.objective = objective;
            self.status = status;
        }
    }

    fn hot_start_iteration_limit(&self) -> usize {
        self.iteration_limit
    }

    fn set_hot_start_iteration_limit(&mut self, limit: usize) {
        self.iteration_limit = limit;
    }

    fn warm_start(&self) -> Option<WarmStartBasis> {
        Some(WarmStartBasis {
            columns: vec![BasisStatus::Basic; self.col_lower.len()],
            rows: vec![BasisStatus::Basic; self.rows.len()],
        })
    }

    fn set_warm_start(&mut self, _basis: &WarmStartBasis) -> bool {
        self.installed_bases += 1;
        true
    }

    fn set_cutoff(&mut self, cutoff: f64) {
        self.cutoff = Some(cutoff);
    }

    fn reduced_costs(&self) -> Option<Vec<f64>> {
        self.reduced_costs.clone().filter(|_| self.status == LpStatus::Optimal)
    }
}

/// `count` integer columns in `[0, 10]` with unit cost and no rows
pub fn integer_model(count: usize) -> MilpModel {
    let mut model = MilpModel::new();
    for _ in 0..count {
        model.add_variable(1.0, 0.0, 10.0, true);
    }
    model
}

/// Owned state behind a [`SelectionContext`]
pub struct SelectionFixture {
    pub pseudocosts: PseudocostTable,
    pub incumbent: Incumbent,
    pub settings: BranchingSettings,
    pub ui: UISender,
}

impl SelectionFixture {
    pub fn new(settings: BranchingSettings) -> Self {
        SelectionFixture {
            pseudocosts: PseudocostTable::new(settings.pseudocost_weight).expect("valid weight"),
            incumbent: Incumbent::new(),
            settings,
            ui: UISender::silent(),
        }
    }

    pub fn context<'a, O: BoundingOracle>(&'a mut self, model: &'a MilpModel, oracle: &'a mut O) -> SelectionContext<'a, O> {
        SelectionContext {
            model,
            oracle,
            pseudocosts: &mut self.pseudocosts,
            incumbent: &mut self.incumbent,
            settings: &self.settings,
            integer_tolerance: 1e-5,
            time_limit_reached: false,
            ui: &self.ui,
        }
    }
}
