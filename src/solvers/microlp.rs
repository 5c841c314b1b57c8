use ::microlp::{ComparisonOp, Error, OptimizationDirection, Problem};
use crate::misc::HashMap;
use crate::model::{LinearConstraint, MilpModel};
use crate::oracle::{BasisStatus, BoundingOracle, LpStatus, WarmStartBasis};

/// Bounds closer than this are treated as equal
const BOUND_TOLERANCE: f64 = 1e-9;

/// Relaxation oracle on top of the pure-Rust `microlp` simplex.
///
/// `microlp` has no incremental interface, every solve rebuilds the problem from
/// the stored bounds and rows. Hot starts are plain re-solves, `mark_hot_start`
/// only saves the solution that `unmark_hot_start` brings back.
/// The simplex has no iteration limit, the hot-start limit is stored but never
/// reached, so trials never end in `IterationLimit`.
#[derive(Clone, Debug)]
pub struct MicroLpOracle {
    objective: Vec<f64>,
    col_lower: Vec<f64>,
    col_upper: Vec<f64>,
    rows: Vec<LinearConstraint>,

    solution: Vec<f64>,
    objective_value: f64,
    status: Option<LpStatus>,

    hot_start: Option<(Vec<f64>, f64, Option<LpStatus>)>,
    hot_start_iteration_limit: usize,
    num_solves: usize,
}

impl MicroLpOracle {
    /// Relaxation of `model` with its core rows
    pub fn new(model: &MilpModel) -> Self {
        MicroLpOracle {
            objective: model.variables().iter().map(|v| v.objective).collect(),
            col_lower: model.col_lower(),
            col_upper: model.col_upper(),
            rows: model.constraints().to_vec(),
            solution: vec![0.0; model.num_cols()],
            objective_value: f64::INFINITY,
            status: None,
            hot_start: None,
            hot_start_iteration_limit: usize::MAX,
            num_solves: 0,
        }
    }

    /// Number of LPs solved so far, trials included
    pub fn num_solves(&self) -> usize {
        self.num_solves
    }

    /// Row terms with repeated columns merged
    fn merged_terms(row: &LinearConstraint) -> Vec<(usize, f64)> {
        let mut merged: HashMap<usize, f64> = HashMap::default();
        let mut order = Vec::with_capacity(row.len());
        for (index, value) in row.indices.iter().zip(&row.values) {
            let entry = merged.entry(*index).or_insert_with(|| {
                order.push(*index);
                0.0
            });
            *entry += value;
        }
        order.into_iter().map(|i| (i, merged[&i])).collect()
    }

    fn run(&mut self) -> LpStatus {
        self.num_solves += 1;

        let crossed_bounds = self.col_lower.iter().zip(&self.col_upper).any(|(l, u)| *l > *u + BOUND_TOLERANCE)
            || self.rows.iter().any(|r| r.lower > r.upper + BOUND_TOLERANCE);
        if crossed_bounds {
            self.objective_value = f64::INFINITY;
            return self.finish(LpStatus::PrimalInfeasible);
        }

        let mut problem = Problem::new(OptimizationDirection::Minimize);
        let vars: Vec<_> = self.objective.iter().zip(self.col_lower.iter().zip(&self.col_upper))
            .map(|(objective, (lower, upper))| problem.add_var(*objective, (*lower, upper.max(*lower))))
            .collect();

        for row in &self.rows {
            let terms: Vec<_> = Self::merged_terms(row).into_iter().map(|(i, a)| (vars[i], a)).collect();

            if (row.upper - row.lower).abs() <= BOUND_TOLERANCE {
                problem.add_constraint(terms, ComparisonOp::Eq, row.lower);
                continue;
            }
            if row.lower.is_finite() {
                problem.add_constraint(terms.clone(), ComparisonOp::Ge, row.lower);
            }
            if row.upper.is_finite() {
                problem.add_constraint(terms, ComparisonOp::Le, row.upper);
            }
        }

        match problem.solve() {
            Ok(solved) => {
                self.solution = vars.iter().map(|v| *solved.var_value(*v)).collect();
                self.objective_value = solved.objective();
                self.finish(LpStatus::Optimal)
            }
            Err(Error::Infeasible) => {
                self.objective_value = f64::INFINITY;
                self.finish(LpStatus::PrimalInfeasible)
            }
            Err(Error::Unbounded) => {
                self.objective_value = f64::NEG_INFINITY;
                self.finish(LpStatus::DualInfeasible)
            }
            Err(_) => self.finish(LpStatus::Abandoned),
        }
    }

    fn finish(&mut self, status: LpStatus) -> LpStatus {
        self.status = Some(status);
        status
    }

    fn column_basis(&self, column: usize) -> BasisStatus {
        let (lower, upper, value) = (self.col_lower[column], self.col_upper[column], self.solution[column]);
        if !lower.is_finite() && !upper.is_finite() {
            BasisStatus::Free
        } else if (value - lower).abs() <= BOUND_TOLERANCE {
            BasisStatus::AtLower
        } else if (value - upper).abs() <= BOUND_TOLERANCE {
            BasisStatus::AtUpper
        } else {
            BasisStatus::Basic
        }
    }

    fn row_basis(&self, row: &LinearConstraint) -> BasisStatus {
        let activity = row.activity(&self.solution);
        if (activity - row.lower).abs() <= BOUND_TOLERANCE {
            BasisStatus::AtLower
        } else if (activity - row.upper).abs() <= BOUND_TOLERANCE {
            BasisStatus::AtUpper
        } else {
            BasisStatus::Basic
        }
    }
}

impl BoundingOracle for MicroLpOracle {
    fn solve(&mut self) -> LpStatus {
        self.run()
    }

    fn resolve(&mut self) -> LpStatus {
        self.run()
    }

    fn objective_value(&self) -> f64 {
        self.objective_value
    }

    fn column_solution(&self) -> &[f64] {
        &self.solution
    }

    fn set_column_solution(&mut self, solution: &[f64]) {
        self.solution = solution.to_vec();
    }

    fn num_cols(&self) -> usize {
        self.objective.len()
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
        sorted.dedup();
        for row in sorted {
            if row < self.rows.len() {
                self.rows.remove(row);
            }
        }
    }

    fn set_row_bounds(&mut self, index: usize, lower: f64, upper: f64) {
        self.rows[index].lower = lower;
        self.rows[index].upper = upper;
    }

    fn is_proven_optimal(&self) -> bool {
        self.status == Some(LpStatus::Optimal)
    }

    fn is_primal_infeasible(&self) -> bool {
        self.status == Some(LpStatus::PrimalInfeasible)
    }

    fn is_dual_infeasible(&self) -> bool {
        self.status == Some(LpStatus::DualInfeasible)
    }

    fn is_iteration_limit_reached(&self) -> bool {
        false
    }

    fn is_dual_objective_limit_reached(&self) -> bool {
        false
    }

    fn mark_hot_start(&mut self) {
        self.hot_start = Some((self.solution.clone(), self.objective_value, self.status));
    }

    fn solve_from_hot_start(&mut self) -> LpStatus {
        self.run()
    }

    fn unmark_hot_start(&mut self) {
        if let Some((solution, objective_value, status)) = self.hot_start.take() {
            self.solution = solution;
            self.objective_value = objective_value;
            self.status = status;
        }
    }

    fn hot_start_iteration_limit(&self) -> usize {
        self.hot_start_iteration_limit
    }

    fn set_hot_start_iteration_limit(&mut self, limit: usize) {
        self.hot_start_iteration_limit = limit;
    }

    fn warm_start(&self) -> Option<WarmStartBasis> {
        if !self.is_proven_optimal() {
            return None;
        }
        Some(WarmStartBasis {
            columns: (0..self.objective.len()).map(|c| self.column_basis(c)).collect(),
            rows: self.rows.iter().map(|r| self.row_basis(r)).collect(),
        })
    }

    fn set_warm_start(&mut self, _basis: &WarmStartBasis) -> bool {
        // every solve starts from scratch
        true
    }
}

