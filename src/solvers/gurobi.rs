use gurobi::{attr, param, ConstrSense, LinExpr, Status, VarType};
use crate::model::{LinearConstraint, MilpModel};
use crate::oracle::{BoundingOracle, LpStatus, WarmStartBasis};

/// Gurobi's value for an unlimited parameter
const GRB_INFINITY: f64 = 1e100;

/// Rows are kept as up to two one-sided gurobi constraints
struct GurobiRow {
    data: LinearConstraint,
    lower: Option<gurobi::Constr>,
    upper: Option<gurobi::Constr>,
}

/// Relaxation oracle on a gurobi LP model.
///
/// Gurobi errors never panic, they mark the oracle broken and the next solve
/// reports `Abandoned`. The hot-start iteration limit is the model's
/// `IterationLimit` while a hot start is marked, regular solves run unlimited.
pub struct GurobiOracle {
    model: gurobi::Model,
    vars: Vec<gurobi::Var>,
    rows: Vec<GurobiRow>,
    col_lower: Vec<f64>,
    col_upper: Vec<f64>,

    solution: Vec<f64>,
    objective_value: f64,
    status: Option<LpStatus>,
    broken: bool,

    hot_start: Option<(Vec<f64>, f64, Option<LpStatus>)>,
    hot_start_iteration_limit: usize,
}

/// Environment with single thread and no output
pub fn quiet_env(seed: i32) -> Result<gurobi::Env, gurobi::Error> {
    let mut env = gurobi::Env::new("")?;
    env.set(param::Threads, 1)?;
    env.set(param::Seed, seed)?;
    env.set(param::OutputFlag, 0)?;
    Ok(env)
}

impl GurobiOracle {
    pub fn new(model: &MilpModel, env: &gurobi::Env) -> Result<Self, gurobi::Error> {
        let mut lp = gurobi::Model::new("relaxation", env)?;

        let vars = model.variables().iter()
            .map(|v| lp.add_var(&format!("x[{}]", v.index), VarType::Continuous, v.objective, v.hard_lower, v.hard_upper, &[], &[]))
            .collect::<Result<Vec<_>, _>>()?;
        lp.update()?;

        let mut oracle = GurobiOracle {
            model: lp,
            vars,
            rows: Vec::new(),
            col_lower: model.col_lower(),
            col_upper: model.col_upper(),
            solution: vec![0.0; model.num_cols()],
            objective_value: f64::INFINITY,
            status: None,
            broken: false,
            hot_start: None,
            hot_start_iteration_limit: usize::MAX,
        };

        for constraint in model.constraints() {
            let row = oracle.build_row(constraint.clone())?;
            oracle.rows.push(row);
        }
        oracle.model.update()?;

        Ok(oracle)
    }

    fn expression(&self, data: &LinearConstraint) -> LinExpr {
        data.indices.iter().zip(&data.values)
            .fold(LinExpr::new(), |expr, (index, value)| expr.add_term(*value, self.vars[*index].clone()))
    }

    fn build_row(&mut self, data: LinearConstraint) -> Result<GurobiRow, gurobi::Error> {
        let name = format!("r[{}]", self.rows.len());
        let lower = if data.lower.is_finite() {
            Some(self.model.add_constr(&format!("{name}_lb"), self.expression(&data), ConstrSense::Greater, data.lower)?)
        } else {
            None
        };
        let upper = if data.upper.is_finite() {
            Some(self.model.add_constr(&format!("{name}_ub"), self.expression(&data), ConstrSense::Less, data.upper)?)
        } else {
            None
        };
        Ok(GurobiRow { data, lower, upper })
    }

    fn optimize(&mut self) -> Result<LpStatus, gurobi::Error> {
        self.model.update()?;
        self.model.optimize()?;

        let status = match self.model.status()? {
            Status::Optimal => {
                self.objective_value = self.model.get(attr::ObjVal)?;
                self.solution = self.model.get_values(attr::X, &self.vars)?;
                LpStatus::Optimal
            }
            Status::Infeasible => LpStatus::PrimalInfeasible,
            Status::Unbounded | Status::InfOrUnbd => LpStatus::DualInfeasible,
            Status::CutOff => LpStatus::DualObjectiveLimit,
            Status::IterationLimit => LpStatus::IterationLimit,
            _ => LpStatus::Abandoned,
        };
        Ok(status)
    }

    fn run(&mut self) -> LpStatus {
        let status = if self.broken {
            LpStatus::Abandoned
        } else {
            self.optimize().unwrap_or(LpStatus::Abandoned)
        };
        if status != LpStatus::Optimal {
            self.objective_value = f64::INFINITY;
        }
        self.status = Some(status);
        status
    }

    /// Simplex iteration limit of the model, `usize::MAX` lifts it
    fn apply_iteration_limit(&mut self, limit: usize) {
        #[allow(clippy::cast_precision_loss)]
        let limit = if limit == usize::MAX { GRB_INFINITY } else { limit as f64 };
        let result = self.model.get_env_mut().set(param::IterationLimit, limit);
        self.check(result);
    }

    fn check(&mut self, result: Result<(), gurobi::Error>) {
        if result.is_err() {
            self.broken = true;
        }
    }
}

impl BoundingOracle for GurobiOracle {
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
        self.vars.len()
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
        let var = [self.vars[index].clone()];
        let result = self.model.set_values(attr::LB, &var, &[lower])
            .and_then(|()| self.model.set_values(attr::UB, &var, &[upper]));
        self.check(result);
    }

    fn num_rows(&self) -> usize {
        self.rows.len()
    }

    fn add_rows(&mut self, rows: &[LinearConstraint]) {
        for data in rows {
            match self.build_row(data.clone()) {
                Ok(row) => self.rows.push(row),
                Err(_) => self.broken = true,
            }
        }
    }

    fn delete_rows(&mut self, rows: &[usize]) {
        let mut sorted = rows.to_vec();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        sorted.dedup();
        for index in sorted {
            if index >= self.rows.len() {
                continue;
            }
            let row = self.rows.remove(index);
            for constr in row.lower.into_iter().chain(row.upper) {
                let result = self.model.remove(constr);
                self.check(result);
            }
        }
    }

    fn set_row_bounds(&mut self, index: usize, lower: f64, upper: f64) {
        let mut data = self.rows[index].data.clone();
        if data.lower == lower && data.upper == upper {
            return;
        }
        data.lower = lower;
        data.upper = upper;

        // one-sided constraints cannot change sides, rebuild the row
        let old = std::mem::replace(&mut self.rows[index], GurobiRow { data: data.clone(), lower: None, upper: None });
        for constr in old.lower.into_iter().chain(old.upper) {
            let result = self.model.remove(constr);
            self.check(result);
        }
        match self.build_row(data) {
            Ok(row) => self.rows[index] = row,
            Err(_) => self.broken = true,
        }
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
        self.status == Some(LpStatus::IterationLimit)
    }

    fn is_dual_objective_limit_reached(&self) -> bool {
        self.status == Some(LpStatus::DualObjectiveLimit)
    }

    fn mark_hot_start(&mut self) {
        self.hot_start = Some((self.solution.clone(), self.objective_value, self.status));
        self.apply_iteration_limit(self.hot_start_iteration_limit);
    }

    fn solve_from_hot_start(&mut self) -> LpStatus {
        self.run()
    }

    fn unmark_hot_start(&mut self) {
        self.apply_iteration_limit(usize::MAX);
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
        if self.hot_start.is_some() {
            self.apply_iteration_limit(limit);
        }
    }

    fn warm_start(&self) -> Option<WarmStartBasis> {
        None
    }

    fn set_warm_start(&mut self, _basis: &WarmStartBasis) -> bool {
        false
    }

    fn reduced_costs(&self) -> Option<Vec<f64>> {
        if !self.is_proven_optimal() {
            return None;
        }
        self.model.get_values(attr::RC, &self.vars).ok()
    }
}
