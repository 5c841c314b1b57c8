#![cfg(feature = "gurobi")]

#[cfg(test)]
mod tests {
    use generic_bnc::model::{LinearConstraint, MilpModel};
    use generic_bnc::oracle::{BoundingOracle, LpStatus};
    use generic_bnc::solvers::gurobi::{quiet_env, GurobiOracle};

    fn knapsack() -> MilpModel {
        let mut model = MilpModel::new();
        let items: Vec<(usize, f64)> = [(5.0, 2.0), (4.0, 3.0), (3.0, 1.0)].iter()
            .map(|(value, weight)| (model.add_variable(-value, 0.0, 1.0, true), *weight))
            .collect();
        model.add_constraint(LinearConstraint::less_equal(&items, 5.0));
        model
    }

    #[test]
    #[ignore = "needs a gurobi licence"]
    fn hot_start_iteration_limit_only_applies_while_marked() {
        let model = knapsack();
        let env = quiet_env(0).unwrap();
        let mut oracle = GurobiOracle::new(&model, &env).unwrap();
        assert_eq!(oracle.solve(), LpStatus::Optimal);

        oracle.set_hot_start_iteration_limit(0);
        oracle.mark_hot_start();
        // x1 is basic at 2/3, the old basis is no longer primal feasible
        oracle.set_column_bounds(1, 0.0, 0.0);
        assert_eq!(oracle.solve_from_hot_start(), LpStatus::IterationLimit);
        oracle.unmark_hot_start();
        assert!(oracle.is_proven_optimal());

        assert_eq!(oracle.resolve(), LpStatus::Optimal);
        assert!((oracle.objective_value() + 8.0).abs() < 1e-6);
    }
}
