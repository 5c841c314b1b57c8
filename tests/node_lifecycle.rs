mod common;

#[cfg(test)]
mod tests {
    use generic_bnc::branching::PseudocostTable;
    use generic_bnc::heuristics::RoundingHeuristic;
    use generic_bnc::model::{LinearConstraint, MilpModel};
    use generic_bnc::oracle::{BoundingOracle, CutGeneration, CutGenerator, CutStrategy, Heuristic, Incumbent, IncumbentRegistry, LpStatus};
    use generic_bnc::tree_node::{branch_node, decide, process_node, ConstraintPool, CutFilter, CutGeneratorSlot, FathomReason, NodeContext, NodeDescription};
    use generic_bnc::{BranchAndCutSettings, BranchDirection, BranchStrategyKind, BranchingStrategy, FatalError, NodeArena, NodeId, NodeOutcome, NodeStatus, SearchStatistics, UISender};
    use crate::common::{integer_model, ScriptedOracle};

    /// Owned state behind a [`NodeContext`]
    struct Parts {
        strategy: BranchingStrategy,
        pseudocosts: PseudocostTable,
        incumbent: Incumbent,
        cut_pool: ConstraintPool,
        cut_generators: Vec<CutGeneratorSlot>,
        cut_filter: CutFilter,
        heuristics: Vec<Box<dyn Heuristic>>,
        settings: BranchAndCutSettings,
        ui: UISender,
        statistics: SearchStatistics,
    }

    impl Parts {
        fn new(model: &MilpModel) -> Self {
            let mut settings = BranchAndCutSettings::default();
            settings.branching.strategy = BranchStrategyKind::MaxInfeasibility;
            Parts {
                strategy: BranchingStrategy::new(settings.branching.strategy, model, &settings.branching),
                pseudocosts: PseudocostTable::new(settings.branching.pseudocost_weight).unwrap(),
                incumbent: Incumbent::new(),
                cut_pool: ConstraintPool::new(),
                cut_generators: Vec::new(),
                cut_filter: CutFilter::new(model, &settings.cuts),
                heuristics: Vec::new(),
                settings,
                ui: UISender::silent(),
                statistics: SearchStatistics::default(),
            }
        }

        fn context<'a, O: BoundingOracle>(&'a mut self, model: &'a MilpModel, oracle: &'a mut O) -> NodeContext<'a, O> {
            NodeContext {
                model,
                oracle,
                strategy: &mut self.strategy,
                pseudocosts: &mut self.pseudocosts,
                incumbent: &mut self.incumbent,
                cut_pool: &mut self.cut_pool,
                cut_generators: &mut self.cut_generators,
                cut_filter: &self.cut_filter,
                heuristics: &mut self.heuristics,
                settings: &self.settings,
                ui: &self.ui,
                deadline: None,
                num_processed: 1,
                statistics: &mut self.statistics,
            }
        }
    }

    fn root(model: &MilpModel) -> (NodeArena, NodeId) {
        let mut arena = NodeArena::new();
        let root = arena.insert_root(NodeDescription::explicit_root(model));
        (arena, root)
    }

    #[test]
    fn closed_gap_fathoms_without_solving() {
        let model = integer_model(2);
        let (mut arena, root) = root(&model);
        arena.get_mut(root).unwrap().quality = 10.0 - 1e-5;

        let mut oracle = ScriptedOracle::fixed(&model, LpStatus::Optimal, 0.0, vec![0.5, 0.5]);
        let mut parts = Parts::new(&model);
        parts.incumbent.register_solution(&[5.0, 5.0], 10.0);
        let mut ctx = parts.context(&model, &mut oracle);

        assert_eq!(process_node(&mut arena, root, &mut ctx), Ok(NodeOutcome::Fathomed(FathomReason::Gap)));
        assert_eq!(arena.get(root).unwrap().status, NodeStatus::Fathomed);

        // a fathomed node is never bounded again
        assert_eq!(process_node(&mut arena, root, &mut ctx),
                   Err(FatalError::InvalidNodeState { node: root, status: NodeStatus::Fathomed }));
        assert_eq!(oracle.solves, 0);
    }

    #[test]
    fn gap_closed_by_relaxation_fathoms() {
        let model = integer_model(2);
        let (mut arena, root) = root(&model);
        let mut oracle = ScriptedOracle::fixed(&model, LpStatus::Optimal, 10.0 - 5e-5, vec![0.5, 0.5]);
        let mut parts = Parts::new(&model);
        parts.incumbent.register_solution(&[5.0, 5.0], 10.0);

        let outcome = process_node(&mut arena, root, &mut parts.context(&model, &mut oracle));
        assert_eq!(outcome, Ok(NodeOutcome::Fathomed(FathomReason::Gap)));
        assert_eq!(oracle.solves, 1);
    }

    #[test]
    fn parent_bound_above_cutoff_fathoms_upfront() {
        let model = integer_model(1);
        let (mut arena, root) = root(&model);
        arena.get_mut(root).unwrap().quality = 12.0;
        let mut oracle = ScriptedOracle::fixed(&model, LpStatus::Optimal, 0.0, vec![0.5]);
        let mut parts = Parts::new(&model);
        parts.incumbent.register_solution(&[10.0], 10.0);

        let outcome = process_node(&mut arena, root, &mut parts.context(&model, &mut oracle));
        assert_eq!(outcome, Ok(NodeOutcome::Fathomed(FathomReason::Cutoff)));
        assert_eq!(oracle.solves, 0);
    }

    #[test]
    fn infeasible_relaxation_fathoms() {
        let model = integer_model(2);
        let (mut arena, root) = root(&model);
        let mut oracle = ScriptedOracle::fixed(&model, LpStatus::PrimalInfeasible, f64::INFINITY, Vec::new());
        let mut parts = Parts::new(&model);

        let outcome = process_node(&mut arena, root, &mut parts.context(&model, &mut oracle));
        assert_eq!(outcome, Ok(NodeOutcome::Fathomed(FathomReason::Infeasible)));
        assert_eq!(arena.get(root).unwrap().status, NodeStatus::Fathomed);
    }

    #[test]
    fn integral_relaxation_becomes_incumbent() {
        let model = integer_model(2);
        let (mut arena, root) = root(&model);
        let mut oracle = ScriptedOracle::fixed(&model, LpStatus::Optimal, 5.0, vec![2.0, 3.000_000_1]);
        let mut parts = Parts::new(&model);

        let outcome = process_node(&mut arena, root, &mut parts.context(&model, &mut oracle));
        assert_eq!(outcome, Ok(NodeOutcome::Fathomed(FathomReason::IntegerFeasible)));
        assert_eq!(parts.incumbent.incumbent_value(), 5.0);
        assert_eq!(parts.incumbent.solution, Some(vec![2.0, 3.0]));
        assert_eq!(parts.statistics.solutions_found, 1);
        assert_eq!(oracle.cutoff, Some(5.0));
    }

    #[test]
    fn unbounded_relaxation_is_reported() {
        let model = integer_model(1);
        let (mut arena, root) = root(&model);
        let mut oracle = ScriptedOracle::fixed(&model, LpStatus::DualInfeasible, f64::NEG_INFINITY, Vec::new());
        let mut parts = Parts::new(&model);

        let outcome = process_node(&mut arena, root, &mut parts.context(&model, &mut oracle));
        assert_eq!(outcome, Ok(NodeOutcome::Unbounded));
    }

    #[test]
    fn decide_maps_solver_statuses() {
        let model = integer_model(1);
        let (mut arena, root) = root(&model);
        let mut oracle = ScriptedOracle::fixed(&model, LpStatus::Optimal, 0.0, vec![0.5]);
        let mut parts = Parts::new(&model);
        let mut ctx = parts.context(&model, &mut oracle);

        let error = decide(arena.get_mut(root).unwrap(), LpStatus::IterationLimit, &mut ctx);
        assert_eq!(error, Err(FatalError::UnexpectedOracleStatus { node: root, status: LpStatus::IterationLimit }));
        assert!(decide(arena.get_mut(root).unwrap(), LpStatus::Abandoned, &mut ctx).is_err());

        let unbounded = decide(arena.get_mut(root).unwrap(), LpStatus::DualInfeasible, &mut ctx).unwrap();
        assert!(unbounded.unbounded);
        assert_eq!(unbounded.fathomed, None);

        ctx.oracle.solve();
        let branch = decide(arena.get_mut(root).unwrap(), LpStatus::Optimal, &mut ctx).unwrap();
        assert!(branch.branch);
        assert!(!branch.keep_bounding);
        assert!(!branch.generate_variables);

        let cutoff = decide(arena.get_mut(root).unwrap(), LpStatus::DualObjectiveLimit, &mut ctx).unwrap();
        assert_eq!(cutoff.fathomed, Some(FathomReason::Cutoff));
        assert_eq!(arena.get(root).unwrap().status, NodeStatus::Fathomed);
    }

    #[test]
    fn fractional_node_branches_in_preferred_order() {
        let model = integer_model(2);
        let (mut arena, root) = root(&model);
        let mut oracle = ScriptedOracle::fixed(&model, LpStatus::Optimal, 2.5, vec![0.5, 2.0]);
        let mut parts = Parts::new(&model);

        let outcome = process_node(&mut arena, root, &mut parts.context(&model, &mut oracle));
        assert_eq!(outcome, Ok(NodeOutcome::Pregnant));

        let node = arena.get(root).unwrap();
        assert_eq!(node.status, NodeStatus::Pregnant);
        assert_eq!(node.quality, 2.5);
        let object = node.branch_object.clone().unwrap();
        assert_eq!(object.variable_index, 0);
        assert_eq!(object.direction, BranchDirection::Up);

        let [first, second] = branch_node(&mut arena, root, false, &model).unwrap();
        assert_eq!(arena.get(root).unwrap().status, NodeStatus::Branched);
        assert_eq!(arena.get(root).unwrap().num_live_children(), 2);

        let first_node = arena.get(first).unwrap();
        assert_eq!(first_node.description.branched_direction, 1);
        assert_eq!((first_node.depth, first_node.status, first_node.parent), (1, NodeStatus::Candidate, Some(root)));
        assert_eq!(first_node.quality, 2.5);
        assert!(!first_node.description.explicit);
        assert_eq!(arena.get(second).unwrap().description.branched_direction, -1);

        let up = arena.reconstruct(first, 2, 0).unwrap();
        assert_eq!((up.col_lower[0], up.col_upper[0]), (1.0, 10.0));
        let down = arena.reconstruct(second, 2, 0).unwrap();
        assert_eq!((down.col_lower[0], down.col_upper[0]), (0.0, 0.0));
    }

    #[test]
    fn ramp_up_children_are_explicit() {
        let model = integer_model(2);
        let (mut arena, root) = root(&model);
        let mut oracle = ScriptedOracle::fixed(&model, LpStatus::Optimal, 2.5, vec![0.5, 2.0]);
        let mut parts = Parts::new(&model);
        process_node(&mut arena, root, &mut parts.context(&model, &mut oracle)).unwrap();

        let children = branch_node(&mut arena, root, true, &model).unwrap();
        for child in children {
            let node = arena.get(child).unwrap();
            assert!(node.description.explicit);
            assert_eq!(arena.path_to_explicit(child).unwrap(), vec![child]);
        }
        let up = arena.reconstruct(children[0], 2, 0).unwrap();
        assert_eq!(up.col_lower, vec![1.0, 0.0]);
    }

    #[test]
    fn only_pregnant_nodes_branch() {
        let model = integer_model(1);
        let (mut arena, root) = root(&model);
        assert_eq!(branch_node(&mut arena, root, false, &model), Err(FatalError::NodeNotPregnant(root)));

        arena.get_mut(root).unwrap().status = NodeStatus::Pregnant;
        assert_eq!(branch_node(&mut arena, root, false, &model), Err(FatalError::MissingBranchObject(root)));
    }

    #[test]
    fn child_bound_feeds_pseudocosts() {
        let model = integer_model(2);
        let (mut arena, root) = root(&model);
        let mut oracle = ScriptedOracle::new(&model, |lower, _| {
            if lower[0] >= 1.0 {
                (LpStatus::Optimal, 3.0, vec![1.0, 2.0])
            } else {
                (LpStatus::Optimal, 1.0, vec![0.5, 0.5])
            }
        });
        let mut parts = Parts::new(&model);

        process_node(&mut arena, root, &mut parts.context(&model, &mut oracle)).unwrap();
        let [up, _] = branch_node(&mut arena, root, false, &model).unwrap();

        let outcome = process_node(&mut arena, up, &mut parts.context(&model, &mut oracle));
        assert_eq!(outcome, Ok(NodeOutcome::Fathomed(FathomReason::IntegerFeasible)));

        let record = parts.pseudocosts.record(0).unwrap();
        assert_eq!(record.up_count(), 1);
        // (3 - 1) / 0.5
        assert!((record.up_cost() - 4.0).abs() < 1e-6);
        assert_eq!(parts.incumbent.incumbent_value(), 3.0);
    }

    struct CoverCut;

    impl CutGenerator for CoverCut {
        fn name(&self) -> &str {
            "cover"
        }

        fn strategy(&self) -> CutStrategy {
            CutStrategy::RootOnly
        }

        fn generate(&mut self, _model: &MilpModel, _solution: &[f64], _lower: &[f64], _upper: &[f64]) -> CutGeneration {
            CutGeneration {
                cuts: vec![LinearConstraint::greater_equal(&[(0, 1.0), (1, 1.0)], 2.0)],
                ..CutGeneration::default()
            }
        }
    }

    #[test]
    fn root_cuts_are_pooled_and_recorded() {
        let model = integer_model(2);
        let (mut arena, root) = root(&model);
        let mut oracle = ScriptedOracle::fixed(&model, LpStatus::Optimal, 1.0, vec![0.5, 0.5]);
        let mut parts = Parts::new(&model);
        parts.cut_generators.push(CutGeneratorSlot::new(Box::new(CoverCut)));

        let outcome = process_node(&mut arena, root, &mut parts.context(&model, &mut oracle));
        assert_eq!(outcome, Ok(NodeOutcome::Pregnant));

        assert_eq!(parts.cut_pool.count(), 1);
        assert_eq!(parts.statistics.cuts_added, 1);
        assert_eq!(parts.cut_generators[0].calls, 1);
        assert_eq!(oracle.rows.len(), 1);
        // one solve plus one re-solve after the cut
        assert_eq!(oracle.solves, 2);

        let added = &arena.get(root).unwrap().description.constraints.added;
        assert_eq!(added.len(), 1);
        assert_eq!(parts.cut_pool.get_constraint(added[0]).data, oracle.rows[0]);
    }

    #[test]
    fn heuristic_solution_closes_gap() {
        let model = integer_model(2);
        let (mut arena, root) = root(&model);
        let mut oracle = ScriptedOracle::fixed(&model, LpStatus::Optimal, 1.0, vec![0.5, 0.5]);
        let mut parts = Parts::new(&model);
        parts.heuristics.push(Box::new(RoundingHeuristic::new(1e-6)));

        let outcome = process_node(&mut arena, root, &mut parts.context(&model, &mut oracle));
        assert_eq!(outcome, Ok(NodeOutcome::Fathomed(FathomReason::Gap)));
        // rounding down is free for positive costs
        assert_eq!(parts.incumbent.incumbent_value(), 0.0);
        assert_eq!(parts.incumbent.solution, Some(vec![0.0, 0.0]));
    }

    #[test]
    fn reduced_costs_tighten_bounds_against_the_incumbent() {
        let model = integer_model(3);
        let (mut arena, root) = root(&model);
        let mut oracle = ScriptedOracle::fixed(&model, LpStatus::Optimal, 6.5, vec![0.0, 0.5, 10.0]);
        // x0 at its lower bound pays 2 per unit, x2 at its upper bound saves 1.5 per unit
        oracle.reduced_costs = Some(vec![2.0, 0.0, -1.5]);
        let mut parts = Parts::new(&model);
        parts.incumbent.register_solution(&[10.0, 0.0, 0.0], 10.0);

        let outcome = process_node(&mut arena, root, &mut parts.context(&model, &mut oracle));
        assert_eq!(outcome, Ok(NodeOutcome::Pregnant));
        assert_eq!(parts.statistics.reduced_cost_fixes, 2);

        // gap 3.5: x0 may rise by floor(3.5 / 2), x2 may drop by floor(3.5 / 1.5)
        assert_eq!((oracle.col_lower[0], oracle.col_upper[0]), (0.0, 1.0));
        assert_eq!((oracle.col_lower[2], oracle.col_upper[2]), (8.0, 10.0));
        assert_eq!(oracle.col_upper[1], 10.0);

        // the node keeps the tightened bounds for its children
        let sub = arena.reconstruct(root, 3, 0).unwrap();
        assert_eq!(sub.col_upper[0], 1.0);
        assert_eq!(sub.col_lower[2], 8.0);
    }

    #[test]
    fn reduced_cost_fixing_needs_an_incumbent() {
        let model = integer_model(3);
        let (mut arena, root) = root(&model);
        let mut oracle = ScriptedOracle::fixed(&model, LpStatus::Optimal, 6.5, vec![0.0, 0.5, 10.0]);
        oracle.reduced_costs = Some(vec![2.0, 0.0, -1.5]);
        let mut parts = Parts::new(&model);

        process_node(&mut arena, root, &mut parts.context(&model, &mut oracle)).unwrap();
        assert_eq!(parts.statistics.reduced_cost_fixes, 0);
        assert_eq!(oracle.col_upper, vec![10.0, 10.0, 10.0]);
    }

    #[test]
    fn strong_fix_resolves_and_selects_again() {
        let model = integer_model(3);
        let (mut arena, root) = root(&model);
        let mut oracle = ScriptedOracle::new(&model, |lower, upper| {
            if upper[0] <= 0.0 {
                (LpStatus::PrimalInfeasible, f64::INFINITY, Vec::new())
            } else if lower[0] >= 1.0 {
                (LpStatus::Optimal, 3.0, vec![1.0, 0.5, 0.5])
            } else {
                (LpStatus::Optimal, 1.0, vec![0.5, 0.5, 0.5])
            }
        });
        let mut parts = Parts::new(&model);
        parts.strategy = BranchingStrategy::new(BranchStrategyKind::Strong, &model, &parts.settings.branching);

        let outcome = process_node(&mut arena, root, &mut parts.context(&model, &mut oracle));
        assert_eq!(outcome, Ok(NodeOutcome::Pregnant));

        // root solve, two trials, re-solve after the fix, four trials on x1 and x2
        assert_eq!(oracle.solves, 8);
        assert_eq!(parts.statistics.lp_solves, 2);
        assert_eq!((oracle.col_lower[0], oracle.col_upper[0]), (1.0, 10.0));

        let node = arena.get(root).unwrap();
        assert_eq!(node.quality, 3.0);
        assert_ne!(node.branch_object.as_ref().map(|b| b.variable_index), Some(0));
        assert_eq!(arena.reconstruct(root, 3, 0).unwrap().col_lower[0], 1.0);
    }

    #[test]
    fn slack_pool_rows_are_dropped_from_the_description() {
        let model = integer_model(2);
        let (mut arena, root) = root(&model);
        arena.get_mut(root).unwrap().quality = 1.0;
        let mut parts = Parts::new(&model);
        parts.settings.general.remove_slack_constraints = true;

        let (tight, _) = parts.cut_pool.add_constraint(LinearConstraint::greater_equal(&[(0, 1.0)], 1.0));
        let (slack, _) = parts.cut_pool.add_constraint(LinearConstraint::less_equal(&[(0, 1.0), (1, 1.0)], 5.0));

        let mut description = NodeDescription::with_bound_change(0, 1.0, 10.0);
        description.branched_direction = 1;
        description.branched_column = 0;
        description.branched_value = 0.5;
        description.constraints.added = vec![tight, slack];
        let child = arena.insert_child(root, description).unwrap();

        let mut oracle = ScriptedOracle::fixed(&model, LpStatus::Optimal, 2.0, vec![1.0, 0.5]);
        let outcome = process_node(&mut arena, child, &mut parts.context(&model, &mut oracle));
        assert_eq!(outcome, Ok(NodeOutcome::Pregnant));
        // both pooled rows were installed
        assert_eq!(oracle.rows.len(), 2);

        let constraints = &arena.get(child).unwrap().description.constraints;
        assert_eq!(constraints.added, vec![tight]);
        assert_eq!(constraints.removed, vec![slack]);
        assert_eq!(arena.reconstruct(child, 2, 0).unwrap().constraints, vec![tight]);
    }

    #[test]
    fn slack_pool_rows_stay_by_default() {
        let model = integer_model(2);
        let (mut arena, root) = root(&model);
        arena.get_mut(root).unwrap().quality = 1.0;
        let mut parts = Parts::new(&model);
        let (slack, _) = parts.cut_pool.add_constraint(LinearConstraint::less_equal(&[(0, 1.0), (1, 1.0)], 5.0));

        let mut description = NodeDescription::with_bound_change(0, 1.0, 10.0);
        description.branched_direction = 1;
        description.branched_column = 0;
        description.branched_value = 0.5;
        description.constraints.added = vec![slack];
        let child = arena.insert_child(root, description).unwrap();

        let mut oracle = ScriptedOracle::fixed(&model, LpStatus::Optimal, 2.0, vec![1.0, 0.5]);
        process_node(&mut arena, child, &mut parts.context(&model, &mut oracle)).unwrap();

        let constraints = &arena.get(child).unwrap().description.constraints;
        assert!(constraints.removed.is_empty());
        assert_eq!(arena.reconstruct(child, 2, 0).unwrap().constraints, vec![slack]);
    }
}
